//! Phase 0: Precompute the static lookup tables for one catalog.
//!
//! The orchestrator [`precompute_lookup_tables`] runs three sub-steps in
//! dependency order:
//!
//! 1. **Dimensions**: `ageAtMaturity` from the catalog, `motherAgeMax` and
//!    `motherArrayMax` from the maximum age
//! 2. **Transition index**: for each composition, next year's composition with and
//!    without a birth
//! 3. **State space**: which (age index, family index) pairs are reachable

use std::time::Instant;

use log::info;

use crate::catalog::FamilyCatalog;
use crate::config::ModelParams;
use crate::errors::ModelError;
use crate::subsets::Subsets;
use crate::types::{AgeSet, LifeHistoryContext, StateTable};

/// Next-year family lookup, separately for "a birth occurs" and "no birth occurs".
///
/// `None` marks a transition whose target composition is not in the catalog.
/// Such transitions carry no probability mass and no fitness.
#[derive(Clone, Debug)]
pub struct TransitionIndex {
    no_birth: Vec<Option<u32>>,
    birth: Vec<Option<u32>>,
}

impl TransitionIndex {
    /// Age every composition by one year and look the result up in the catalog.
    ///
    /// A birth is only possible when the aged family has no one- or two-year-old;
    /// the newborn then joins as a one-year-old.
    pub fn build(catalog: &FamilyCatalog) -> Self {
        let age_at_maturity = catalog.age_at_maturity();
        let lookup = |family: AgeSet| catalog.index_of(family).map(|i| i as u32);

        let mut no_birth = Vec::with_capacity(catalog.len());
        let mut birth = Vec::with_capacity(catalog.len());
        for &family in catalog.families() {
            let aged = family.aged(age_at_maturity);
            no_birth.push(lookup(aged));
            if aged.contains(1) || aged.contains(2) {
                birth.push(None);
            } else {
                birth.push(lookup(aged.with(1)));
            }
        }
        Self { no_birth, birth }
    }

    /// Next year's family index for the composition at `family_index`.
    #[inline(always)]
    pub fn next_index(&self, family_index: usize, gives_birth: bool) -> Option<usize> {
        let table = if gives_birth {
            &self.birth
        } else {
            &self.no_birth
        };
        table[family_index].map(|i| i as usize)
    }

    /// Next year's family index for an arbitrary set of surviving children.
    ///
    /// The set is first located in the catalog; sets the catalog does not contain
    /// have no transition.
    #[inline(always)]
    pub fn next_for(
        &self,
        catalog: &FamilyCatalog,
        survivors: AgeSet,
        gives_birth: bool,
    ) -> Option<usize> {
        catalog
            .index_of(survivors)
            .and_then(|i| self.next_index(i, gives_birth))
    }

    pub fn len(&self) -> usize {
        self.no_birth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.no_birth.is_empty()
    }
}

/// Which families can follow which, over every subset of surviving children.
///
/// Entries are (from, to) family indices, sorted and without duplicates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionPattern {
    pub num_families: usize,
    pub birth: Vec<(usize, usize)>,
    pub no_birth: Vec<(usize, usize)>,
}

impl TransitionPattern {
    /// Birth transitions are only recorded for surviving sets without a one-year-old.
    pub fn build(catalog: &FamilyCatalog, transitions: &TransitionIndex) -> Self {
        let mut birth = Vec::new();
        let mut no_birth = Vec::new();
        for (from, &family) in catalog.families().iter().enumerate() {
            let birth_start = birth.len();
            let no_birth_start = no_birth.len();
            for survivors in Subsets::of(family) {
                if !survivors.contains(1) {
                    if let Some(to) = transitions.next_for(catalog, survivors, true) {
                        birth.push((from, to));
                    }
                }
                if let Some(to) = transitions.next_for(catalog, survivors, false) {
                    no_birth.push((from, to));
                }
            }
            birth[birth_start..].sort_unstable();
            no_birth[no_birth_start..].sort_unstable();
        }
        birth.dedup();
        no_birth.dedup();
        Self {
            num_families: catalog.len(),
            birth,
            no_birth,
        }
    }
}

/// Reachability of every (age index, family index) pair.
///
/// A just-matured mother (age index 0) has no children. At age index `a` every
/// child must be at most `a` years old: none can have been born before the mother
/// matured.
pub fn explore_state_space(catalog: &FamilyCatalog, num_ages: usize) -> StateTable<bool> {
    let mut space = StateTable::new(num_ages, catalog.len(), false);
    for age_index in 0..num_ages {
        for (family_index, family) in catalog.families().iter().enumerate() {
            let reachable = if age_index == 0 {
                family.is_empty()
            } else {
                family.oldest().map_or(true, |oldest| oldest as usize <= age_index)
            };
            space.set(age_index, family_index, reachable);
        }
    }
    space
}

/// Build the full model context for a catalog and parameter set.
pub fn precompute_lookup_tables(
    catalog: FamilyCatalog,
    params: ModelParams,
    max_age: u32,
) -> Result<LifeHistoryContext, ModelError> {
    let start = Instant::now();

    let age_at_maturity = catalog.age_at_maturity();
    let mother_age_max = max_age + 1;
    if mother_age_max <= age_at_maturity {
        return Err(ModelError::InvalidMaxAge {
            max_age,
            age_at_maturity,
        });
    }
    let mother_array_max = (mother_age_max - age_at_maturity) as usize;

    let transitions = TransitionIndex::build(&catalog);
    let state_space = explore_state_space(&catalog, mother_array_max + 1);

    let ctx = LifeHistoryContext {
        catalog,
        transitions,
        state_space,
        params,
        age_at_maturity,
        mother_age_max,
        mother_array_max,
    };

    info!(
        "Lookup tables: {} families, maturity at {}, {} ages, {} reachable states ({:.2} ms)",
        ctx.num_families(),
        age_at_maturity,
        ctx.num_ages(),
        ctx.reachable_count(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(ctx)
}
