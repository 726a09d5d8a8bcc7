//! Core data structures: child-age sets, dense state tables, and the model context.
//!
//! The central type is [`LifeHistoryContext`], which holds the family catalog, the
//! transition index, the reachable state space and the model parameters. It is
//! built once by [`crate::phase0_tables::precompute_lookup_tables`] and then shared
//! immutably across rayon workers by both solvers.

use std::fmt;

use crate::catalog::FamilyCatalog;
use crate::config::ModelParams;
use crate::constants::*;
use crate::errors::ModelError;
use crate::phase0_tables::TransitionIndex;

/// A family composition: the set of ages of a mother's dependent children.
///
/// Stored as a 64-bit mask where bit `a` is set if a child aged `a` is present.
/// Two children in one family never share an age, so a set is exact, and the
/// representation gives an order-independent `Eq`/`Hash` for catalog lookups.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AgeSet(u64);

impl AgeSet {
    pub const EMPTY: AgeSet = AgeSet(0);

    pub fn from_ages<I: IntoIterator<Item = u32>>(ages: I) -> Self {
        let mut set = AgeSet::EMPTY;
        for age in ages {
            set.insert(age);
        }
        set
    }

    #[inline(always)]
    pub fn bits(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline(always)]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline(always)]
    pub fn contains(self, age: u32) -> bool {
        age <= MAX_CHILD_AGE && (self.0 >> age) & 1 == 1
    }

    #[inline(always)]
    pub fn insert(&mut self, age: u32) {
        debug_assert!(age <= MAX_CHILD_AGE, "child age {} out of range", age);
        self.0 |= 1 << age;
    }

    #[inline(always)]
    pub fn toggle(&mut self, age: u32) {
        debug_assert!(age <= MAX_CHILD_AGE, "child age {} out of range", age);
        self.0 ^= 1 << age;
    }

    /// Copy of this set with `age` added.
    pub fn with(mut self, age: u32) -> Self {
        self.insert(age);
        self
    }

    pub fn youngest(self) -> Option<u32> {
        (!self.is_empty()).then(|| self.0.trailing_zeros())
    }

    pub fn oldest(self) -> Option<u32> {
        (!self.is_empty()).then(|| 63 - self.0.leading_zeros())
    }

    /// Ages in ascending order.
    pub fn ages(self) -> Ages {
        Ages(self.0)
    }

    /// Next year's family without a birth: every child is one year older and
    /// children reaching `age_at_maturity` leave.
    #[inline(always)]
    pub fn aged(self, age_at_maturity: u32) -> AgeSet {
        let keep = if age_at_maturity > MAX_CHILD_AGE {
            u64::MAX
        } else {
            (1u64 << age_at_maturity) - 1
        };
        AgeSet((self.0 << 1) & keep)
    }
}

impl fmt::Debug for AgeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ages()).finish()
    }
}

impl fmt::Display for AgeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for age in self.ages() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", age)?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<u32> for AgeSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        AgeSet::from_ages(iter)
    }
}

/// Ascending iterator over the ages in an [`AgeSet`].
pub struct Ages(u64);

impl Iterator for Ages {
    type Item = u32;

    #[inline(always)]
    fn next(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        let age = self.0.trailing_zeros();
        self.0 &= self.0 - 1;
        Some(age)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Ages {}

/// Dense table over (age_index, family_index), stored row-major in one flat Vec.
///
/// Used for fitness (F1/F2), birth decisions, the state space and the population
/// distribution (NoFam1/NoFam2). Every table of a run has the same shape:
/// `motherArrayMax + 1` rows by `numFamilies` columns.
#[derive(Clone, Debug, PartialEq)]
pub struct StateTable<T> {
    num_ages: usize,
    num_families: usize,
    cells: Vec<T>,
}

impl<T: Clone> StateTable<T> {
    pub fn new(num_ages: usize, num_families: usize, fill: T) -> Self {
        Self {
            num_ages,
            num_families,
            cells: vec![fill; num_ages * num_families],
        }
    }

    pub fn fill(&mut self, value: T) {
        for cell in self.cells.iter_mut() {
            *cell = value.clone();
        }
    }
}

impl<T> StateTable<T> {
    /// Build a table from nested rows, accepting it verbatim when the shape is
    /// `num_ages x num_families`.
    pub fn from_rows(
        what: &'static str,
        rows: Vec<Vec<T>>,
        num_ages: usize,
        num_families: usize,
    ) -> Result<Self, ModelError> {
        let mismatch = |cols: usize| ModelError::DimensionMismatch {
            what,
            rows: rows.len(),
            cols,
            expected_rows: num_ages,
            expected_cols: num_families,
        };
        if rows.len() != num_ages {
            let cols = rows.first().map_or(0, Vec::len);
            return Err(mismatch(cols));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != num_families) {
            return Err(mismatch(bad.len()));
        }
        Ok(Self {
            num_ages,
            num_families,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    #[inline(always)]
    pub fn num_ages(&self) -> usize {
        self.num_ages
    }

    #[inline(always)]
    pub fn num_families(&self) -> usize {
        self.num_families
    }

    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.cells
    }

    pub fn row(&self, age_index: usize) -> &[T] {
        let start = age_index * self.num_families;
        &self.cells[start..start + self.num_families]
    }

    pub fn row_mut(&mut self, age_index: usize) -> &mut [T] {
        let start = age_index * self.num_families;
        &mut self.cells[start..start + self.num_families]
    }

    /// Error unless this table is `num_ages x num_families`.
    pub fn check_shape(
        &self,
        what: &'static str,
        num_ages: usize,
        num_families: usize,
    ) -> Result<(), ModelError> {
        if self.num_ages == num_ages && self.num_families == num_families {
            Ok(())
        } else {
            Err(ModelError::DimensionMismatch {
                what,
                rows: self.num_ages,
                cols: self.num_families,
                expected_rows: num_ages,
                expected_cols: num_families,
            })
        }
    }
}

impl<T: Copy> StateTable<T> {
    #[inline(always)]
    pub fn get(&self, age_index: usize, family_index: usize) -> T {
        self.cells[state_index(age_index, family_index, self.num_families)]
    }

    #[inline(always)]
    pub fn set(&mut self, age_index: usize, family_index: usize, value: T) {
        let i = state_index(age_index, family_index, self.num_families);
        self.cells[i] = value;
    }
}

impl StateTable<f64> {
    pub fn sum(&self) -> f64 {
        self.cells.iter().sum()
    }
}

/// Optimal birth decision per state: `true` = give birth this year.
pub type DecisionTable = StateTable<bool>;

/// Core context: the catalog-derived lookup tables and the model parameters.
///
/// Shared immutably between the backward and forward solvers. Mutable run state
/// (fitness, decisions, population) lives in [`crate::run::SimulationRun`].
pub struct LifeHistoryContext {
    pub catalog: FamilyCatalog,
    pub transitions: TransitionIndex,
    /// state_space[a][f] = true if composition f is reachable at age index a.
    pub state_space: StateTable<bool>,
    pub params: ModelParams,
    /// Oldest child age in the catalog + 1. Children this age leave the family.
    pub age_at_maturity: u32,
    /// First mother age at which the mother is dead (max age + 1).
    pub mother_age_max: u32,
    /// Age index of the absorbing "mother has died" row.
    pub mother_array_max: usize,
}

impl LifeHistoryContext {
    #[inline(always)]
    pub fn num_families(&self) -> usize {
        self.catalog.len()
    }

    /// Rows in every state table: `motherArrayMax + 1`.
    #[inline(always)]
    pub fn num_ages(&self) -> usize {
        self.mother_array_max + 1
    }

    #[inline(always)]
    pub fn num_states(&self) -> usize {
        self.num_ages() * self.num_families()
    }

    /// Mother age in years at `age_index`.
    #[inline(always)]
    pub fn mother_age(&self, age_index: usize) -> u32 {
        age_index as u32 + self.age_at_maturity
    }

    #[inline(always)]
    pub fn state_index(&self, age_index: usize, family_index: usize) -> usize {
        state_index(age_index, family_index, self.num_families())
    }

    #[inline(always)]
    pub fn is_reachable(&self, age_index: usize, family_index: usize) -> bool {
        self.state_space.get(age_index, family_index)
    }

    pub fn reachable_count(&self) -> usize {
        self.state_space.as_slice().iter().filter(|&&v| v).count()
    }

    /// A table with this context's shape, every cell set to `fill`.
    pub fn new_table<T: Clone>(&self, fill: T) -> StateTable<T> {
        StateTable::new(self.num_ages(), self.num_families(), fill)
    }
}
