//! Per-state transition computation shared by the backward and forward solvers.
//!
//! For a given (age index, family index) and birth decision, enumerates every
//! outcome of one year:
//! - which subset of the current children survives
//! - whether the mother survives
//! - whether this year's newborn (if any) survives
//!
//! Each outcome with a valid target becomes one [`StateTransition`]. Outcomes whose
//! target composition is missing from the catalog are dropped.

use crate::constants::*;
use crate::subsets::Subsets;
use crate::survival::SurvivalModel;
use crate::types::LifeHistoryContext;

/// A single transition: from the current state to `next_state` with probability `prob`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateTransition {
    pub next_state: u32,
    pub prob: f64,
    /// The surviving children include one who reaches maturity next year.
    pub matures: bool,
}

/// All transitions out of one state, plus the total probability that a child
/// reaches maturity this year.
#[derive(Debug, Clone, Default)]
pub struct TransitionSet {
    pub transitions: Vec<StateTransition>,
    /// Sum over surviving subsets containing a child of `ageAtMaturity - 1` of the
    /// subset's probability, whether or not the target composition exists.
    pub maturing_survival: f64,
}

impl TransitionSet {
    pub fn new() -> Self {
        Self {
            transitions: Vec::with_capacity(64),
            maturing_survival: 0.0,
        }
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
        self.maturing_survival = 0.0;
    }

    /// Total probability over all kept transitions.
    pub fn total_prob(&self) -> f64 {
        self.transitions.iter().map(|t| t.prob).sum()
    }
}

/// Birth is only possible for a living mother without a one-year-old.
#[inline(always)]
pub fn birth_feasible(ctx: &LifeHistoryContext, age_index: usize, family_index: usize) -> bool {
    ctx.mother_age(age_index) < ctx.mother_age_max && !ctx.catalog.get(family_index).contains(1)
}

/// Compute every transition out of (`age_index`, `family_index`) under the given
/// birth decision into `out` (cleared first).
///
/// Children's survival is evaluated at the mother's current age in both mother
/// branches. The newborn survives with the mother's care when she lives and as
/// an orphan when she dies.
pub fn compute_transitions(
    ctx: &LifeHistoryContext,
    age_index: usize,
    family_index: usize,
    gives_birth: bool,
    out: &mut TransitionSet,
) {
    out.clear();

    let model = SurvivalModel::for_context(ctx);
    let family = ctx.catalog.get(family_index);
    let mother_age = ctx.mother_age(age_index);
    let mother_alive = mother_age < ctx.mother_age_max;
    let maturing_age = ctx.age_at_maturity.saturating_sub(1);
    let nf = ctx.num_families();

    let p_mother = model.mother(mother_age, gives_birth);
    let (newborn_alive, newborn_orphan) = if gives_birth {
        (
            model.child(mother_age, family, true, 0),
            model.child(model.mother_age_max(), family, true, 0),
        )
    } else {
        (1.0, 1.0)
    };

    // Each child's survival is independent of which siblings survive.
    let mut child_survival = [0.0f64; 64];
    let mut ages = [0u32; 64];
    let mut num_children = 0;
    for age in family.ages() {
        ages[num_children] = age;
        child_survival[num_children] = model.child(mother_age, family, gives_birth, age);
        num_children += 1;
    }

    let next_age_alive = age_index + 1;
    let dead_row = ctx.mother_array_max;

    for survivors in Subsets::of(family) {
        let mut p_children = 1.0;
        for k in 0..num_children {
            let s = child_survival[k];
            p_children *= if survivors.contains(ages[k]) { s } else { 1.0 - s };
        }
        if p_children == 0.0 {
            continue;
        }

        let matures = survivors.contains(maturing_age);
        if matures {
            out.maturing_survival += p_children;
        }

        let next_with_newborn = ctx.transitions.next_for(&ctx.catalog, survivors, gives_birth);
        let next_without = ctx.transitions.next_for(&ctx.catalog, survivors, false);

        let mut push = |row: usize, target: Option<usize>, prob: f64| {
            if let Some(fam) = target {
                if prob > 0.0 {
                    out.transitions.push(StateTransition {
                        next_state: state_index(row, fam, nf) as u32,
                        prob,
                        matures,
                    });
                }
            }
        };

        if mother_alive {
            let p = p_mother * p_children;
            push(next_age_alive, next_with_newborn, p * newborn_alive);
            push(next_age_alive, next_without, p * (1.0 - newborn_alive));
        }
        let p = (1.0 - p_mother) * p_children;
        push(dead_row, next_with_newborn, p * newborn_orphan);
        push(dead_row, next_without, p * (1.0 - newborn_orphan));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FamilyCatalog;
    use crate::config::{ModelParams, MortalityLevel, SilerParams};
    use crate::phase0_tables::precompute_lookup_tables;
    use crate::types::AgeSet;

    fn make_ctx(params: ModelParams) -> LifeHistoryContext {
        let catalog = FamilyCatalog::with_min_spacing(6, 2).unwrap();
        precompute_lookup_tables(catalog, params, 30).unwrap()
    }

    fn mortal() -> ModelParams {
        ModelParams {
            siler: SilerParams::new(0.3, 0.4, 0.02, 0.001, 0.07),
            childbirth_mortality: MortalityLevel::High,
            sibling_competition: MortalityLevel::Medium,
            sibling_help: MortalityLevel::Low,
            ..ModelParams::default()
        }
    }

    #[test]
    fn test_childless_no_birth_zero_mortality() {
        let ctx = make_ctx(ModelParams::default());
        let mut out = TransitionSet::new();
        compute_transitions(&ctx, 0, 0, false, &mut out);
        assert_eq!(
            out.transitions,
            vec![StateTransition {
                next_state: ctx.state_index(1, 0) as u32,
                prob: 1.0,
                matures: false,
            }]
        );
    }

    #[test]
    fn test_probabilities_sum_to_one_when_targets_exist() {
        let ctx = make_ctx(mortal());
        let mut out = TransitionSet::new();
        let fam = ctx.catalog.index_of(AgeSet::from_ages([2, 4, 6])).unwrap();
        for gives_birth in [false, true] {
            compute_transitions(&ctx, 10, fam, gives_birth, &mut out);
            assert!((out.total_prob() - 1.0).abs() < 1e-12, "birth={}", gives_birth);
        }
    }

    #[test]
    fn test_dead_mother_stays_in_dead_row() {
        let ctx = make_ctx(mortal());
        let mut out = TransitionSet::new();
        let last = ctx.mother_array_max;
        let fam = ctx.catalog.index_of(AgeSet::from_ages([1, 5])).unwrap();
        compute_transitions(&ctx, last, fam, false, &mut out);
        assert!(!out.transitions.is_empty());
        for t in &out.transitions {
            assert_eq!(t.next_state as usize / ctx.num_families(), last);
        }
        // The one-year-old cannot survive without the mother: only {} and {5} survive
        assert!((out.total_prob() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_maturing_child_is_flagged() {
        let ctx = make_ctx(ModelParams::default());
        let mut out = TransitionSet::new();
        let fam = ctx.catalog.index_of(AgeSet::from_ages([6])).unwrap();
        compute_transitions(&ctx, 8, fam, false, &mut out);
        assert_eq!(out.maturing_survival, 1.0);
        assert_eq!(out.transitions.len(), 1);
        assert!(out.transitions[0].matures);
        // The six-year-old leaves: the family becomes childless
        assert_eq!(out.transitions[0].next_state as usize, ctx.state_index(9, 0));
    }

    #[test]
    fn test_birth_feasibility() {
        let ctx = make_ctx(ModelParams::default());
        let with_infant = ctx.catalog.index_of(AgeSet::from_ages([1])).unwrap();
        let with_toddler = ctx.catalog.index_of(AgeSet::from_ages([2])).unwrap();
        assert!(!birth_feasible(&ctx, 3, with_infant));
        assert!(birth_feasible(&ctx, 3, with_toddler));
        assert!(!birth_feasible(&ctx, ctx.mother_array_max, 0));
    }
}
