//! Model constants and state-indexing functions.
//!
//! Maps model notation to concrete values:
//! - `motherAgeMax` = max age + 1 (the first age at which the mother is dead)
//! - `motherArrayMax` = `motherAgeMax - ageAtMaturity` (absorbing "dead" age index)
//! - STATE_INDEX(a, f) = [`state_index`]`(a, f, num_families)` = a * num_families + f
//!
//! The index layout groups all family compositions for the same mother age into
//! one contiguous row, so a single age can be handed to a worker as a slice.

/// Default maximum mother age in years. The mother is forced to die one year later.
pub const DEFAULT_MAX_AGE: u32 = 90;

/// Default number of forward projection steps (no convergence test).
pub const DEFAULT_FORWARD_STEPS: usize = 150;

/// Minimum number of backward iterations before convergence is checked.
pub const MIN_BACKWARD_ITERATIONS: usize = 75;

/// Default safety cap on backward iterations.
pub const DEFAULT_MAX_BACKWARD_ITERATIONS: usize = 10_000;

/// Two successive growth rates closer than this are considered converged
/// (agreement to the fourth decimal place).
pub const CONVERGENCE_TOLERANCE: f64 = 1e-4;

/// Child ages are stored in a 64-bit set; ages must stay below this bound.
pub const MAX_CHILD_AGE: u32 = 63;

/// Relative increase of a child's hazard once the mother is dead.
pub const MOTHERLESS_HAZARD_FACTOR: f64 = 11.7;

/// Children this age or younger cannot survive their mother's death.
pub const MOTHER_DEPENDENT_AGE: u32 = 2;

/// Siblings this age or older help (rather than only compete with) younger children.
pub const SIBLING_HELP_MIN_AGE: u32 = 10;

/// Weight of a maturing child's own lineage. Only daughters found new lineages.
pub const OFFSPRING_LINEAGE_WEIGHT: f64 = 0.5;

/// Mothers younger than this may be subfecund under the teenage subfecundity model.
pub const SUBFECUNDITY_AGE_LIMIT: u32 = 20;

/// Probability of a wanted birth actually happening at mother ages 15..=19.
pub const TEENAGE_BIRTH_PROBABILITIES: [(u32, f64); 5] =
    [(15, 0.25), (16, 0.40), (17, 0.55), (18, 0.70), (19, 0.85)];

/// Map state S = (age_index, family_index) to flat array index.
#[inline(always)]
pub fn state_index(age_index: usize, family_index: usize, num_families: usize) -> usize {
    debug_assert!(family_index < num_families);
    age_index * num_families + family_index
}

/// Probability that a mother of `mother_age` who decides to give birth actually
/// conceives this year. 1.0 from age 20.
pub fn teenage_birth_probability(mother_age: u32) -> f64 {
    TEENAGE_BIRTH_PROBABILITIES
        .iter()
        .find(|&&(age, _)| age == mother_age)
        .map(|&(_, p)| p)
        .unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_index_row_major() {
        assert_eq!(state_index(0, 0, 10), 0);
        assert_eq!(state_index(0, 9, 10), 9);
        assert_eq!(state_index(1, 0, 10), 10);
        assert_eq!(state_index(3, 4, 10), 34);
    }

    #[test]
    fn test_teenage_birth_probability() {
        assert_eq!(teenage_birth_probability(15), 0.25);
        assert_eq!(teenage_birth_probability(17), 0.55);
        assert_eq!(teenage_birth_probability(19), 0.85);
        assert_eq!(teenage_birth_probability(20), 1.0);
        assert_eq!(teenage_birth_probability(35), 1.0);
    }
}
