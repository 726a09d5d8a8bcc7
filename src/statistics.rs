//! Birth-interval and life-table statistics of a projected population.

use serde::Serialize;

use crate::errors::ModelError;
use crate::types::{DecisionTable, LifeHistoryContext, StateTable};

/// Summary statistics of a population distribution under a decision table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BirthIntervalStats {
    /// Mean birth interval per age index (0 where no family has a positive interval).
    pub intervals: Vec<f64>,
    /// Mass of newborns by mother age in years (`0..=motherAgeMax`).
    pub newborns: Vec<f64>,
    /// Frequency by age in years: mothers at full weight, children and newborns at
    /// half weight (daughters only).
    pub frequencies: Vec<f64>,
}

/// Compute birth intervals and life-table frequencies.
///
/// For every family with mass, the interval is the span between youngest and
/// oldest child (a newborn counts as age 0) divided by the number of gaps, in
/// whole years. The mean per age is taken over families whose interval is positive.
pub fn birth_interval_stats(
    ctx: &LifeHistoryContext,
    decisions: &DecisionTable,
    population: &StateTable<f64>,
) -> Result<BirthIntervalStats, ModelError> {
    let num_ages = ctx.num_ages();
    let nf = ctx.num_families();
    decisions.check_shape("decision", num_ages, nf)?;
    population.check_shape("population", num_ages, nf)?;

    let span = ctx.mother_age_max as usize + 1;
    let mut intervals = vec![0.0; num_ages];
    let mut newborns = vec![0.0; span];
    let mut frequencies = vec![0.0; span];

    for age_index in 0..num_ages {
        let mother_age = ctx.mother_age(age_index) as usize;
        let mut interval_sum = 0.0;
        let mut interval_weight = 0.0;

        for (family_index, &mass) in population.row(age_index).iter().enumerate() {
            if mass <= 0.0 {
                continue;
            }
            let family = ctx.catalog.get(family_index);
            let mut youngest = family.youngest().unwrap_or(0);
            let oldest = family.oldest().unwrap_or(0);
            let mut children = family.len() as u32;

            if decisions.get(age_index, family_index) {
                youngest = 0;
                children += 1;
                newborns[mother_age] += mass;
                frequencies[0] += 0.5 * mass;
            }

            if children >= 2 {
                let interval = (oldest - youngest) / (children - 1);
                interval_sum += interval as f64 * mass;
                if interval > 0 {
                    interval_weight += mass;
                }
            }

            frequencies[mother_age] += mass;
            for kid in family.ages() {
                frequencies[kid as usize] += 0.5 * mass;
            }
        }

        intervals[age_index] = if interval_weight > 0.0 {
            interval_sum / interval_weight
        } else {
            0.0
        };
    }

    Ok(BirthIntervalStats {
        intervals,
        newborns,
        frequencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FamilyCatalog;
    use crate::config::ModelParams;
    use crate::phase0_tables::precompute_lookup_tables;
    use crate::types::AgeSet;

    fn make_ctx() -> LifeHistoryContext {
        let catalog = FamilyCatalog::with_min_spacing(8, 2).unwrap();
        precompute_lookup_tables(catalog, ModelParams::default(), 30).unwrap()
    }

    #[test]
    fn test_empty_population_gives_zero_intervals() {
        let ctx = make_ctx();
        let stats =
            birth_interval_stats(&ctx, &ctx.new_table(false), &ctx.new_table(0.0)).unwrap();
        assert!(stats.intervals.iter().all(|&v| v == 0.0));
        assert_eq!(stats.newborns.len(), ctx.mother_age_max as usize + 1);
    }

    #[test]
    fn test_interval_with_newborn() {
        let ctx = make_ctx();
        let fam = ctx.catalog.index_of(AgeSet::from_ages([3, 7])).unwrap();
        let mut population = ctx.new_table(0.0);
        let mut decisions = ctx.new_table(false);
        population.set(10, fam, 0.4);
        decisions.set(10, fam, true);
        // Second family: two children, no birth, interval (8 - 2) / 1 = 6
        let other = ctx.catalog.index_of(AgeSet::from_ages([2, 8])).unwrap();
        population.set(10, other, 0.6);

        let stats = birth_interval_stats(&ctx, &decisions, &population).unwrap();
        // Newborn family: (7 - 0) / 2 = 3 in whole years
        let expected = (3.0 * 0.4 + 6.0 * 0.6) / 1.0;
        assert!((stats.intervals[10] - expected).abs() < 1e-12);

        let mother_age = ctx.mother_age(10) as usize;
        assert!((stats.newborns[mother_age] - 0.4).abs() < 1e-12);
        assert!((stats.frequencies[mother_age] - 1.0).abs() < 1e-12);
        assert!((stats.frequencies[0] - 0.2).abs() < 1e-12);
        assert!((stats.frequencies[3] - 0.2).abs() < 1e-12);
        assert!((stats.frequencies[8] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_single_child_has_no_interval() {
        let ctx = make_ctx();
        let fam = ctx.catalog.index_of(AgeSet::from_ages([4])).unwrap();
        let mut population = ctx.new_table(0.0);
        population.set(6, fam, 1.0);
        let stats = birth_interval_stats(&ctx, &ctx.new_table(false), &population).unwrap();
        assert_eq!(stats.intervals[6], 0.0);
    }
}
