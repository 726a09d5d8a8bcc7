//! Phase 1: Backward induction of the fitness table F to a fixed point.
//!
//! Every iteration evaluates, for each reachable (age index, family index), the
//! expected reproductive value of giving birth and of not giving birth this year
//! against last iteration's table F1, keeps the better one in F2, and records the
//! decision. F2 is then normalised by its founding-state value F2[0][0] and becomes
//! F1 for the next iteration. The normaliser divided by the previous F1[0][0] is the
//! population growth rate `r`; iteration stops once `r` settles.
//!
//! Each iteration is parallelized with rayon over age rows. A row of F2 (and of
//! the decision and candidate tables) is written by exactly one worker, and all
//! workers read only F1, so the rows can be handed out as disjoint mutable slices.

use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;

use crate::config::ModelConfig;
use crate::constants::*;
use crate::density::transitions::{birth_feasible, compute_transitions, TransitionSet};
use crate::errors::ModelError;
use crate::types::{DecisionTable, LifeHistoryContext, StateTable};

/// Converged output of the backward solver.
#[derive(Clone, Debug)]
pub struct BackwardResult {
    /// Normalised fitness of every state; F[0][0] = 1.
    pub fitness: StateTable<f64>,
    /// Optimal decision per state (`true` = give birth).
    pub decisions: DecisionTable,
    /// Unnormalised fitness of giving birth in the final iteration (0 where infeasible).
    pub birth_fitness: StateTable<f64>,
    /// Unnormalised fitness of not giving birth in the final iteration.
    pub no_birth_fitness: StateTable<f64>,
    /// Population growth rate at convergence.
    pub growth_rate: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Growth rate after every iteration.
    pub growth_history: Vec<f64>,
}

/// Expected fitness of one state under one decision, read from `f1`.
///
/// A surviving child about to mature adds her own lineage (half weighted) on every
/// branch with a valid target.
#[inline]
pub fn decision_value(
    ctx: &LifeHistoryContext,
    f1: &[f64],
    age_index: usize,
    family_index: usize,
    gives_birth: bool,
    buf: &mut TransitionSet,
) -> f64 {
    compute_transitions(ctx, age_index, family_index, gives_birth, buf);
    let lineage = OFFSPRING_LINEAGE_WEIGHT * f1[0];
    buf.transitions
        .iter()
        .map(|t| {
            let bonus = if t.matures { lineage } else { 0.0 };
            t.prob * (f1[t.next_state as usize] + bonus)
        })
        .sum()
}

/// Initial table: terminal reward 1 everywhere except the childless and
/// one-child states of the dead row.
fn initial_fitness(ctx: &LifeHistoryContext) -> StateTable<f64> {
    let mut f1 = ctx.new_table(1.0);
    let last = ctx.mother_array_max;
    for f in 0..ctx.num_families().min(2) {
        f1.set(last, f, 0.0);
    }
    f1
}

/// One backward iteration: fill F2 (unnormalised) and the decision tables from F1.
fn iterate(
    ctx: &LifeHistoryContext,
    f1: &StateTable<f64>,
    f2: &mut StateTable<f64>,
    decisions: &mut DecisionTable,
    birth_fitness: &mut StateTable<f64>,
    no_birth_fitness: &mut StateTable<f64>,
) {
    let nf = ctx.num_families();
    let f1 = f1.as_slice();

    f2.as_mut_slice()
        .par_chunks_mut(nf)
        .zip(decisions.as_mut_slice().par_chunks_mut(nf))
        .zip(birth_fitness.as_mut_slice().par_chunks_mut(nf))
        .zip(no_birth_fitness.as_mut_slice().par_chunks_mut(nf))
        .enumerate()
        .for_each_init(
            TransitionSet::new,
            |buf, (age_index, (((f2_row, dec_row), birth_row), no_birth_row))| {
                for family_index in 0..nf {
                    if !ctx.is_reachable(age_index, family_index) {
                        f2_row[family_index] = 0.0;
                        dec_row[family_index] = false;
                        birth_row[family_index] = 0.0;
                        no_birth_row[family_index] = 0.0;
                        continue;
                    }

                    let no_birth = decision_value(ctx, f1, age_index, family_index, false, buf);
                    let birth = if birth_feasible(ctx, age_index, family_index) {
                        decision_value(ctx, f1, age_index, family_index, true, buf)
                    } else {
                        0.0
                    };

                    // Ties go to not giving birth.
                    let gives_birth = birth > no_birth;
                    f2_row[family_index] = if gives_birth { birth } else { no_birth };
                    dec_row[family_index] = gives_birth;
                    birth_row[family_index] = birth;
                    no_birth_row[family_index] = no_birth;
                }
            },
        );
}

/// Run backward iteration until the growth rate converges.
///
/// At least `config.min_backward_iterations` iterations run before convergence is
/// tested. Fails with [`ModelError::DidNotConverge`] once
/// `config.max_backward_iterations` iterations have run without converging.
pub fn solve_backward(
    ctx: &LifeHistoryContext,
    config: &ModelConfig,
) -> Result<BackwardResult, ModelError> {
    let start = Instant::now();
    info!(
        "=== Backward iteration: {} reachable states, {} ages ===",
        ctx.reachable_count(),
        ctx.num_ages()
    );

    let mut f1 = initial_fitness(ctx);
    let mut f2 = ctx.new_table(0.0);
    let mut decisions = ctx.new_table(false);
    let mut birth_fitness = ctx.new_table(0.0);
    let mut no_birth_fitness = ctx.new_table(0.0);

    let mut growth_history = Vec::new();
    let mut r_prev = 0.0;
    let mut r = 0.0;

    for i in 0..config.max_backward_iterations {
        let t_iter = Instant::now();
        iterate(
            ctx,
            &f1,
            &mut f2,
            &mut decisions,
            &mut birth_fitness,
            &mut no_birth_fitness,
        );

        let normaliser = f2.get(0, 0);
        if !(normaliser.is_finite() && normaliser > 0.0) {
            return Err(ModelError::DegenerateFitness(normaliser));
        }
        r = normaliser / f1.get(0, 0);
        for v in f2.as_mut_slice().iter_mut() {
            *v /= normaliser;
        }
        growth_history.push(r);

        let converged =
            i >= config.min_backward_iterations && (r - r_prev).abs() < config.convergence_tolerance;
        r_prev = r;
        std::mem::swap(&mut f1, &mut f2);

        debug!(
            "Finished loop {} in {:.2} ms; r={}",
            i,
            t_iter.elapsed().as_secs_f64() * 1000.0,
            r
        );

        if converged {
            info!(
                "Converged after {} iterations in {:.2} s; r={:.6}",
                i + 1,
                start.elapsed().as_secs_f64(),
                r
            );
            return Ok(BackwardResult {
                fitness: f1,
                decisions,
                birth_fitness,
                no_birth_fitness,
                growth_rate: r,
                iterations: i + 1,
                growth_history,
            });
        }
    }

    Err(ModelError::DidNotConverge {
        iterations: config.max_backward_iterations,
        last_growth_rate: r,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FamilyCatalog;
    use crate::config::ModelParams;
    use crate::phase0_tables::precompute_lookup_tables;

    fn make_ctx() -> LifeHistoryContext {
        let catalog = FamilyCatalog::parse("\n1\n2\n").unwrap();
        precompute_lookup_tables(catalog, ModelParams::default(), 10).unwrap()
    }

    #[test]
    fn test_initial_fitness() {
        let ctx = make_ctx();
        let f1 = initial_fitness(&ctx);
        assert_eq!(f1.get(0, 0), 1.0);
        assert_eq!(f1.get(ctx.mother_array_max, 0), 0.0);
        assert_eq!(f1.get(ctx.mother_array_max, 1), 0.0);
        assert_eq!(f1.get(ctx.mother_array_max, 2), 1.0);
    }

    #[test]
    fn test_zero_mortality_converges_at_floor() {
        let ctx = make_ctx();
        let result = solve_backward(&ctx, &ModelConfig::default()).unwrap();
        assert_eq!(result.iterations, MIN_BACKWARD_ITERATIONS + 1);
        assert!(result.growth_rate > 1.0);
        assert_eq!(result.growth_history.len(), result.iterations);
        assert_eq!(result.fitness.get(0, 0), 1.0);
        assert!(result.decisions.get(0, 0));
    }

    #[test]
    fn test_cap_below_floor_does_not_converge() {
        let ctx = make_ctx();
        let config = ModelConfig {
            max_backward_iterations: 50,
            ..ModelConfig::default()
        };
        match solve_backward(&ctx, &config) {
            Err(ModelError::DidNotConverge { iterations, .. }) => assert_eq!(iterations, 50),
            other => panic!("expected DidNotConverge, got {:?}", other.map(|r| r.iterations)),
        }
    }

    #[test]
    fn test_unreachable_states_stay_zero() {
        let ctx = make_ctx();
        let result = solve_backward(&ctx, &ModelConfig::default()).unwrap();
        // Age index 0: only the childless family is reachable
        assert_eq!(result.fitness.get(0, 1), 0.0);
        assert_eq!(result.fitness.get(0, 2), 0.0);
        assert!(!result.decisions.get(0, 1));
    }
}
