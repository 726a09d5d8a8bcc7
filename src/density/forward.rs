//! Forward projection: propagate the population distribution year by year.
//!
//! Starting from a population table (normally all mass on the just-matured,
//! childless mother), each step:
//! 1. applies the decision table to every state with mass, optionally overriding
//!    births of teenage mothers with seeded subfecundity draws
//! 2. computes each state's transitions in parallel
//! 3. merges them into the next table sequentially in source order, so the result
//!    does not depend on the number of threads
//! 4. records growth statistics and renormalises to total mass 1

use std::time::Instant;

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::ModelConfig;
use crate::constants::*;
use crate::errors::ModelError;
use crate::types::{DecisionTable, LifeHistoryContext, StateTable};

use super::transitions::{compute_transitions, TransitionSet};

/// Statistics of one projection step, taken before renormalisation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    /// New founding-state mass over the previous step's unnormalised founding-state
    /// mass. `None` while the previous mass is zero.
    pub growth_rate: Option<f64>,
    /// Total unnormalised mass: the population multiplication factor of the step.
    pub total_mass: f64,
}

/// Result of a forward projection.
#[derive(Clone, Debug)]
pub struct ForwardResult {
    /// Normalised population after the final step.
    pub population: StateTable<f64>,
    pub steps: Vec<StepRecord>,
    /// Per age index: growth of the age class's total mass in the final step.
    pub age_growth: Vec<f64>,
    /// Per age index: growth of the childless-mother mass in the final step.
    pub reference_growth: Vec<f64>,
}

impl ForwardResult {
    /// Founding-state growth rate of the final step.
    pub fn growth_rate(&self) -> Option<f64> {
        self.steps.last().and_then(|s| s.growth_rate)
    }

    /// Total-mass growth of the final step.
    pub fn mass_growth(&self) -> Option<f64> {
        self.steps.last().map(|s| s.total_mass)
    }
}

/// The standard starting population: all mass on (0, childless).
pub fn founding_population(ctx: &LifeHistoryContext) -> StateTable<f64> {
    let mut population = ctx.new_table(0.0);
    population.set(0, 0, 1.0);
    population
}

/// Resolve this step's birth decisions for the active states.
///
/// A wanted birth by a mother younger than 20 happens with the teenage
/// probability for her age; draws are made in state order.
fn effective_decisions(
    ctx: &LifeHistoryContext,
    decisions: &DecisionTable,
    active: &[(usize, f64)],
    subfecundity: Option<&mut SmallRng>,
) -> Vec<bool> {
    let nf = ctx.num_families();
    let mut wanted: Vec<bool> = active
        .iter()
        .map(|&(si, _)| decisions.as_slice()[si])
        .collect();

    if let Some(rng) = subfecundity {
        for (k, &(si, _)) in active.iter().enumerate() {
            let mother_age = ctx.mother_age(si / nf);
            if wanted[k] && mother_age < SUBFECUNDITY_AGE_LIMIT {
                let p = teenage_birth_probability(mother_age);
                if rng.gen::<f64>() >= p {
                    wanted[k] = false;
                }
            }
        }
    }
    wanted
}

/// Project `initial` forward `config.forward_steps` years under `decisions`.
pub fn project_population(
    ctx: &LifeHistoryContext,
    decisions: &DecisionTable,
    initial: &StateTable<f64>,
    config: &ModelConfig,
) -> Result<ForwardResult, ModelError> {
    let num_ages = ctx.num_ages();
    let nf = ctx.num_families();
    decisions.check_shape("decision", num_ages, nf)?;
    initial.check_shape("population", num_ages, nf)?;

    let t_total = Instant::now();
    info!(
        "=== Forward projection: {} steps, subfecundity {} ===",
        config.forward_steps,
        if config.teenage_subfecundity { "on" } else { "off" }
    );

    let mut rng = SmallRng::seed_from_u64(config.seed);
    let mut current = initial.clone();
    let mut next = ctx.new_table(0.0);

    let mut age_mass_prev = vec![1.0f64; num_ages];
    let mut age_mass_now = vec![1.0f64; num_ages];
    let mut age_growth = vec![1.0f64; num_ages];
    let mut reference_prev = vec![1.0f64; num_ages];
    let mut reference_growth = vec![1.0f64; num_ages];
    let mut founding_prev = initial.get(0, 0);
    let mut steps = Vec::with_capacity(config.forward_steps);

    for step in 0..config.forward_steps {
        let active: Vec<(usize, f64)> = current
            .as_slice()
            .iter()
            .enumerate()
            .filter(|&(_, &mass)| mass != 0.0)
            .map(|(si, &mass)| (si, mass))
            .collect();

        let gives_birth = effective_decisions(
            ctx,
            decisions,
            &active,
            config.teenage_subfecundity.then_some(&mut rng),
        );

        // Phase 1: transitions of every active state, in parallel.
        let transitions: Vec<TransitionSet> = active
            .par_iter()
            .zip(gives_birth.par_iter())
            .map(|(&(si, _), &birth)| {
                let mut set = TransitionSet::new();
                compute_transitions(ctx, si / nf, si % nf, birth, &mut set);
                set
            })
            .collect();

        // Phase 2: sequential merge in source order.
        next.fill(0.0);
        {
            let dest = next.as_mut_slice();
            for (&(_, mass), set) in active.iter().zip(&transitions) {
                for t in &set.transitions {
                    dest[t.next_state as usize] += t.prob * mass;
                }
                dest[0] += OFFSPRING_LINEAGE_WEIGHT * mass * set.maturing_survival;
            }
        }

        // Phase 3: growth statistics on the unnormalised table.
        for a in 0..num_ages {
            let mass: f64 = next.row(a).iter().sum();
            if mass > 0.0 {
                age_mass_now[a] = mass;
            }
            age_growth[a] = age_mass_now[a] / age_mass_prev[a];
            age_mass_prev[a] = age_mass_now[a];

            let childless = next.get(a, 0);
            if childless > 0.0 {
                reference_growth[a] = childless / reference_prev[a];
                reference_prev[a] = childless;
            }
        }

        let founding = next.get(0, 0);
        let growth_rate = (founding_prev > 0.0).then(|| founding / founding_prev);
        founding_prev = founding;

        let total_mass = next.sum();
        if !(total_mass.is_finite() && total_mass > 0.0) {
            return Err(ModelError::PopulationExtinct { step });
        }
        for v in next.as_mut_slice().iter_mut() {
            *v /= total_mass;
        }
        std::mem::swap(&mut current, &mut next);

        debug!(
            "Step {:3}: {} active states, total mass {:.6}, r={:?}",
            step,
            active.len(),
            total_mass,
            growth_rate
        );
        steps.push(StepRecord {
            step,
            growth_rate,
            total_mass,
        });
    }

    info!(
        "Forward projection done in {:.2} s; mass growth {:?}",
        t_total.elapsed().as_secs_f64(),
        steps.last().map(|s| s.total_mass)
    );

    Ok(ForwardResult {
        population: current,
        steps,
        age_growth,
        reference_growth,
    })
}
