//! A single model run: the context plus everything the solvers produce.
//!
//! [`SimulationRun`] owns the mutable run state (decision table, population,
//! growth rate) so that the phases can be run separately, e.g. forward projection
//! from imported decisions, or statistics from an imported population.

use serde::Serialize;

use crate::catalog::FamilyCatalog;
use crate::config::{ModelConfig, ModelParams};
use crate::density::forward::{founding_population, project_population, ForwardResult};
use crate::errors::ModelError;
use crate::phase0_tables::precompute_lookup_tables;
use crate::state_computation::{solve_backward, BackwardResult};
use crate::statistics::{birth_interval_stats, BirthIntervalStats};
use crate::types::{DecisionTable, LifeHistoryContext, StateTable};

pub struct SimulationRun {
    ctx: LifeHistoryContext,
    config: ModelConfig,
    decisions: Option<DecisionTable>,
    population: StateTable<f64>,
    growth_rate: Option<f64>,
    backward: Option<BackwardResult>,
    forward: Option<ForwardResult>,
    statistics: Option<BirthIntervalStats>,
}

/// JSON summary of a run.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub label: String,
    pub params: &'a ModelParams,
    pub config: &'a ModelConfig,
    pub num_families: usize,
    pub age_at_maturity: u32,
    pub growth_rate: Option<f64>,
    pub backward_iterations: Option<usize>,
    pub backward_growth_history: Option<&'a [f64]>,
    pub forward_mass_growth: Option<f64>,
    pub statistics: Option<&'a BirthIntervalStats>,
}

impl SimulationRun {
    /// Start a run on a prepared context, with all population mass on the
    /// founding state.
    pub fn new(ctx: LifeHistoryContext, config: ModelConfig) -> Self {
        let population = founding_population(&ctx);
        Self {
            ctx,
            config,
            decisions: None,
            population,
            growth_rate: None,
            backward: None,
            forward: None,
            statistics: None,
        }
    }

    /// Build the lookup tables for `catalog` and start a run.
    pub fn build(
        catalog: FamilyCatalog,
        params: ModelParams,
        config: ModelConfig,
    ) -> Result<Self, ModelError> {
        let ctx = precompute_lookup_tables(catalog, params, config.max_age)?;
        Ok(Self::new(ctx, config))
    }

    /// Solve for the optimal decisions. Replaces any imported decision table.
    pub fn run_backward(&mut self) -> Result<&BackwardResult, ModelError> {
        let result = solve_backward(&self.ctx, &self.config)?;
        self.decisions = Some(result.decisions.clone());
        self.growth_rate = Some(result.growth_rate);
        Ok(self.backward.insert(result))
    }

    /// Project the current population forward under the current decisions.
    pub fn run_forward(&mut self) -> Result<&ForwardResult, ModelError> {
        let decisions = self.decisions.as_ref().ok_or(ModelError::MissingDecisions)?;
        let result = project_population(&self.ctx, decisions, &self.population, &self.config)?;
        self.population = result.population.clone();
        if let Some(r) = result.growth_rate() {
            self.growth_rate = Some(r);
        }
        Ok(self.forward.insert(result))
    }

    /// Birth-interval statistics of the current population.
    pub fn compute_statistics(&mut self) -> Result<&BirthIntervalStats, ModelError> {
        let decisions = self.decisions.as_ref().ok_or(ModelError::MissingDecisions)?;
        let stats = birth_interval_stats(&self.ctx, decisions, &self.population)?;
        Ok(self.statistics.insert(stats))
    }

    /// Replace the decision table. Must match the context's shape.
    pub fn import_decisions(&mut self, decisions: DecisionTable) -> Result<(), ModelError> {
        decisions.check_shape("decision", self.ctx.num_ages(), self.ctx.num_families())?;
        self.decisions = Some(decisions);
        Ok(())
    }

    /// Replace the population table. Must match the context's shape.
    pub fn import_population(&mut self, population: StateTable<f64>) -> Result<(), ModelError> {
        population.check_shape("population", self.ctx.num_ages(), self.ctx.num_families())?;
        self.population = population;
        Ok(())
    }

    pub fn set_growth_rate(&mut self, r: f64) {
        self.growth_rate = Some(r);
    }

    pub fn context(&self) -> &LifeHistoryContext {
        &self.ctx
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn label(&self) -> String {
        self.ctx.params.label()
    }

    pub fn decisions(&self) -> Option<&DecisionTable> {
        self.decisions.as_ref()
    }

    pub fn population(&self) -> &StateTable<f64> {
        &self.population
    }

    pub fn growth_rate(&self) -> Option<f64> {
        self.growth_rate
    }

    pub fn backward(&self) -> Option<&BackwardResult> {
        self.backward.as_ref()
    }

    pub fn forward(&self) -> Option<&ForwardResult> {
        self.forward.as_ref()
    }

    pub fn statistics(&self) -> Option<&BirthIntervalStats> {
        self.statistics.as_ref()
    }

    pub fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            label: self.label(),
            params: &self.ctx.params,
            config: &self.config,
            num_families: self.ctx.num_families(),
            age_at_maturity: self.ctx.age_at_maturity,
            growth_rate: self.growth_rate,
            backward_iterations: self.backward.as_ref().map(|b| b.iterations),
            backward_growth_history: self.backward.as_ref().map(|b| b.growth_history.as_slice()),
            forward_mass_growth: self.forward.as_ref().and_then(|f| f.mass_growth()),
            statistics: self.statistics.as_ref(),
        }
    }
}
