//! End-to-end tests: backward solution, forward projection and stored artifacts on a
//! small catalog where the answer is known.

use birth_intervals::catalog::FamilyCatalog;
use birth_intervals::config::{ModelConfig, ModelParams, MortalityLevel, SilerParams};
use birth_intervals::density::forward::{founding_population, project_population};
use birth_intervals::errors::ModelError;
use birth_intervals::phase0_tables::precompute_lookup_tables;
use birth_intervals::run::SimulationRun;
use birth_intervals::state_computation::solve_backward;
use birth_intervals::storage::{self, OutputPaths};
use birth_intervals::types::LifeHistoryContext;

/// Childless, one one-year-old, one two-year-old: maturity at 3.
fn tiny_ctx(params: ModelParams) -> LifeHistoryContext {
    let catalog = FamilyCatalog::parse("\n1\n2\n").unwrap();
    precompute_lookup_tables(catalog, params, 10).unwrap()
}

fn tiny_config() -> ModelConfig {
    ModelConfig {
        max_age: 10,
        forward_steps: 300,
        ..ModelConfig::default()
    }
}

#[test]
fn test_zero_mortality_backward() {
    let ctx = tiny_ctx(ModelParams::default());
    let result = solve_backward(&ctx, &tiny_config()).unwrap();

    assert_eq!(result.iterations, 76);
    assert!(
        (result.growth_rate - 1.08644).abs() < 1e-3,
        "r={}",
        result.growth_rate
    );
    assert!(result.decisions.get(0, 0), "a new mother should give birth");
    assert!(result.fitness.as_slice().iter().all(|v| v.is_finite() && *v >= 0.0));
    assert_eq!(result.growth_history.len(), result.iterations);
}

#[test]
fn test_backward_is_deterministic() {
    let ctx = tiny_ctx(ModelParams::default());
    let a = solve_backward(&ctx, &tiny_config()).unwrap();
    let b = solve_backward(&ctx, &tiny_config()).unwrap();
    assert_eq!(a.growth_rate, b.growth_rate);
    assert_eq!(a.decisions, b.decisions);
    assert_eq!(a.fitness, b.fitness);
}

#[test]
fn test_forward_growth_matches_backward() {
    let ctx = tiny_ctx(ModelParams::default());
    let config = tiny_config();
    let backward = solve_backward(&ctx, &config).unwrap();
    let forward =
        project_population(&ctx, &backward.decisions, &founding_population(&ctx), &config).unwrap();

    let mass_growth = forward.mass_growth().unwrap();
    assert!(
        (mass_growth - backward.growth_rate).abs() < 1e-3,
        "forward {} vs backward {}",
        mass_growth,
        backward.growth_rate
    );
    assert!((forward.population.sum() - 1.0).abs() < 1e-9);
}

#[test]
fn test_iteration_cap() {
    let ctx = tiny_ctx(ModelParams::default());
    let config = ModelConfig {
        max_backward_iterations: 50,
        ..tiny_config()
    };
    let err = solve_backward(&ctx, &config).unwrap_err();
    assert!(matches!(
        err,
        ModelError::DidNotConverge { iterations: 50, .. }
    ));
}

#[test]
fn test_mortality_lowers_growth() {
    let safe = solve_backward(&tiny_ctx(ModelParams::default()), &tiny_config()).unwrap();
    let params = ModelParams {
        siler: SilerParams::new(0.3, 0.4, 0.02, 0.001, 0.07),
        childbirth_mortality: MortalityLevel::High,
        ..ModelParams::default()
    };
    let risky = solve_backward(&tiny_ctx(params), &tiny_config()).unwrap();
    assert!(risky.growth_rate < safe.growth_rate);
}

#[test]
fn test_artifacts_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FamilyCatalog::parse("\n1\n2\n").unwrap();
    let mut run = SimulationRun::build(catalog, ModelParams::default(), tiny_config()).unwrap();
    let r = run.run_backward().unwrap().growth_rate;
    run.run_forward().unwrap();

    let paths = OutputPaths::new(dir.path(), &run.label());
    let decisions = run.decisions().unwrap().clone();
    storage::write_births(&paths.births, run.context(), &decisions).unwrap();
    storage::append_growth_rate(&paths.growth_rate, r).unwrap();
    storage::write_population(&paths.population, run.context(), run.population()).unwrap();

    assert_eq!(
        storage::read_births(&paths.births, run.context()).unwrap(),
        decisions
    );
    let population = storage::read_population(&paths.population, run.context()).unwrap();
    for (a, b) in population.as_slice().iter().zip(run.population().as_slice()) {
        assert!((a - b).abs() < 1e-12);
    }
    let stored_r = storage::read_growth_rate(&paths.growth_rate).unwrap();
    assert!((stored_r - r).abs() < 1e-12);
}

#[test]
fn test_forward_normalised_each_year() {
    let ctx = tiny_ctx(ModelParams::default());
    let backward = solve_backward(&ctx, &tiny_config()).unwrap();
    let one_year = ModelConfig {
        forward_steps: 1,
        ..tiny_config()
    };
    let mut population = founding_population(&ctx);
    for year in 0..60 {
        let result = project_population(&ctx, &backward.decisions, &population, &one_year).unwrap();
        assert!(
            (result.population.sum() - 1.0).abs() < 1e-9,
            "year {}: {}",
            year,
            result.population.sum()
        );
        population = result.population;
    }
}
