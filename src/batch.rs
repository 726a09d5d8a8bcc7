//! Run jobs: one parameter set plus a run mode, executed end to end.
//!
//! A batch parameter file holds one job per line:
//!
//! ```text
//! population childbirth siblingComp siblingHelp a1 b1 a2 a3 b3 [births [population growth]]
//! ```
//!
//! With a births file the backward phase is skipped. With population and growth
//! files as well, both solvers are skipped and only statistics are computed.
//! The maternal mortality curve comes from the batch's [`ModelConfig`]. Jobs share
//! nothing and run in parallel.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{error, info};
use rayon::prelude::*;

use crate::catalog::FamilyCatalog;
use crate::config::{MaternalMortalityCurve, ModelConfig, ModelParams, MortalityLevel, SilerParams};
use crate::errors::{BatchError, StorageError};
use crate::run::SimulationRun;
use crate::storage::{self, OutputPaths};

/// Which phases a job runs.
#[derive(Clone, Debug, PartialEq)]
pub enum RunMode {
    /// Backward, forward, statistics.
    Full,
    /// Backward only: decisions and growth rate.
    BackwardOnly,
    /// Forward and statistics from imported decisions.
    ForwardFrom { births: PathBuf },
    /// Statistics from imported decisions, population and growth rate.
    StatisticsFrom {
        births: PathBuf,
        population: PathBuf,
        growth: PathBuf,
    },
}

impl RunMode {
    /// The same mode with relative import paths anchored at `dir`.
    pub fn resolved_against(&self, dir: &Path) -> RunMode {
        match self {
            RunMode::Full | RunMode::BackwardOnly => self.clone(),
            RunMode::ForwardFrom { births } => RunMode::ForwardFrom {
                births: dir.join(births),
            },
            RunMode::StatisticsFrom {
                births,
                population,
                growth,
            } => RunMode::StatisticsFrom {
                births: dir.join(births),
                population: dir.join(population),
                growth: dir.join(growth),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunJob {
    pub params: ModelParams,
    pub mode: RunMode,
}

/// What a finished job reports.
#[derive(Clone, Debug, PartialEq)]
pub struct JobOutcome {
    pub label: String,
    pub growth_rate: Option<f64>,
}

impl RunJob {
    /// Parse one batch line. `line` is the 1-based line number for errors.
    ///
    /// Categorical levels are read leniently; unknown values mean `none`.
    pub fn parse(text: &str, line: usize) -> Result<Self, BatchError> {
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() < 9 {
            return Err(BatchError::TooFewFields {
                line,
                found: fields.len(),
            });
        }
        let num = |token: &str| {
            token.parse::<f64>().map_err(|_| BatchError::InvalidNumber {
                line,
                token: token.to_string(),
            })
        };
        let siler = SilerParams::new(
            num(fields[4])?,
            num(fields[5])?,
            num(fields[6])?,
            num(fields[7])?,
            num(fields[8])?,
        );
        let params = ModelParams {
            population: fields[0].to_string(),
            childbirth_mortality: MortalityLevel::parse_lenient(fields[1]),
            sibling_competition: MortalityLevel::parse_lenient(fields[2]),
            sibling_help: MortalityLevel::parse_lenient(fields[3]),
            siler,
            ..ModelParams::default()
        };
        let mode = match &fields[9..] {
            [] => RunMode::Full,
            [births] => RunMode::ForwardFrom {
                births: PathBuf::from(*births),
            },
            [births, population, growth, ..] => RunMode::StatisticsFrom {
                births: PathBuf::from(*births),
                population: PathBuf::from(*population),
                growth: PathBuf::from(*growth),
            },
            _ => return Err(BatchError::IncompleteImports { line }),
        };
        Ok(Self { params, mode })
    }

    /// This job under a different maternal mortality curve.
    pub fn with_curve(&self, curve: MaternalMortalityCurve) -> Self {
        let mut job = self.clone();
        job.params.maternal_mortality_curve = curve;
        job
    }
}

/// Parse a whole batch file; blank lines and `#` comments are skipped.
pub fn parse_batch(text: &str) -> Result<Vec<RunJob>, BatchError> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| {
            let l = l.trim();
            !l.is_empty() && !l.starts_with('#')
        })
        .map(|(n, l)| RunJob::parse(l, n + 1))
        .collect()
}

/// Run one job and write its artifacts into `out_dir`.
pub fn execute(
    job: &RunJob,
    catalog: &FamilyCatalog,
    config: &ModelConfig,
    out_dir: &Path,
) -> Result<JobOutcome, StorageError> {
    let start = Instant::now();
    let mut run = SimulationRun::build(catalog.clone(), job.params.clone(), config.clone())?;
    let label = run.label();
    let paths = OutputPaths::new(out_dir, &label);
    info!("-- {}: starting ({:?})", label, job.mode);

    match &job.mode {
        RunMode::Full | RunMode::BackwardOnly => {
            let (r, decisions) = {
                let backward = run.run_backward()?;
                (backward.growth_rate, backward.decisions.clone())
            };
            storage::write_births(&paths.births, run.context(), &decisions)?;
            storage::append_growth_rate(&paths.growth_rate, r)?;
            if job.mode == RunMode::Full {
                forward_and_write(&mut run, &paths)?;
                statistics_and_write(&mut run, &paths)?;
            }
        }
        RunMode::ForwardFrom { births } => {
            let decisions = storage::read_births(births, run.context())?;
            run.import_decisions(decisions)?;
            forward_and_write(&mut run, &paths)?;
            statistics_and_write(&mut run, &paths)?;
        }
        RunMode::StatisticsFrom {
            births,
            population,
            growth,
        } => {
            let decisions = storage::read_births(births, run.context())?;
            run.import_decisions(decisions)?;
            let table = storage::read_population(population, run.context())?;
            run.import_population(table)?;
            run.set_growth_rate(storage::read_growth_rate(growth)?);
            statistics_and_write(&mut run, &paths)?;
        }
    }

    storage::write_summary(&paths.summary, &run.summary())?;
    info!(
        "-- {}: finished in {:.2} s, r={:?}",
        label,
        start.elapsed().as_secs_f64(),
        run.growth_rate()
    );
    Ok(JobOutcome {
        label,
        growth_rate: run.growth_rate(),
    })
}

fn forward_and_write(run: &mut SimulationRun, paths: &OutputPaths) -> Result<(), StorageError> {
    let forward = run.run_forward()?;
    let age_growth = forward.age_growth.clone();
    let r = forward.growth_rate();
    if let Some(r) = r {
        storage::append_growth_rate(&paths.growth_rate, r)?;
    }
    storage::write_age_growth(&paths.age_growth, run.context(), &age_growth)?;
    storage::write_population(&paths.population, run.context(), run.population())?;
    Ok(())
}

fn statistics_and_write(run: &mut SimulationRun, paths: &OutputPaths) -> Result<(), StorageError> {
    let stats = run.compute_statistics()?.clone();
    storage::write_intervals(&paths.intervals, run.context(), &stats)
}

/// Run every job in parallel under the configured maternal mortality curve.
/// Results come back in job order; a failed job does not stop the others.
pub fn run_batch(
    jobs: &[RunJob],
    catalog: &FamilyCatalog,
    config: &ModelConfig,
    out_dir: &Path,
) -> Vec<Result<JobOutcome, StorageError>> {
    jobs.par_iter()
        .map(|job| {
            let job = job.with_curve(config.maternal_mortality_curve);
            let result = execute(&job, catalog, config, out_dir);
            if let Err(e) = &result {
                error!("-- {}: failed: {}", job.params.label(), e);
            }
            result
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_line() {
        let job = RunJob::parse("Hadza m l h 0.35 0.4 0.01 0.0001 0.08", 1).unwrap();
        assert_eq!(job.mode, RunMode::Full);
        assert_eq!(job.params.label(), "Hadza-MLH");
        assert_eq!(job.params.siler, SilerParams::new(0.35, 0.4, 0.01, 0.0001, 0.08));
    }

    #[test]
    fn test_parse_import_modes() {
        let job = RunJob::parse("Ache n n n 0 0 0 0 0 births.out", 1).unwrap();
        assert_eq!(
            job.mode,
            RunMode::ForwardFrom {
                births: PathBuf::from("births.out")
            }
        );
        let job = RunJob::parse("Ache n n n 0 0 0 0 0 b.out nf.out r.out", 1).unwrap();
        assert!(matches!(job.mode, RunMode::StatisticsFrom { .. }));
        assert_eq!(
            RunJob::parse("Ache n n n 0 0 0 0 0 b.out nf.out", 4),
            Err(BatchError::IncompleteImports { line: 4 })
        );
    }

    #[test]
    fn test_import_paths_resolved_against_invocation_dir() {
        let cwd = Path::new("/work/runs");
        let mode = RunMode::StatisticsFrom {
            births: PathBuf::from("Births-A-NNN.out"),
            population: PathBuf::from("/abs/NF-A-NNN.out"),
            growth: PathBuf::from("out/R-A-NNN.out"),
        };
        assert_eq!(
            mode.resolved_against(cwd),
            RunMode::StatisticsFrom {
                births: PathBuf::from("/work/runs/Births-A-NNN.out"),
                population: PathBuf::from("/abs/NF-A-NNN.out"),
                growth: PathBuf::from("/work/runs/out/R-A-NNN.out"),
            }
        );
        assert_eq!(RunMode::Full.resolved_against(cwd), RunMode::Full);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            RunJob::parse("Ache n n n 0 0", 2),
            Err(BatchError::TooFewFields { line: 2, found: 6 })
        );
        assert!(matches!(
            RunJob::parse("Ache n n n 0 x 0 0 0", 3),
            Err(BatchError::InvalidNumber { line: 3, .. })
        ));
    }

    #[test]
    fn test_unknown_level_is_none() {
        let job = RunJob::parse("Ache extreme q n 0 0 0 0 0", 1).unwrap();
        assert_eq!(job.params.childbirth_mortality, MortalityLevel::None);
        assert_eq!(job.params.label(), "Ache-NNN");
    }

    #[test]
    fn test_parse_batch_skips_comments() {
        let text = "# population runs\n\nA n n n 0 0 0 0 0\nB h h h 0 0 0 0 0\n";
        let jobs = parse_batch(text).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].params.population, "B");
    }

    #[test]
    fn test_batch_curve_reaches_survival_model() {
        use crate::survival::{maternal_mortality, SurvivalModel};

        let job = RunJob::parse("Hadza h l n 0.35 0.4 0.01 0.0001 0.08", 1).unwrap();
        assert_eq!(job.params.maternal_mortality_curve, MaternalMortalityCurve::JShaped);
        let job = job.with_curve(MaternalMortalityCurve::Exponential);
        assert_eq!(
            job.params.maternal_mortality_curve,
            MaternalMortalityCurve::Exponential
        );

        let siler = job.params.siler;
        let expected = maternal_mortality(
            MaternalMortalityCurve::Exponential,
            MortalityLevel::High,
            40,
            15,
            siler.a2,
        );
        let senescent = siler.a3 * (siler.b3 * 25.0).exp();
        let model = SurvivalModel::new(&job.params, 15, 91);
        let survival = model.mother(40, true);
        assert!((survival - (-(siler.a2 + senescent + expected)).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_run_batch_applies_configured_curve() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FamilyCatalog::parse("\n1\n2\n").unwrap();
        let config = ModelConfig {
            max_age: 10,
            forward_steps: 10,
            maternal_mortality_curve: MaternalMortalityCurve::Exponential,
            ..ModelConfig::default()
        };
        let jobs = parse_batch("Hadza h n n 0 0 0 0 0\n").unwrap();
        let results = run_batch(&jobs, &catalog, &config, dir.path());
        assert_eq!(results.len(), 1);
        let outcome = results[0].as_ref().unwrap();

        let paths = OutputPaths::new(dir.path(), &outcome.label);
        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.summary).unwrap()).unwrap();
        assert_eq!(summary["params"]["maternal_mortality_curve"], "E");
    }

    #[test]
    fn test_execute_full_and_statistics_modes() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FamilyCatalog::parse("\n1\n2\n").unwrap();
        let config = ModelConfig {
            max_age: 10,
            forward_steps: 30,
            ..ModelConfig::default()
        };
        let job = RunJob::parse("Test n n n 0 0 0 0 0", 1).unwrap();
        let outcome = execute(&job, &catalog, &config, dir.path()).unwrap();
        assert_eq!(outcome.label, "Test-NNN");
        let paths = OutputPaths::new(dir.path(), "Test-NNN");
        for p in [
            &paths.births,
            &paths.growth_rate,
            &paths.age_growth,
            &paths.population,
            &paths.intervals,
            &paths.summary,
        ] {
            assert!(p.exists(), "missing {}", p.display());
        }

        let line = format!(
            "Test n n n 0 0 0 0 0 {} {} {}",
            paths.births.display(),
            paths.population.display(),
            paths.growth_rate.display()
        );
        let stats_job = RunJob::parse(&line, 1).unwrap();
        let again = execute(&stats_job, &catalog, &config, dir.path()).unwrap();
        assert!(again.growth_rate.is_some());
    }
}
