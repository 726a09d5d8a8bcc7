//! Batch driver: one job per line of a parameter file, run in parallel.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::{error, info};

use birth_intervals::batch::{parse_batch, run_batch};
use birth_intervals::catalog::FamilyCatalog;
use birth_intervals::config::{MaternalMortalityCurve, ModelConfig};
use birth_intervals::env_config;

#[derive(Parser, Debug)]
#[command(name = "birth-intervals-batch")]
#[command(version, about = "Run every parameter set in a batch file", long_about = None)]
struct Cli {
    /// Parameter file: `population childbirth competition help a1 b1 a2 a3 b3 [births [population growth]]`
    params: PathBuf,

    /// Run configuration JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Family catalog file (defaults to the built-in 987-family catalog)
    #[arg(short, long)]
    families: Option<PathBuf>,

    /// Maternal mortality curve for every job: J or E (overrides the config file)
    #[arg(long)]
    curve: Option<String>,

    /// Apply teenage subfecundity in the forward projection
    #[arg(long)]
    teenage: bool,

    /// Output directory, relative to BIRTH_INTERVALS_BASE_PATH
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

fn main() -> ExitCode {
    env_config::init_logging();
    let cli = Cli::parse();

    // Read inputs before switching to the base path.
    let text = match std::fs::read_to_string(&cli.params) {
        Ok(t) => t,
        Err(e) => {
            error!("{}: {}", cli.params.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let jobs = match parse_batch(&text) {
        Ok(jobs) => jobs,
        Err(e) => {
            error!("{}: {}", cli.params.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let mut config = match &cli.config {
        Some(path) => match ModelConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ModelConfig::default(),
    };
    if cli.teenage {
        config.teenage_subfecundity = true;
    }
    if let Some(curve) = &cli.curve {
        config.maternal_mortality_curve = MaternalMortalityCurve::parse_lenient(curve);
    }
    let catalog = match &cli.families {
        Some(path) => match FamilyCatalog::load(path) {
            Ok(c) => c,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => FamilyCatalog::embedded(),
    };

    if let Err(e) = env_config::init_base_path() {
        error!("Cannot change to base path: {}", e);
        return ExitCode::FAILURE;
    }
    env_config::init_rayon_threads();
    if let Err(e) = std::fs::create_dir_all(&cli.output) {
        error!("{}: {}", cli.output.display(), e);
        return ExitCode::FAILURE;
    }

    info!("{} jobs from {}", jobs.len(), cli.params.display());
    let start = Instant::now();
    let results = run_batch(&jobs, &catalog, &config, &cli.output);
    let failed = results.iter().filter(|r| r.is_err()).count();
    for outcome in results.iter().flatten() {
        match outcome.growth_rate {
            Some(r) => println!("{}\tR={:.6}", outcome.label, r),
            None => println!("{}\t-", outcome.label),
        }
    }
    info!(
        "{} of {} jobs succeeded in {:.2} s",
        jobs.len() - failed,
        jobs.len(),
        start.elapsed().as_secs_f64()
    );

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
