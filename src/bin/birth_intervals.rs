//! Single-run driver: solve one parameter set and write its artifacts.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use birth_intervals::batch::{self, RunJob, RunMode};
use birth_intervals::catalog::FamilyCatalog;
use birth_intervals::config::{
    MaternalMortalityCurve, ModelConfig, ModelParams, MortalityLevel, SilerParams,
};
use birth_intervals::env_config;

#[derive(Parser, Debug)]
#[command(name = "birth-intervals")]
#[command(version, about = "Optimal birth decisions by stochastic dynamic programming", long_about = None)]
struct Cli {
    /// Population name, used in output file names
    #[arg(short, long, default_value = "model")]
    population: String,

    /// Childbirth mortality: none, low, medium or high
    #[arg(long, default_value = "none")]
    childbirth: String,

    /// Sibling competition: none, low, medium or high
    #[arg(long, default_value = "none")]
    competition: String,

    /// Sibling help: none, low, medium or high
    #[arg(long, default_value = "none")]
    help_level: String,

    /// Influence of children on maternal mortality (recorded only)
    #[arg(long, default_value = "none")]
    child_influence: String,

    /// Influence of the mother on child mortality (recorded only)
    #[arg(long, default_value = "none")]
    mother_influence: String,

    /// Maternal mortality curve: J or E (overrides the config file; default J)
    #[arg(long)]
    curve: Option<String>,

    /// Siler coefficients a1 b1 a2 a3 b3
    #[arg(long, num_args = 5, value_names = ["A1", "B1", "A2", "A3", "B3"], allow_hyphen_values = true)]
    siler: Option<Vec<f64>>,

    /// Run configuration JSON; command-line options override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Family catalog file (defaults to the built-in 987-family catalog)
    #[arg(short, long)]
    families: Option<PathBuf>,

    /// Import a decision table and skip the backward phase
    #[arg(long)]
    births: Option<PathBuf>,

    /// Import a population table (requires --births and --growth)
    #[arg(long, requires = "births", requires = "growth")]
    population_file: Option<PathBuf>,

    /// Import a growth rate (requires --population-file)
    #[arg(long, requires = "population_file")]
    growth: Option<PathBuf>,

    /// Stop after the backward phase
    #[arg(long, conflicts_with = "births")]
    backward_only: bool,

    /// Apply teenage subfecundity in the forward projection
    #[arg(long)]
    teenage: bool,

    /// Seed for the subfecundity draws
    #[arg(long)]
    seed: Option<u64>,

    /// Number of forward projection steps
    #[arg(long)]
    forward_steps: Option<usize>,

    /// Maximum mother age
    #[arg(long)]
    max_age: Option<u32>,

    /// Output directory, relative to BIRTH_INTERVALS_BASE_PATH
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

impl Cli {
    fn params(&self, config: &ModelConfig) -> ModelParams {
        let siler = match self.siler.as_deref() {
            Some(&[a1, b1, a2, a3, b3]) => SilerParams::new(a1, b1, a2, a3, b3),
            _ => SilerParams::default(),
        };
        ModelParams {
            population: self.population.clone(),
            siler,
            childbirth_mortality: MortalityLevel::parse_lenient(&self.childbirth),
            maternal_mortality_child_influence: MortalityLevel::parse_lenient(&self.child_influence),
            sibling_competition: MortalityLevel::parse_lenient(&self.competition),
            child_mortality_mother_influence: MortalityLevel::parse_lenient(&self.mother_influence),
            sibling_help: MortalityLevel::parse_lenient(&self.help_level),
            maternal_mortality_curve: config.maternal_mortality_curve,
        }
    }

    fn mode(&self) -> RunMode {
        match (&self.births, &self.population_file, &self.growth) {
            (Some(births), Some(population), Some(growth)) => RunMode::StatisticsFrom {
                births: births.clone(),
                population: population.clone(),
                growth: growth.clone(),
            },
            (Some(births), _, _) => RunMode::ForwardFrom {
                births: births.clone(),
            },
            _ if self.backward_only => RunMode::BackwardOnly,
            _ => RunMode::Full,
        }
    }

    fn apply_overrides(&self, config: &mut ModelConfig) {
        if let Some(max_age) = self.max_age {
            config.max_age = max_age;
        }
        if let Some(steps) = self.forward_steps {
            config.forward_steps = steps;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.teenage {
            config.teenage_subfecundity = true;
        }
        if let Some(curve) = &self.curve {
            config.maternal_mortality_curve = MaternalMortalityCurve::parse_lenient(curve);
        }
    }
}

fn main() -> ExitCode {
    env_config::init_logging();
    let cli = Cli::parse();

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
    cli.apply_overrides(&mut config);

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

    // Inputs named on the command line are relative to the invocation directory.
    let mode = match std::env::current_dir() {
        Ok(cwd) => cli.mode().resolved_against(&cwd),
        Err(e) => {
            error!("Cannot read working directory: {}", e);
            return ExitCode::FAILURE;
        }
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

    let job = RunJob {
        params: cli.params(&config),
        mode,
    };
    match batch::execute(&job, &catalog, &config, &cli.output) {
        Ok(outcome) => {
            match outcome.growth_rate {
                Some(r) => info!("{}: R={:.6}", outcome.label, r),
                None => info!("{}: done", outcome.label),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}: {}", job.params.label(), e);
            ExitCode::FAILURE
        }
    }
}
