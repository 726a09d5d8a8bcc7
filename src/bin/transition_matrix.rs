//! Write the family-to-family transition patterns of a catalog as sparse matrices.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use birth_intervals::catalog::FamilyCatalog;
use birth_intervals::env_config;
use birth_intervals::phase0_tables::{TransitionIndex, TransitionPattern};
use birth_intervals::storage;

#[derive(Parser, Debug)]
#[command(name = "transition-matrix")]
#[command(version, about = "Export family transition patterns (Matrix Market and text)", long_about = None)]
struct Cli {
    /// Family catalog file (defaults to the built-in 987-family catalog)
    #[arg(short, long)]
    families: Option<PathBuf>,

    /// Output directory, relative to BIRTH_INTERVALS_BASE_PATH
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

fn main() -> ExitCode {
    env_config::init_logging();
    let cli = Cli::parse();

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

    let index = TransitionIndex::build(&catalog);
    let pattern = TransitionPattern::build(&catalog, &index);
    info!(
        "{} families: {} birth and {} no-birth transitions",
        pattern.num_families,
        pattern.birth.len(),
        pattern.no_birth.len()
    );

    if let Err(e) = std::fs::create_dir_all(&cli.output) {
        error!("{}: {}", cli.output.display(), e);
        return ExitCode::FAILURE;
    }
    match storage::write_transition_matrices(&cli.output, &pattern) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
