//! Shared environment configuration for all birth-interval binaries.
//!
//! Consolidates the `BIRTH_INTERVALS_BASE_PATH` and `RAYON_NUM_THREADS` reads.

use std::io;
use std::path::PathBuf;

use log::{info, warn};

/// Read `BIRTH_INTERVALS_BASE_PATH` (default `"."`) and make it the working
/// directory. Output files are written relative to it.
pub fn init_base_path() -> io::Result<PathBuf> {
    let base_path =
        std::env::var("BIRTH_INTERVALS_BASE_PATH").unwrap_or_else(|_| ".".to_string());
    std::env::set_current_dir(&base_path)?;
    let cwd = std::env::current_dir()?;
    info!("Working directory: {}", cwd.display());
    Ok(cwd)
}

/// Read `RAYON_NUM_THREADS` (default: one per core) and build the rayon global
/// thread pool. Tolerates an already-initialized pool. Returns the thread count.
pub fn init_rayon_threads() -> usize {
    let requested = std::env::var("RAYON_NUM_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok());
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = requested {
        builder = builder.num_threads(n);
    }
    if let Err(e) = builder.build_global() {
        warn!("Rayon pool already initialized: {}", e);
    }
    let num_threads = rayon::current_num_threads();
    info!("Rayon threads: {}", num_threads);
    num_threads
}

/// Initialize `env_logger` with `info` as the default filter (`RUST_LOG` overrides).
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
