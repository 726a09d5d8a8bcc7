//! Error types for catalog construction, the solvers, result storage and batch files.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a family catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read family catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: invalid child age '{token}'")]
    InvalidAge { line: usize, token: String },
    #[error("line {line}: child age {age} exceeds the supported maximum of {max}")]
    AgeOutOfRange { line: usize, age: u32, max: u32 },
    #[error("family catalog is empty")]
    Empty,
    #[error("first family in the catalog must have no children, found {0:?}")]
    FirstNotEmpty(Vec<u32>),
    #[error("duplicate family {ages:?} at lines {first} and {second}")]
    Duplicate {
        ages: Vec<u32>,
        first: usize,
        second: usize,
    },
}

/// Errors raised by the backward and forward solvers.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("maximum age {max_age} leaves no adult years after maturity at {age_at_maturity}")]
    InvalidMaxAge { max_age: u32, age_at_maturity: u32 },
    #[error("backward iteration did not converge after {iterations} iterations (last r={last_growth_rate})")]
    DidNotConverge {
        iterations: usize,
        last_growth_rate: f64,
    },
    #[error("fitness of the founding state is {0}; cannot normalise")]
    DegenerateFitness(f64),
    #[error("population went extinct at step {step}")]
    PopulationExtinct { step: usize },
    #[error("{what} table is {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    DimensionMismatch {
        what: &'static str,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
    #[error("no decision table available; run the backward solver or import decisions")]
    MissingDecisions,
}

/// Errors raised while writing or importing run artifacts.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("cannot serialise run summary: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        StorageError::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

/// Errors raised while parsing a batch parameter line.
#[derive(Debug, Error, PartialEq)]
pub enum BatchError {
    #[error("line {line}: expected at least 9 fields, found {found}")]
    TooFewFields { line: usize, found: usize },
    #[error("line {line}: invalid Siler coefficient '{token}'")]
    InvalidNumber { line: usize, token: String },
    #[error("line {line}: a population file and a growth-rate file must be given together")]
    IncompleteImports { line: usize },
}
