//! Flat-file output writers and importers for run artifacts.
//!
//! All files are plain text keyed by the run label (see
//! [`crate::config::ModelParams::label`]):
//!
//! | File | Contents |
//! |------|----------|
//! | `Births-<label>.out` | `motherAge,familyNumber,true\|false` for every state |
//! | `R-<label>.out` | growth rate, appended one per line |
//! | `R-Lambda-<label>.out` | per-age growth for ages `0..=motherAgeMax` |
//! | `NF-<label>.out` | `motherAge,familyNumber,mass` for states with mass |
//! | `IB-<label>.csv` | `age,IBI` mean birth interval per mother age |
//! | `<label>.json` | run summary |
//!
//! Family numbers are 1-based positions in the catalog.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::info;

use crate::errors::{ModelError, StorageError};
use crate::phase0_tables::TransitionPattern;
use crate::run::RunSummary;
use crate::statistics::BirthIntervalStats;
use crate::types::{DecisionTable, LifeHistoryContext, StateTable};

/// Output file names for one run label.
#[derive(Clone, Debug)]
pub struct OutputPaths {
    pub births: PathBuf,
    pub growth_rate: PathBuf,
    pub age_growth: PathBuf,
    pub population: PathBuf,
    pub intervals: PathBuf,
    pub summary: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: &Path, label: &str) -> Self {
        Self {
            births: dir.join(format!("Births-{}.out", label)),
            growth_rate: dir.join(format!("R-{}.out", label)),
            age_growth: dir.join(format!("R-Lambda-{}.out", label)),
            population: dir.join(format!("NF-{}.out", label)),
            intervals: dir.join(format!("IB-{}.csv", label)),
            summary: dir.join(format!("{}.json", label)),
        }
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, StorageError> {
    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    Ok(BufWriter::new(file))
}

fn finish(path: &Path, mut w: BufWriter<File>) -> Result<(), StorageError> {
    w.flush().map_err(|e| StorageError::io(path, e))
}

/// Write every state's birth decision.
pub fn write_births(
    path: &Path,
    ctx: &LifeHistoryContext,
    decisions: &DecisionTable,
) -> Result<(), StorageError> {
    let mut w = create(path)?;
    for a in 0..decisions.num_ages() {
        let mother_age = ctx.mother_age(a);
        for (f, &birth) in decisions.row(a).iter().enumerate() {
            writeln!(w, "{},{},{}", mother_age, f + 1, birth).map_err(|e| StorageError::io(path, e))?;
        }
    }
    finish(path, w)
}

/// Append a growth rate to the run's growth-rate log.
pub fn append_growth_rate(path: &Path, r: f64) -> Result<(), StorageError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StorageError::io(path, e))?;
    writeln!(file, "{}", r).map_err(|e| StorageError::io(path, e))
}

/// Write per-age growth for every age in years from 0 to `motherAgeMax`.
/// Ages below maturity have no mothers and report 1.
pub fn write_age_growth(
    path: &Path,
    ctx: &LifeHistoryContext,
    age_growth: &[f64],
) -> Result<(), StorageError> {
    let mut w = create(path)?;
    for age in 0..=ctx.mother_age_max {
        let value = age
            .checked_sub(ctx.age_at_maturity)
            .and_then(|a| age_growth.get(a as usize))
            .copied()
            .unwrap_or(1.0);
        writeln!(w, "{}", value).map_err(|e| StorageError::io(path, e))?;
    }
    finish(path, w)
}

/// Write the population distribution, skipping empty states.
pub fn write_population(
    path: &Path,
    ctx: &LifeHistoryContext,
    population: &StateTable<f64>,
) -> Result<(), StorageError> {
    let mut w = create(path)?;
    for a in 0..population.num_ages() {
        let mother_age = ctx.mother_age(a);
        for (f, &mass) in population.row(a).iter().enumerate() {
            if mass != 0.0 {
                writeln!(w, "{},{},{}", mother_age, f + 1, mass)
                    .map_err(|e| StorageError::io(path, e))?;
            }
        }
    }
    finish(path, w)
}

/// Write the mean birth interval per mother age.
pub fn write_intervals(
    path: &Path,
    ctx: &LifeHistoryContext,
    stats: &BirthIntervalStats,
) -> Result<(), StorageError> {
    let mut w = create(path)?;
    writeln!(w, "age,IBI").map_err(|e| StorageError::io(path, e))?;
    for (a, interval) in stats.intervals.iter().enumerate() {
        writeln!(w, "{},{}", ctx.mother_age(a), interval).map_err(|e| StorageError::io(path, e))?;
    }
    finish(path, w)
}

pub fn write_summary(path: &Path, summary: &RunSummary<'_>) -> Result<(), StorageError> {
    let mut w = create(path)?;
    serde_json::to_writer_pretty(&mut w, summary)?;
    finish(path, w)
}

/// Write both family transition patterns as Matrix Market coordinate files
/// (`FamilyBirths.mm`, `FamilyNoBirths.mm`) and dense 0/1 text
/// (`FamilyBirths.txt`, `FamilyNoBirths.txt`) into `dir`.
pub fn write_transition_matrices(dir: &Path, pattern: &TransitionPattern) -> Result<(), StorageError> {
    let start = Instant::now();
    let n = pattern.num_families;
    for (name, entries) in [("FamilyBirths", &pattern.birth), ("FamilyNoBirths", &pattern.no_birth)] {
        let mm_path = dir.join(format!("{}.mm", name));
        let mut mm = create(&mm_path)?;
        writeln!(mm, "%%MatrixMarket matrix coordinate pattern general")
            .and_then(|_| writeln!(mm, "{} {} {}", n, n, entries.len()))
            .map_err(|e| StorageError::io(&mm_path, e))?;
        for &(row, col) in entries {
            writeln!(mm, "{} {}", row + 1, col + 1).map_err(|e| StorageError::io(&mm_path, e))?;
        }
        finish(&mm_path, mm)?;

        let dense_path = dir.join(format!("{}.txt", name));
        let mut dense = create(&dense_path)?;
        let mut line = String::with_capacity(2 * n);
        let mut k = 0;
        for row in 0..n {
            line.clear();
            for col in 0..n {
                let set = entries.get(k) == Some(&(row, col));
                if set {
                    k += 1;
                }
                line.push(if set { '1' } else { '0' });
                line.push(' ');
            }
            writeln!(dense, "{}", line).map_err(|e| StorageError::io(&dense_path, e))?;
        }
        finish(&dense_path, dense)?;
    }
    info!(
        "Wrote transition matrices ({} birth, {} no-birth entries) in {:.2} ms",
        pattern.birth.len(),
        pattern.no_birth.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

fn read_text(path: &Path) -> Result<String, StorageError> {
    fs::read_to_string(path).map_err(|e| StorageError::io(path, e))
}

fn parse_bool(token: &str) -> Option<bool> {
    match token.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Read a decision table, filled row by row in state order.
///
/// Lines containing a comma take their last field (`true`/`false`); other lines
/// are read as 0/1 flags. The file must hold exactly one value per state.
pub fn read_births(path: &Path, ctx: &LifeHistoryContext) -> Result<DecisionTable, StorageError> {
    let text = read_text(path)?;
    let mut values = Vec::with_capacity(ctx.num_states());
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value = if let Some((_, last)) = line.rsplit_once(',') {
            parse_bool(last)
        } else if line.contains('1') {
            Some(true)
        } else if line.contains('0') {
            Some(false)
        } else {
            None
        };
        let value =
            value.ok_or_else(|| StorageError::parse(path, n + 1, format!("invalid decision '{}'", line)))?;
        values.push(value);
    }

    let nf = ctx.num_families();
    if values.len() != ctx.num_states() {
        return Err(ModelError::DimensionMismatch {
            what: "decision",
            rows: values.len() / nf,
            cols: nf,
            expected_rows: ctx.num_ages(),
            expected_cols: nf,
        }
        .into());
    }
    let rows: Vec<Vec<bool>> = values.chunks(nf).map(|c| c.to_vec()).collect();
    Ok(StateTable::from_rows("decision", rows, ctx.num_ages(), nf)?)
}

/// Read a population table from `motherAge,familyNumber,mass` lines.
pub fn read_population(
    path: &Path,
    ctx: &LifeHistoryContext,
) -> Result<StateTable<f64>, StorageError> {
    let text = read_text(path)?;
    let mut population = ctx.new_table(0.0);
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(StorageError::parse(path, n + 1, "expected motherAge,familyNumber,mass"));
        }
        let bad = |what: &str| StorageError::parse(path, n + 1, format!("invalid {} '{}'", what, line));
        let mother_age: u32 = fields[0].parse().map_err(|_| bad("mother age"))?;
        let family_number: usize = fields[1].parse().map_err(|_| bad("family number"))?;
        let mass: f64 = fields[2].parse().map_err(|_| bad("mass"))?;

        let age_index = mother_age
            .checked_sub(ctx.age_at_maturity)
            .map(|a| a as usize)
            .filter(|&a| a < ctx.num_ages())
            .ok_or_else(|| bad("mother age"))?;
        let family_index = family_number
            .checked_sub(1)
            .filter(|&f| f < ctx.num_families())
            .ok_or_else(|| bad("family number"))?;
        population.set(age_index, family_index, mass);
    }
    Ok(population)
}

/// Read a growth rate from the first line, as `R=x` or `x`.
pub fn read_growth_rate(path: &Path) -> Result<f64, StorageError> {
    let text = read_text(path)?;
    let line = text.lines().next().unwrap_or("").trim();
    let value = line.split_once('=').map_or(line, |(_, v)| v).trim();
    value
        .parse()
        .map_err(|_| StorageError::parse(path, 1, format!("invalid growth rate '{}'", line)))
}
