//! Model parameters and run configuration.
//!
//! [`ModelParams`] holds everything the survival model reads: Siler mortality
//! coefficients, the five categorical effect levels and the maternal mortality
//! curve. [`ModelConfig`] holds run-level settings (maximum age, iteration
//! limits, forward steps, subfecundity, seed) and can be loaded from JSON.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::StorageError;

/// Strength of a categorical mortality effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MortalityLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl MortalityLevel {
    pub const ALL: [MortalityLevel; 4] = [
        MortalityLevel::None,
        MortalityLevel::Low,
        MortalityLevel::Medium,
        MortalityLevel::High,
    ];

    /// Parse a level name or its initial, case-insensitively. Anything
    /// unrecognised is `None`, the weakest effect.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" | "H" => MortalityLevel::High,
            "MEDIUM" | "M" => MortalityLevel::Medium,
            "LOW" | "L" => MortalityLevel::Low,
            _ => MortalityLevel::None,
        }
    }

    /// One-letter code used in run labels.
    pub fn initial(self) -> char {
        match self {
            MortalityLevel::None => 'N',
            MortalityLevel::Low => 'L',
            MortalityLevel::Medium => 'M',
            MortalityLevel::High => 'H',
        }
    }
}

impl fmt::Display for MortalityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MortalityLevel::None => "none",
            MortalityLevel::Low => "low",
            MortalityLevel::Medium => "medium",
            MortalityLevel::High => "high",
        };
        f.write_str(name)
    }
}

/// Shape of the age-dependent risk of dying in childbirth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaternalMortalityCurve {
    /// Quadratic J-shaped maternal mortality ratio (Blanc et al. 2013).
    #[default]
    #[serde(rename = "J")]
    JShaped,
    /// Exponential increase with age (Grimes 1994, as used by Shanley et al. 2007).
    #[serde(rename = "E")]
    Exponential,
}

impl MaternalMortalityCurve {
    /// "J" or "E"; anything else falls back to the J-shaped curve.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "E" => MaternalMortalityCurve::Exponential,
            _ => MaternalMortalityCurve::JShaped,
        }
    }
}

/// Siler competing-hazards mortality coefficients.
///
/// - juvenile hazard `a1 * exp(-b1 * age)` (declines with age)
/// - extrinsic hazard `a2` (constant)
/// - senescent hazard `a3 * exp(b3 * years_since_maturity)` (increases with age)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SilerParams {
    pub a1: f64,
    pub b1: f64,
    pub a2: f64,
    pub a3: f64,
    pub b3: f64,
}

impl SilerParams {
    pub fn new(a1: f64, b1: f64, a2: f64, a3: f64, b3: f64) -> Self {
        Self { a1, b1, a2, a3, b3 }
    }
}

/// Everything the survival model depends on for one parameter combination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Population name, used only for labelling outputs.
    pub population: String,
    pub siler: SilerParams,
    /// Risk of dying in childbirth.
    pub childbirth_mortality: MortalityLevel,
    /// Influence of children on the mother's mortality. Recorded with the run;
    /// no hazard term reads it.
    pub maternal_mortality_child_influence: MortalityLevel,
    /// Intensity of competition between siblings.
    pub sibling_competition: MortalityLevel,
    /// Influence of the mother on child mortality. Recorded with the run; the
    /// motherless hazard factor is fixed.
    pub child_mortality_mother_influence: MortalityLevel,
    /// Help given by siblings aged 10 and over.
    pub sibling_help: MortalityLevel,
    pub maternal_mortality_curve: MaternalMortalityCurve,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            population: "model".to_string(),
            siler: SilerParams::default(),
            childbirth_mortality: MortalityLevel::None,
            maternal_mortality_child_influence: MortalityLevel::None,
            sibling_competition: MortalityLevel::None,
            child_mortality_mother_influence: MortalityLevel::None,
            sibling_help: MortalityLevel::None,
            maternal_mortality_curve: MaternalMortalityCurve::JShaped,
        }
    }
}

impl ModelParams {
    /// Output label, e.g. `"Hadza-MLH"` for medium childbirth mortality, low
    /// sibling competition and high sibling help.
    pub fn label(&self) -> String {
        format!(
            "{}-{}{}{}",
            self.population,
            self.childbirth_mortality.initial(),
            self.sibling_competition.initial(),
            self.sibling_help.initial()
        )
    }
}

/// Run-level settings shared by the backward and forward phases.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Oldest age a mother can reach; she dies the following year.
    pub max_age: u32,
    /// Number of forward projection steps.
    pub forward_steps: usize,
    /// Backward iterations that always run before convergence is tested.
    pub min_backward_iterations: usize,
    /// Safety cap on backward iterations.
    pub max_backward_iterations: usize,
    /// Growth rate agreement required between successive iterations.
    pub convergence_tolerance: f64,
    /// Apply teenage subfecundity in the forward projection.
    pub teenage_subfecundity: bool,
    /// Seed for the subfecundity draws.
    pub seed: u64,
    /// Maternal mortality curve applied to every run of a batch.
    pub maternal_mortality_curve: MaternalMortalityCurve,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            forward_steps: DEFAULT_FORWARD_STEPS,
            min_backward_iterations: MIN_BACKWARD_ITERATIONS,
            max_backward_iterations: DEFAULT_MAX_BACKWARD_ITERATIONS,
            convergence_tolerance: CONVERGENCE_TOLERANCE,
            teenage_subfecundity: false,
            seed: 0,
            maternal_mortality_curve: MaternalMortalityCurve::JShaped,
        }
    }
}

impl ModelConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let text = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels_leniently() {
        assert_eq!(MortalityLevel::parse_lenient("high"), MortalityLevel::High);
        assert_eq!(MortalityLevel::parse_lenient("H"), MortalityLevel::High);
        assert_eq!(MortalityLevel::parse_lenient("Medium"), MortalityLevel::Medium);
        assert_eq!(MortalityLevel::parse_lenient("l"), MortalityLevel::Low);
        assert_eq!(MortalityLevel::parse_lenient("n"), MortalityLevel::None);
        assert_eq!(MortalityLevel::parse_lenient("extreme"), MortalityLevel::None);
        assert_eq!(MortalityLevel::parse_lenient(""), MortalityLevel::None);
    }

    #[test]
    fn test_parse_curve() {
        assert_eq!(
            MaternalMortalityCurve::parse_lenient("e"),
            MaternalMortalityCurve::Exponential
        );
        assert_eq!(
            MaternalMortalityCurve::parse_lenient("J"),
            MaternalMortalityCurve::JShaped
        );
        assert_eq!(
            MaternalMortalityCurve::parse_lenient("?"),
            MaternalMortalityCurve::JShaped
        );
    }

    #[test]
    fn test_label() {
        let params = ModelParams {
            population: "Gambia".to_string(),
            childbirth_mortality: MortalityLevel::Medium,
            sibling_competition: MortalityLevel::Low,
            sibling_help: MortalityLevel::High,
            ..ModelParams::default()
        };
        assert_eq!(params.label(), "Gambia-MLH");
    }

    #[test]
    fn test_config_json_defaults() {
        let cfg: ModelConfig =
            serde_json::from_str(r#"{"max_age": 60, "teenage_subfecundity": true}"#).unwrap();
        assert_eq!(cfg.max_age, 60);
        assert!(cfg.teenage_subfecundity);
        assert_eq!(cfg.forward_steps, DEFAULT_FORWARD_STEPS);
        assert_eq!(cfg.min_backward_iterations, MIN_BACKWARD_ITERATIONS);
        assert_eq!(cfg.maternal_mortality_curve, MaternalMortalityCurve::JShaped);
    }

    #[test]
    fn test_config_json_curve() {
        let cfg: ModelConfig =
            serde_json::from_str(r#"{"max_age": 60, "maternal_mortality_curve": "E"}"#).unwrap();
        assert_eq!(cfg.maternal_mortality_curve, MaternalMortalityCurve::Exponential);
    }

    #[test]
    fn test_params_json_round_trip() {
        let params = ModelParams {
            maternal_mortality_curve: MaternalMortalityCurve::Exponential,
            sibling_help: MortalityLevel::Low,
            ..ModelParams::default()
        };
        let text = serde_json::to_string(&params).unwrap();
        assert!(text.contains("\"E\""));
        assert!(text.contains("\"low\""));
        let back: ModelParams = serde_json::from_str(&text).unwrap();
        assert_eq!(back, params);
    }
}
