//! Search configuration surface.
//!
//! A `SearchConfig` can be built in code, deserialized from JSON, or assembled from
//! CLI flags. All fields have defaults so partial JSON files are accepted:
//!
//! ```json
//! { "strategy": "greedy_forward", "penalty": { "custom": 3.0 }, "selection_mode": { "top_k": 5 } }
//! ```

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{RoverError, RoverResult};

/// How the model space is traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Visit all `2^G` group subsets.
    Exhaustive,
    /// Start from the empty selection and move to the best improving toggle.
    GreedyForward,
    /// Start from the full selection and move to the best improving toggle.
    GreedyBackward,
}

impl Strategy {
    pub fn display_name(self) -> &'static str {
        match self {
            Strategy::Exhaustive => "exhaustive",
            Strategy::GreedyForward => "greedy-forward",
            Strategy::GreedyBackward => "greedy-backward",
        }
    }

    pub fn is_greedy(self) -> bool {
        !matches!(self, Strategy::Exhaustive)
    }
}

/// Complexity penalty per effective parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Penalty {
    /// `2` per parameter.
    Aic,
    /// `ln(n)` per parameter.
    Bic,
    Custom(f64),
}

impl Penalty {
    /// Penalty per parameter for a fit on `n_obs` observations.
    pub fn per_parameter(self, n_obs: usize) -> f64 {
        match self {
            Penalty::Aic => 2.0,
            Penalty::Bic => (n_obs.max(1) as f64).ln(),
            Penalty::Custom(v) => v,
        }
    }

    pub fn display_name(self) -> String {
        match self {
            Penalty::Aic => "AIC".to_string(),
            Penalty::Bic => "BIC".to_string(),
            Penalty::Custom(v) => format!("custom({v})"),
        }
    }
}

/// Which scored models make it into the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// The `k` best converged models.
    TopK(usize),
    /// Every converged model within `delta_max` of the best score.
    Threshold(f64),
}

impl SelectionMode {
    pub fn validate(self) -> RoverResult<()> {
        match self {
            SelectionMode::TopK(0) => Err(RoverError::invalid_config(
                "top_k must be >= 1, otherwise no models are ensembled",
            )),
            SelectionMode::Threshold(d) if !(d.is_finite() && d >= 0.0) => Err(
                RoverError::invalid_config(format!("threshold must be finite and >= 0, got {d}")),
            ),
            _ => Ok(()),
        }
    }
}

/// A full search run's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub strategy: Strategy,
    /// Upper bound on `|fixed| + |selected|`; larger specifications are skipped.
    pub max_covariates: Option<usize>,
    /// Maximum number of greedy moves.
    pub max_steps: usize,
    pub penalty: Penalty,
    pub selection_mode: SelectionMode,
    /// Worker threads for fitting (rayon default when unset).
    pub workers: Option<usize>,
    /// Per-fit wall-clock limit in seconds.
    pub fit_timeout_secs: Option<f64>,
    /// Coefficients at or below this magnitude do not count as parameters.
    pub zero_tolerance: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Exhaustive,
            max_covariates: None,
            max_steps: 100,
            penalty: Penalty::Bic,
            selection_mode: SelectionMode::TopK(10),
            workers: None,
            fit_timeout_secs: None,
            zero_tolerance: 1e-10,
        }
    }
}

impl SearchConfig {
    /// Read a JSON configuration file and validate it.
    pub fn from_json_path(path: &Path) -> RoverResult<Self> {
        let file = File::open(path).map_err(|e| RoverError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: SearchConfig = serde_json::from_reader(file)
            .map_err(|e| RoverError::invalid_config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RoverResult<()> {
        self.selection_mode.validate()?;

        if let Penalty::Custom(v) = self.penalty {
            if !(v.is_finite() && v >= 0.0) {
                return Err(RoverError::invalid_config(format!(
                    "custom penalty must be finite and >= 0, got {v}"
                )));
            }
        }
        if self.workers == Some(0) {
            return Err(RoverError::invalid_config("workers must be >= 1"));
        }
        if let Some(t) = self.fit_timeout_secs {
            if !(t.is_finite() && t > 0.0) {
                return Err(RoverError::invalid_config(format!(
                    "fit_timeout_secs must be finite and > 0, got {t}"
                )));
            }
        }
        if !(self.zero_tolerance.is_finite() && self.zero_tolerance >= 0.0) {
            return Err(RoverError::invalid_config("zero_tolerance must be finite and >= 0"));
        }
        Ok(())
    }

    pub fn fit_timeout(&self) -> Option<Duration> {
        self.fit_timeout_secs.map(Duration::from_secs_f64)
    }
}
