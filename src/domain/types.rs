//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between worker threads during a search
//! - exported to JSON for inspection
//! - reported in the terminal summary

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::SpecKey;

/// Whether a covariate is always present or subject to exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovariateRole {
    /// Present in every specification.
    Fixed,
    /// Included or excluded by the search.
    Explorable,
}

impl CovariateRole {
    pub fn as_str(self) -> &'static str {
        match self {
            CovariateRole::Fixed => "fixed",
            CovariateRole::Explorable => "explorable",
        }
    }
}

/// A candidate column of the design matrix.
///
/// Covariates sharing a `group_id` enter and leave a specification together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Covariate {
    pub name: String,
    pub role: CovariateRole,
    pub group_id: Option<String>,
}

impl Covariate {
    pub fn fixed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: CovariateRole::Fixed,
            group_id: None,
        }
    }

    pub fn explorable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: CovariateRole::Explorable,
            group_id: None,
        }
    }

    /// Attach this covariate to a group.
    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

/// Why a single fit did not produce a usable estimate.
///
/// These are recoverable: the search records them and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    SingularDesign,
    MaxIterationsExceeded,
    NumericalOverflow,
    Timeout,
    Unknown,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::SingularDesign => "singular_design",
            FailureReason::MaxIterationsExceeded => "max_iterations_exceeded",
            FailureReason::NumericalOverflow => "numerical_overflow",
            FailureReason::Timeout => "timeout",
            FailureReason::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point estimate and sampling variance for one coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientEstimate {
    pub name: String,
    pub estimate: f64,
    pub variance: f64,
}

/// Output of fitting one specification.
///
/// `coefficients` follow design order: fixed covariates first, then selected
/// covariates, each block sorted by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub specification_key: SpecKey,
    pub coefficients: Vec<CoefficientEstimate>,
    /// Row-major `p x p` covariance of the coefficients, when the collaborator
    /// reports one.
    pub covariance: Option<Vec<f64>>,
    /// `None` means undefined (the fit failed).
    pub log_likelihood: Option<f64>,
    pub converged: bool,
    pub iterations_used: usize,
    pub failure_reason: Option<FailureReason>,
    /// Number of observations the fit used.
    pub n_obs: usize,
}

impl FitResult {
    /// A failed fit: not converged, no likelihood, no coefficients.
    pub fn failed(
        specification_key: SpecKey,
        reason: FailureReason,
        n_obs: usize,
        iterations_used: usize,
    ) -> Self {
        Self {
            specification_key,
            coefficients: Vec::new(),
            covariance: None,
            log_likelihood: None,
            converged: false,
            iterations_used,
            failure_reason: Some(reason),
            n_obs,
        }
    }

    /// True when the fit converged with a finite log-likelihood.
    pub fn is_usable(&self) -> bool {
        self.converged && self.log_likelihood.is_some_and(f64::is_finite)
    }

    pub fn coefficient(&self, name: &str) -> Option<&CoefficientEstimate> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Covariance entry `(i, j)`, falling back to the diagonal variances when no
    /// full matrix is available.
    pub fn covariance_at(&self, i: usize, j: usize) -> f64 {
        let p = self.coefficients.len();
        match &self.covariance {
            Some(cov) if cov.len() == p * p => cov[i * p + j],
            _ if i == j => self.coefficients[i].variance,
            _ => 0.0,
        }
    }
}

/// A fit paired with its information-criterion score (lower is better).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredModel {
    pub fit: Arc<FitResult>,
    /// `+inf` for failed or singular fits.
    pub score: f64,
    pub effective_parameter_count: usize,
}

impl ScoredModel {
    pub fn key(&self) -> &SpecKey {
        &self.fit.specification_key
    }

    pub fn is_viable(&self) -> bool {
        self.score.is_finite()
    }
}
