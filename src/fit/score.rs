//! Information-criterion scoring.
//!
//! ```text
//! score = -2 * log_likelihood + penalty * k
//! ```
//!
//! with `penalty` = 2 (AIC), `ln(n)` (BIC) or a custom value, and `k` the effective
//! parameter count: coefficients whose magnitude exceeds `zero_tolerance`. Failed
//! fits score `+inf` so they sort after every converged model but stay reportable.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::domain::{FitResult, Penalty, ScoredModel, SearchConfig};

#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    penalty: Penalty,
    zero_tolerance: f64,
}

impl Scorer {
    pub fn new(penalty: Penalty, zero_tolerance: f64) -> Self {
        Self {
            penalty,
            zero_tolerance,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.penalty, config.zero_tolerance)
    }

    pub fn score(&self, fit: Arc<FitResult>) -> ScoredModel {
        let k = effective_parameter_count(&fit, self.zero_tolerance);

        let score = match fit.log_likelihood {
            Some(ll) if fit.converged && ll.is_finite() => {
                let s = information_criterion(ll, k, self.penalty.per_parameter(fit.n_obs));
                if s.is_nan() { f64::INFINITY } else { s }
            }
            _ => f64::INFINITY,
        };

        ScoredModel {
            fit,
            score,
            effective_parameter_count: k,
        }
    }
}

/// `-2 ll + penalty * k`.
pub fn information_criterion(log_likelihood: f64, k: usize, penalty: f64) -> f64 {
    -2.0 * log_likelihood + penalty * k as f64
}

/// Coefficients not regularized out.
pub fn effective_parameter_count(fit: &FitResult, zero_tolerance: f64) -> usize {
    fit.coefficients
        .iter()
        .filter(|c| c.estimate.abs() > zero_tolerance)
        .count()
}

/// Total order used everywhere models are ranked.
///
/// Lower score first (`+inf` last); ties prefer fewer effective parameters, then
/// fewer covariates, then the lexicographically smaller key.
pub fn rank_order(a: &ScoredModel, b: &ScoredModel) -> Ordering {
    a.score
        .total_cmp(&b.score)
        .then(a.effective_parameter_count.cmp(&b.effective_parameter_count))
        .then(a.key().len().cmp(&b.key().len()))
        .then_with(|| a.key().cmp(b.key()))
}
