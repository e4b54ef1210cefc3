//! Member selection, weighting, and global coefficients.

use serde::Serialize;

use crate::domain::{ScoredModel, SelectionMode};
use crate::error::RoverResult;
use crate::fit::rank_order;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleMember {
    pub model: ScoredModel,
    pub weight: f64,
}

/// Weighted set of converged models, best first.
///
/// Weights are non-negative and sum to one unless the ensemble is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ensemble {
    members: Vec<EnsembleMember>,
    /// Column added back onto every prediction.
    offset: Option<String>,
}

/// Model-averaged coefficient over the whole registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleCoefficient {
    pub name: String,
    pub estimate: f64,
    /// Within-model variance plus between-model spread of the estimate.
    pub variance: f64,
    /// Total weight of members that include the covariate.
    pub inclusion: f64,
}

/// Select members from `scored` and weight them by score difference.
///
/// Failed fits never enter. If nothing converged the ensemble is empty.
pub fn build_ensemble(scored: &[ScoredModel], mode: SelectionMode) -> RoverResult<Ensemble> {
    mode.validate()?;

    let mut ranked: Vec<&ScoredModel> = scored.iter().filter(|m| m.is_viable()).collect();
    ranked.sort_by(|a, b| rank_order(a, b));

    let Some(best) = ranked.first().map(|m| m.score) else {
        return Ok(Ensemble::default());
    };

    let chosen: Vec<&ScoredModel> = match mode {
        SelectionMode::TopK(k) => ranked.into_iter().take(k).collect(),
        SelectionMode::Threshold(delta_max) => ranked
            .into_iter()
            .take_while(|m| m.score - best <= delta_max)
            .collect(),
    };

    let scores: Vec<f64> = chosen.iter().map(|m| m.score).collect();
    let members = chosen
        .into_iter()
        .zip(score_weights(&scores))
        .map(|(model, weight)| EnsembleMember {
            model: model.clone(),
            weight,
        })
        .collect();

    Ok(Ensemble {
        members,
        offset: None,
    })
}

/// `exp(-½ (s_i - s_min))`, normalized to sum to one.
pub fn score_weights(scores: &[f64]) -> Vec<f64> {
    let s_min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let raw: Vec<f64> = scores.iter().map(|s| (-0.5 * (s - s_min)).exp()).collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|r| r / total).collect()
}

impl Ensemble {
    /// Add `column` back onto predictions (the fits were made against
    /// `response - offset`).
    pub fn with_offset(mut self, column: Option<&str>) -> Self {
        self.offset = column.map(str::to_string);
        self
    }

    pub fn offset_column(&self) -> Option<&str> {
        self.offset.as_deref()
    }

    pub fn members(&self) -> &[EnsembleMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn best(&self) -> Option<&ScoredModel> {
        self.members.first().map(|m| &m.model)
    }

    /// Weighted coefficients over `names` (normally `registry.all_names()`).
    ///
    /// A covariate a member does not include contributes an estimate of zero.
    pub fn coefficients(&self, names: &[String]) -> Vec<EnsembleCoefficient> {
        names
            .iter()
            .map(|name| {
                let per_member: Vec<(f64, f64, f64, bool)> = self
                    .members
                    .iter()
                    .map(|m| match m.model.fit.coefficient(name) {
                        Some(c) => (m.weight, c.estimate, finite_or_zero(c.variance), true),
                        None => (m.weight, 0.0, 0.0, false),
                    })
                    .collect();

                let estimate: f64 = per_member.iter().map(|(w, b, _, _)| w * b).sum();
                let variance: f64 = per_member
                    .iter()
                    .map(|(w, b, v, _)| w * (v + (b - estimate).powi(2)))
                    .sum();
                let inclusion: f64 = per_member
                    .iter()
                    .filter(|(_, _, _, present)| *present)
                    .map(|(w, _, _, _)| w)
                    .sum();

                EnsembleCoefficient {
                    name: name.clone(),
                    estimate,
                    variance,
                    inclusion,
                }
            })
            .collect()
    }
}

/// Missing variance information counts as no parameter uncertainty.
pub(crate) fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}
