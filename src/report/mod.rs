//! Reporting utilities: holdout evaluation and formatted terminal output.

use serde::Serialize;

use crate::data::{DataProvider, require_column};
use crate::domain::{ScoredModel, SpecKey};
use crate::ensemble::{Prediction, predict_fit};
use crate::error::RoverResult;

pub mod format;

pub use format::*;

/// Ensemble prediction quality on held-out rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HoldoutSummary {
    pub n: usize,
    pub rmse: f64,
    pub mean_abs_error: f64,
    /// Average ensemble variance (parameter plus between-model).
    pub mean_variance: f64,
}

/// Compare predictions with observed values row by row.
pub fn holdout_summary(predictions: &[Prediction], observed: &[f64]) -> HoldoutSummary {
    let n = predictions.len().min(observed.len());
    if n == 0 {
        return HoldoutSummary {
            n: 0,
            rmse: f64::NAN,
            mean_abs_error: f64::NAN,
            mean_variance: f64::NAN,
        };
    }

    let (sse, sae, var) = predictions
        .iter()
        .zip(observed)
        .fold((0.0, 0.0, 0.0), |(sse, sae, var), (p, y)| {
            let r = y - p.mean;
            (sse + r * r, sae + r.abs(), var + p.variance)
        });
    let n_f = n as f64;
    HoldoutSummary {
        n,
        rmse: (sse / n_f).sqrt(),
        mean_abs_error: sae / n_f,
        mean_variance: var / n_f,
    }
}

/// Out-of-sample error of one scored model. It plays no part in ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelHoldout {
    pub key: SpecKey,
    pub rmse: f64,
}

/// Holdout RMSE of every viable model, in the order given.
pub fn model_holdout<D>(
    models: &[ScoredModel],
    data: &D,
    response: &str,
    offset: Option<&str>,
) -> RoverResult<Vec<ModelHoldout>>
where
    D: DataProvider + ?Sized,
{
    let observed = require_column(data, response)?;
    models
        .iter()
        .filter(|m| m.is_viable())
        .map(|m| {
            let predictions = predict_fit(&m.fit, data, offset)?;
            Ok(ModelHoldout {
                key: m.key().clone(),
                rmse: holdout_summary(&predictions, observed).rmse,
            })
        })
        .collect()
}
