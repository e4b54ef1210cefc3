//! Ensemble prediction.
//!
//! For row `x`, member `i` predicts `μ_i = xᵀβ_i` with parameter variance
//! `σ_i² = xᵀΣ_i x`. The ensemble combines them as a mixture:
//!
//! ```text
//! mean     = Σ w_i μ_i
//! variance = Σ w_i σ_i² + Σ w_i (μ_i - mean)²
//! ```

use serde::Serialize;

use crate::data::{DataProvider, require_column};
use crate::domain::FitResult;
use crate::ensemble::select::{Ensemble, finite_or_zero};
use crate::error::{RoverError, RoverResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub mean: f64,
    pub variance: f64,
}

impl Ensemble {
    /// One prediction per row of `data`.
    pub fn predict<D>(&self, data: &D) -> RoverResult<Vec<Prediction>>
    where
        D: DataProvider + ?Sized,
    {
        if self.is_empty() {
            return Err(RoverError::EmptyEnsemble);
        }

        let per_member: Vec<(f64, Vec<(f64, f64)>)> = self
            .members()
            .iter()
            .map(|m| Ok((m.weight, member_predictions(&m.model.fit, data)?)))
            .collect::<RoverResult<_>>()?;

        let offset = match self.offset_column() {
            Some(col) => Some(require_column(data, col)?),
            None => None,
        };

        let predictions = (0..data.n_rows())
            .map(|row| {
                let mean: f64 = per_member.iter().map(|(w, p)| w * p[row].0).sum();
                let within: f64 = per_member.iter().map(|(w, p)| w * p[row].1).sum();
                let between: f64 = per_member
                    .iter()
                    .map(|(w, p)| w * (p[row].0 - mean).powi(2))
                    .sum();
                Prediction {
                    mean: mean + offset.map_or(0.0, |o| o[row]),
                    variance: within + between,
                }
            })
            .collect();
        Ok(predictions)
    }
}

/// Predictions of one fitted model on its own, offset column added back.
pub fn predict_fit<D>(fit: &FitResult, data: &D, offset: Option<&str>) -> RoverResult<Vec<Prediction>>
where
    D: DataProvider + ?Sized,
{
    let offset = match offset {
        Some(col) => Some(require_column(data, col)?),
        None => None,
    };
    let predictions = member_predictions(fit, data)?
        .into_iter()
        .enumerate()
        .map(|(row, (mean, variance))| Prediction {
            mean: mean + offset.map_or(0.0, |o| o[row]),
            variance,
        })
        .collect();
    Ok(predictions)
}

/// `(μ, σ²)` per row for one member.
fn member_predictions<D>(fit: &FitResult, data: &D) -> RoverResult<Vec<(f64, f64)>>
where
    D: DataProvider + ?Sized,
{
    let columns: Vec<&[f64]> = fit
        .coefficients
        .iter()
        .map(|c| require_column(data, &c.name))
        .collect::<RoverResult<_>>()?;
    let p = columns.len();

    let out = (0..data.n_rows())
        .map(|row| {
            let x: Vec<f64> = columns.iter().map(|col| col[row]).collect();
            let mean: f64 = fit
                .coefficients
                .iter()
                .zip(&x)
                .map(|(c, xi)| c.estimate * xi)
                .sum();

            let mut variance = 0.0;
            for i in 0..p {
                for j in 0..p {
                    variance += x[i] * finite_or_zero(fit.covariance_at(i, j)) * x[j];
                }
            }
            (mean, variance.max(0.0))
        })
        .collect();
    Ok(out)
}
