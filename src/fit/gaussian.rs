//! Gaussian linear model, optionally L1-penalized.
//!
//! Given design `X`, response `y`, weights `w` and offset `o`, rows are scaled by
//! `sqrt(w_i)` and the residual is `r_i = y_i - o_i - x_i^T β`. OLS solves
//!
//! ```text
//! minimize Σ w_i r_i^2
//! ```
//!
//! with an SVD least squares solve. Lasso runs coordinate descent on
//!
//! ```text
//! minimize (1 / 2n) Σ w_i r_i^2 + λ Σ |β_j|     (penalized columns only)
//! ```
//!
//! so `λ` is on the per-row scale of `math::lasso`.
//!
//! Outputs:
//! - covariance `σ² (X^T W X)^{-1}` over the active (non-zero) coefficients, with
//!   `σ²` the residual variance on `n - k` degrees of freedom
//! - log-likelihood at the MLE variance `σ̂² = Σ w r² / n`:
//!   `-½ [n ln(2π σ̂²) - Σ ln w_i + n]`

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};

use crate::fit::collaborator::{CollaboratorError, FitCollaborator, FitOutcome, FitRequest};
use crate::math::{LassoOptions, LassoOutcome, SolveError, lasso, solve_least_squares};

/// Floor on the MLE variance so a perfect fit does not produce `+inf`.
const SIGMA2_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct GaussianFamily {
    /// L1 penalty; `0.0` fits ordinary (weighted) least squares.
    pub lasso_lambda: f64,
    pub max_iter: usize,
    pub tol: f64,
    /// Columns never penalized (typically the intercept).
    pub unpenalized: Vec<String>,
}

impl Default for GaussianFamily {
    fn default() -> Self {
        Self {
            lasso_lambda: 0.0,
            max_iter: 1_000,
            tol: 1e-8,
            unpenalized: Vec::new(),
        }
    }
}

impl GaussianFamily {
    pub fn ols() -> Self {
        Self::default()
    }

    pub fn lasso(lambda: f64, unpenalized: &[&str]) -> Self {
        Self {
            lasso_lambda: lambda,
            unpenalized: unpenalized.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl FitCollaborator for GaussianFamily {
    fn name(&self) -> &str {
        if self.lasso_lambda > 0.0 {
            "gaussian-lasso"
        } else {
            "gaussian"
        }
    }

    fn fit(&self, request: &FitRequest) -> Result<FitOutcome, CollaboratorError> {
        if !(self.lasso_lambda.is_finite() && self.lasso_lambda >= 0.0) {
            return Err(CollaboratorError::Unavailable(format!(
                "lasso_lambda must be finite and >= 0, got {}",
                self.lasso_lambda
            )));
        }

        let (n, p) = request.design.shape();
        if n == 0 {
            return Err(CollaboratorError::SingularDesign);
        }

        let w = match &request.weights {
            Some(w) => {
                if w.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
                    return Err(CollaboratorError::Other(
                        "weights must be finite and > 0".to_string(),
                    ));
                }
                w.clone()
            }
            None => DVector::from_element(n, 1.0),
        };
        let sw = w.map(f64::sqrt);

        let mut y = request.response.clone();
        if let Some(offset) = &request.offset {
            y -= offset;
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(CollaboratorError::Overflow);
        }

        // Row-weighted design and response.
        let mut xw = request.design.clone();
        for (i, mut row) in xw.row_iter_mut().enumerate() {
            row *= sw[i];
        }
        let yw = y.component_mul(&sw);

        let (beta, iterations) = if self.lasso_lambda > 0.0 {
            let penalized: Vec<bool> = request
                .columns
                .iter()
                .map(|c| !self.unpenalized.contains(c))
                .collect();
            let opts = LassoOptions {
                lambda: self.lasso_lambda,
                max_iter: self.max_iter,
                tol: self.tol,
            };
            match lasso(&xw, &yw, &penalized, &opts, request.deadline) {
                LassoOutcome::Converged { beta, sweeps } => (beta, sweeps),
                LassoOutcome::MaxIterations { sweeps } => {
                    return Err(CollaboratorError::MaxIterations { iterations: sweeps });
                }
                LassoOutcome::Deadline { .. } => return Err(CollaboratorError::Timeout),
                LassoOutcome::NonFinite { .. } => return Err(CollaboratorError::Overflow),
            }
        } else {
            let fit = solve_least_squares(&xw, &yw).map_err(solve_error)?;
            (fit.beta, 1)
        };

        let residual = &yw - &xw * &beta;
        let sse = residual.norm_squared();

        let active: Vec<usize> = (0..p).filter(|&j| beta[j] != 0.0).collect();
        let k = active.len();
        let sigma2 = sse / (n.saturating_sub(k).max(1)) as f64;

        let covariance = active_covariance(&xw, &active, p, sigma2)?;

        let sigma2_mle = (sse / n as f64).max(SIGMA2_FLOOR);
        let log_w: f64 = w.iter().map(|v| v.ln()).sum();
        let n_f = n as f64;
        let log_likelihood = -0.5 * (n_f * (2.0 * PI * sigma2_mle).ln() - log_w + n_f);
        if !log_likelihood.is_finite() {
            return Err(CollaboratorError::Overflow);
        }

        Ok(FitOutcome {
            coefficients: beta.iter().copied().collect(),
            covariance: Some(covariance),
            log_likelihood,
            converged: true,
            iterations,
        })
    }
}

fn solve_error(e: SolveError) -> CollaboratorError {
    match e {
        SolveError::RankDeficient => CollaboratorError::SingularDesign,
        SolveError::NonFinite => CollaboratorError::Overflow,
    }
}

/// `σ² (X_A^T X_A)^{-1}` embedded into a `p x p` matrix (zeros outside the
/// active set `A`).
fn active_covariance(
    xw: &DMatrix<f64>,
    active: &[usize],
    p: usize,
    sigma2: f64,
) -> Result<DMatrix<f64>, CollaboratorError> {
    let mut cov = DMatrix::<f64>::zeros(p, p);
    if active.is_empty() {
        return Ok(cov);
    }

    let xa = xw.select_columns(active);
    let ya = DVector::<f64>::zeros(xa.nrows());
    let fit = solve_least_squares(&xa, &ya).map_err(solve_error)?;

    for (a, &i) in active.iter().enumerate() {
        for (b, &j) in active.iter().enumerate() {
            cov[(i, j)] = sigma2 * fit.xtx_inv[(a, b)];
        }
    }
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(CollaboratorError::Overflow);
    }
    Ok(cov)
}
