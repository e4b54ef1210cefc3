//! Least squares via SVD.
//!
//! Every candidate specification is a small linear regression problem:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! Callers scale rows by `sqrt(w_i)` before calling in, so this module only solves
//! ordinary least squares.
//!
//! Implementation choices:
//! - SVD handles tall design matrices and exposes the singular values, which is how
//!   we detect a rank-deficient (singular) design instead of returning garbage.
//! - `(X^T X)^{-1}` is assembled from the same decomposition as `V Σ^{-2} V^T`, so
//!   the coefficient covariance costs nothing extra.

use nalgebra::{DMatrix, DVector};

/// Relative singular-value cutoff below which a design is treated as singular.
pub const RANK_TOL: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    /// Fewer rows than columns, or collinear columns.
    RankDeficient,
    /// The solution contained NaN or infinity.
    NonFinite,
}

/// Solution of a full-rank least squares problem.
#[derive(Debug, Clone)]
pub struct LeastSquares {
    pub beta: DVector<f64>,
    /// `(X^T X)^{-1}`; multiply by the residual variance for the covariance.
    pub xtx_inv: DMatrix<f64>,
}

/// Solve a least squares problem, rejecting rank-deficient designs.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<LeastSquares, SolveError> {
    let (n, p) = x.shape();
    if p == 0 {
        return Ok(LeastSquares {
            beta: DVector::zeros(0),
            xtx_inv: DMatrix::zeros(0, 0),
        });
    }
    if n < p {
        return Err(SolveError::RankDeficient);
    }

    let svd = x.clone().svd(true, true);
    let s = &svd.singular_values;
    let s_max = s.max();
    if !s_max.is_finite() {
        return Err(SolveError::NonFinite);
    }
    if s_max <= 0.0 || s.iter().any(|&v| v <= s_max * RANK_TOL) {
        return Err(SolveError::RankDeficient);
    }

    let beta = svd
        .solve(y, s_max * RANK_TOL)
        .map_err(|_| SolveError::RankDeficient)?;
    if !beta.iter().all(|v| v.is_finite()) {
        return Err(SolveError::NonFinite);
    }

    let v_t = svd.v_t.as_ref().ok_or(SolveError::RankDeficient)?;
    let inv_sq = DMatrix::from_diagonal(&s.map(|v| 1.0 / (v * v)));
    let xtx_inv = v_t.transpose() * inv_sq * v_t;
    if !xtx_inv.iter().all(|v| v.is_finite()) {
        return Err(SolveError::NonFinite);
    }

    Ok(LeastSquares { beta, xtx_inv })
}
