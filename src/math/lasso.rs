//! L1-penalized least squares by cyclic coordinate descent.
//!
//! Solves
//!
//! ```text
//! minimize (1 / 2n) Σ (y_i - x_i^T β)^2 + λ Σ |β_j|
//! ```
//!
//! on an already row-weighted design. Coefficients can land exactly on zero, which
//! is what makes the effective parameter count of a fit smaller than its nominal
//! covariate count.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};

/// Knobs for the coordinate descent loop.
#[derive(Debug, Clone, Copy)]
pub struct LassoOptions {
    pub lambda: f64,
    pub max_iter: usize,
    /// Convergence threshold on the largest coefficient change in one sweep.
    pub tol: f64,
}

#[derive(Debug, Clone)]
pub enum LassoOutcome {
    Converged { beta: DVector<f64>, sweeps: usize },
    MaxIterations { sweeps: usize },
    Deadline { sweeps: usize },
    NonFinite { sweeps: usize },
}

fn soft_threshold(z: f64, gamma: f64) -> f64 {
    if z > gamma {
        z - gamma
    } else if z < -gamma {
        z + gamma
    } else {
        0.0
    }
}

/// Run coordinate descent until convergence, `max_iter` sweeps, or the deadline.
///
/// `penalized[j] == false` exempts column `j` from the L1 term (e.g. an intercept).
pub fn lasso(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    penalized: &[bool],
    opts: &LassoOptions,
    deadline: Option<Instant>,
) -> LassoOutcome {
    let (n, p) = x.shape();
    let n_f = n.max(1) as f64;

    // Per-column mean square; zero columns stay at zero.
    let col_sq: Vec<f64> = (0..p).map(|j| x.column(j).norm_squared() / n_f).collect();

    let mut beta = DVector::<f64>::zeros(p);
    let mut residual = y.clone();

    for sweep in 1..=opts.max_iter {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return LassoOutcome::Deadline { sweeps: sweep - 1 };
        }

        let mut max_delta = 0.0_f64;
        for j in 0..p {
            if col_sq[j] <= 0.0 {
                continue;
            }
            let xj = x.column(j);
            let old = beta[j];
            // Partial residual correlation including the current coefficient.
            let rho = xj.dot(&residual) / n_f + col_sq[j] * old;
            let gamma = if penalized.get(j).copied().unwrap_or(true) {
                opts.lambda
            } else {
                0.0
            };
            let new = soft_threshold(rho, gamma) / col_sq[j];

            let delta = new - old;
            if delta != 0.0 {
                residual.axpy(-delta, &xj, 1.0);
                beta[j] = new;
                max_delta = max_delta.max(delta.abs());
            }
        }

        if !beta.iter().all(|v| v.is_finite()) {
            return LassoOutcome::NonFinite { sweeps: sweep };
        }
        if max_delta < opts.tol {
            return LassoOutcome::Converged { beta, sweeps: sweep };
        }
    }

    LassoOutcome::MaxIterations {
        sweeps: opts.max_iter,
    }
}
