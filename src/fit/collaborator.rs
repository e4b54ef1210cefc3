//! The fitting capability the search consumes.
//!
//! The search never looks inside a regression family. It hands a collaborator a
//! fully built design (one column per covariate, in design order) and gets back
//! coefficients, their covariance, and a log-likelihood. Families are plain trait
//! implementations; see `gaussian` for the one shipped with the crate.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Everything a collaborator needs for one fit.
///
/// Owned data so a request can be moved onto a watchdog thread.
#[derive(Debug, Clone)]
pub struct FitRequest {
    /// `n x p` design, columns in the order of `columns`.
    pub design: DMatrix<f64>,
    pub columns: Vec<String>,
    pub response: DVector<f64>,
    pub weights: Option<DVector<f64>>,
    pub offset: Option<DVector<f64>>,
    /// Cooperative collaborators should give up after this instant.
    pub deadline: Option<Instant>,
}

impl FitRequest {
    pub fn n_obs(&self) -> usize {
        self.design.nrows()
    }
}

/// What a successful collaborator call returns.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub coefficients: Vec<f64>,
    pub covariance: Option<DMatrix<f64>>,
    pub log_likelihood: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// Collaborator failures.
///
/// Everything except `Unavailable` is a per-fit numerical problem that the
/// adapter turns into data on the `FitResult`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    #[error("design matrix is singular")]
    SingularDesign,

    #[error("no convergence after {iterations} iterations")]
    MaxIterations { iterations: usize },

    #[error("numerical overflow")]
    Overflow,

    #[error("deadline exceeded")]
    Timeout,

    #[error("{0}")]
    Other(String),

    /// The capability itself cannot be used (misconfigured, missing backend).
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// A pluggable regression family.
pub trait FitCollaborator: Send + Sync {
    /// Short label for logs and reports.
    fn name(&self) -> &str;

    fn fit(&self, request: &FitRequest) -> Result<FitOutcome, CollaboratorError>;
}
