//! Crate error type.
//!
//! Only *setup* problems are errors: a bad registry, missing data columns, an
//! unreachable fit collaborator, invalid configuration, or a prediction request
//! against an empty ensemble. Numerical trouble inside a single fit is data
//! (`FailureReason` on the `FitResult`), never a `RoverError`.
//!
//! Every variant maps to a process exit code so the binary can stay a thin
//! wrapper around the library.

use thiserror::Error;

/// Result alias used across the crate.
pub type RoverResult<T> = Result<T, RoverError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoverError {
    #[error("covariate '{name}' is already registered")]
    DuplicateCovariate { name: String },

    #[error("group '{group}' mixes roles: '{name}' is {found} but the group is {expected}")]
    InconsistentGroup {
        group: String,
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("registry is closed; cannot register '{name}'")]
    RegistryClosed { name: String },

    #[error("registry must be closed before a search can start")]
    RegistryOpen,

    #[error("data is missing column '{column}'")]
    MissingColumn { column: String },

    #[error("column '{column}' has {found} rows, expected {expected}")]
    DataShape {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("constant column '{column}' needs a row count; add a data column first")]
    UnknownRowCount { column: String },

    #[error("fit collaborator unavailable: {reason}")]
    CollaboratorUnavailable { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("ensemble is empty; no converged model to predict with")]
    EmptyEnsemble,

    #[error("I/O error on '{path}': {reason}")]
    Io { path: String, reason: String },
}

impl RoverError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    /// Process exit code for the `rover` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            RoverError::InvalidConfiguration { .. } | RoverError::Io { .. } => 2,
            RoverError::DuplicateCovariate { .. }
            | RoverError::InconsistentGroup { .. }
            | RoverError::RegistryClosed { .. }
            | RoverError::RegistryOpen
            | RoverError::MissingColumn { .. }
            | RoverError::DataShape { .. }
            | RoverError::UnknownRowCount { .. } => 3,
            RoverError::CollaboratorUnavailable { .. } => 4,
            RoverError::EmptyEnsemble => 5,
        }
    }
}
