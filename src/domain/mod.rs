//! Domain types used throughout the search.
//!
//! This module defines:
//!
//! - covariates and their roles (`Covariate`, `CovariateRole`)
//! - points in model space (`ModelSpecification`, `SpecKey`)
//! - fit and scoring outputs (`FitResult`, `ScoredModel`, `FailureReason`)
//! - the search configuration surface (`SearchConfig` and its option enums)

pub mod config;
pub mod spec;
pub mod types;

pub use config::*;
pub use spec::*;
pub use types::*;
