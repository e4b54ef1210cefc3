//! `rover` library crate: model-space search and ensembling.
//!
//! The binary (`rover`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the search can be driven from other programs with their own fit collaborator
//!
//! Typical flow: register covariates in a [`registry::CovariateRegistry`], wrap a
//! [`fit::FitCollaborator`] in a [`fit::FitAdapter`], execute a
//! [`search::SearchRun`], then [`ensemble::build_ensemble`] and predict.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod ensemble;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod registry;
pub mod report;
pub mod search;
pub mod telemetry;
