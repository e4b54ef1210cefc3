//! Export a run to JSON.
//!
//! The export is meant to be easy to consume from notebooks or downstream scripts:
//! configuration, run state, every scored model best first, skipped
//! specifications, ensemble members with weights, and averaged coefficients.

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::domain::{ScoredModel, SearchConfig, SpecKey};
use crate::ensemble::{Ensemble, EnsembleCoefficient};
use crate::error::{RoverError, RoverResult};
use crate::report::{HoldoutSummary, ModelHoldout};
use crate::search::{RunState, SearchOutcome};

#[derive(Debug, Serialize)]
pub struct RunExport<'a> {
    pub tool: &'static str,
    pub config: &'a SearchConfig,
    pub collaborator: &'a str,
    pub state: RunState,
    pub fits_computed: usize,
    pub greedy_steps: usize,
    pub scored: Vec<ScoredModel>,
    pub skipped: &'a [SpecKey],
    pub skipped_count: u64,
    pub ensemble: &'a Ensemble,
    pub coefficients: &'a [EnsembleCoefficient],
    pub holdout: Option<&'a HoldoutSummary>,
    pub model_holdout: &'a [ModelHoldout],
}

impl<'a> RunExport<'a> {
    pub fn new(
        config: &'a SearchConfig,
        collaborator: &'a str,
        outcome: &'a SearchOutcome,
        ensemble: &'a Ensemble,
        coefficients: &'a [EnsembleCoefficient],
        holdout: Option<&'a HoldoutSummary>,
        model_holdout: &'a [ModelHoldout],
    ) -> Self {
        Self {
            tool: "rover",
            config,
            collaborator,
            state: outcome.state,
            fits_computed: outcome.fits_computed,
            greedy_steps: outcome.greedy_steps,
            scored: outcome.ranked(),
            skipped: &outcome.skipped,
            skipped_count: outcome.skipped_count,
            ensemble,
            coefficients,
            holdout,
            model_holdout,
        }
    }
}

/// Write a run export as pretty JSON.
///
/// Failed fits carry `score: null` since JSON has no infinity.
pub fn write_run_json(path: &Path, export: &RunExport<'_>) -> RoverResult<()> {
    let io_err = |reason: String| RoverError::Io {
        path: path.display().to_string(),
        reason,
    };
    let file = File::create(path).map_err(|e| io_err(e.to_string()))?;
    serde_json::to_writer_pretty(file, export).map_err(|e| io_err(e.to_string()))
}
