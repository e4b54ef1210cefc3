//! One search run: state machine, worker pool, cache ownership.
//!
//! ```text
//! Idle --execute--> Running --+--> Completed
//!                             +--> Aborted   (setup error, returned as Err)
//! ```
//!
//! Every proposed specification is either skipped (over `max_covariates`) or
//! fitted through the run's cache and scored. Exhaustive search never proposes
//! over-cap specifications and only counts them. Results are reported in
//! proposal order no matter which worker finished first.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::data::DataProvider;
use crate::domain::{FitResult, ModelSpecification, ScoredModel, SearchConfig, SpecKey, Strategy};
use crate::error::{RoverError, RoverResult};
use crate::fit::{FitAdapter, FitCache, Scorer, rank_order};
use crate::registry::CovariateRegistry;
use crate::search::space::ModelSpace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
        }
    }
}

/// What a completed run hands to the ensemble and the report.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub state: RunState,
    pub strategy: Strategy,
    /// Scored models in proposal order.
    pub scored: Vec<ScoredModel>,
    /// Over-cap specifications a greedy walk proposed, in proposal order.
    pub skipped: Vec<SpecKey>,
    /// Every specification left out for exceeding `max_covariates`.
    pub skipped_count: u64,
    /// Number of collaborator fits actually run.
    pub fits_computed: usize,
    /// Moves made by a greedy strategy (0 for exhaustive).
    pub greedy_steps: usize,
}

impl SearchOutcome {
    /// Scored models best first.
    pub fn ranked(&self) -> Vec<ScoredModel> {
        let mut ranked = self.scored.clone();
        ranked.sort_by(rank_order);
        ranked
    }

    pub fn converged_count(&self) -> usize {
        self.scored.iter().filter(|m| m.is_viable()).count()
    }
}

/// Proposal-ordered results of a traversal.
#[derive(Debug, Default)]
pub(crate) struct Visited {
    pub scored: Vec<ScoredModel>,
    pub skipped: Vec<SpecKey>,
    pub skipped_count: u64,
    pub steps: usize,
}

pub struct SearchRun<'r> {
    pub(crate) space: ModelSpace<'r>,
    pub(crate) adapter: &'r FitAdapter,
    pub(crate) config: SearchConfig,
    pub(crate) scorer: Scorer,
    cache: FitCache,
    state: RunState,
}

impl<'r> SearchRun<'r> {
    /// Prepare a run. The registry must be closed and the config valid.
    pub fn new(
        registry: &'r CovariateRegistry,
        adapter: &'r FitAdapter,
        config: SearchConfig,
    ) -> RoverResult<Self> {
        config.validate()?;
        let space = ModelSpace::new(registry)?;
        Ok(Self {
            space,
            adapter,
            scorer: Scorer::from_config(&config),
            config,
            cache: FitCache::new(),
            state: RunState::Idle,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn space(&self) -> &ModelSpace<'r> {
        &self.space
    }

    /// Key-ordered view of every fit this run produced.
    pub fn cache_snapshot(&self) -> BTreeMap<SpecKey, Arc<FitResult>> {
        self.cache.snapshot()
    }

    /// Run the configured strategy to completion.
    ///
    /// A run executes once. Setup errors move it to `Aborted` and are returned.
    pub fn execute<D>(&mut self, data: &D) -> RoverResult<SearchOutcome>
    where
        D: DataProvider + ?Sized,
    {
        if self.state != RunState::Idle {
            return Err(RoverError::invalid_config(format!(
                "search run already {}",
                self.state.as_str()
            )));
        }
        self.state = RunState::Running;

        let started = Instant::now();
        info!(
            strategy = self.config.strategy.display_name(),
            groups = self.space.group_count(),
            collaborator = self.adapter.collaborator_name(),
            "search started"
        );

        let result = self.traverse(data);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(visited) => {
                self.state = RunState::Completed;
                let outcome = SearchOutcome {
                    state: self.state,
                    strategy: self.config.strategy,
                    scored: visited.scored,
                    skipped: visited.skipped,
                    skipped_count: visited.skipped_count,
                    fits_computed: self.cache.fits_computed(),
                    greedy_steps: visited.steps,
                };
                info!(
                    scored = outcome.scored.len(),
                    converged = outcome.converged_count(),
                    skipped = outcome.skipped_count,
                    fits = outcome.fits_computed,
                    elapsed_ms,
                    "search completed"
                );
                Ok(outcome)
            }
            Err(err) => {
                self.state = RunState::Aborted;
                warn!(error = %err, elapsed_ms, "search aborted");
                Err(err)
            }
        }
    }

    fn traverse<D>(&self, data: &D) -> RoverResult<Visited>
    where
        D: DataProvider + ?Sized,
    {
        self.adapter.check_columns(data)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.unwrap_or(0))
            .build()
            .map_err(|e| RoverError::invalid_config(format!("worker pool: {e}")))?;

        pool.install(|| match self.config.strategy {
            Strategy::Exhaustive => self.exhaustive(data),
            Strategy::GreedyForward => self.greedy(data, true),
            Strategy::GreedyBackward => self.greedy(data, false),
        })
    }

    fn exhaustive<D>(&self, data: &D) -> RoverResult<Visited>
    where
        D: DataProvider + ?Sized,
    {
        let scored = Mutex::new(Vec::new());
        let specs = self.space.exhaustive_within(self.config.max_covariates)?;

        // A setup error stops handing out new specifications; fits already
        // running finish and land in the cache.
        specs
            .enumerate()
            .par_bridge()
            .try_for_each(|(idx, spec)| -> RoverResult<()> {
                let model = self.evaluate(&spec, data)?;
                scored
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((idx, model));
                Ok(())
            })?;

        let scored = in_proposal_order(scored.into_inner().unwrap_or_else(PoisonError::into_inner));
        // `exhaustive_within` rejects more than 63 groups, so the shift is in range.
        let total = 1u64 << self.space.group_count();
        let skipped_count = total - scored.len() as u64;
        if skipped_count > 0 {
            debug!(
                skipped = skipped_count,
                max_covariates = self.config.max_covariates,
                "over-cap specifications skipped"
            );
        }

        Ok(Visited {
            scored,
            skipped: Vec::new(),
            skipped_count,
            steps: 0,
        })
    }

    pub(crate) fn admissible(&self, spec: &ModelSpecification) -> bool {
        self.config
            .max_covariates
            .is_none_or(|max| spec.covariate_count() <= max)
    }

    /// Fit through the cache and score.
    pub(crate) fn evaluate<D>(&self, spec: &ModelSpecification, data: &D) -> RoverResult<ScoredModel>
    where
        D: DataProvider + ?Sized,
    {
        let fit = self
            .cache
            .get_or_fit(spec, data, |s, d| self.adapter.fit(s, d))?;
        Ok(self.scorer.score(fit))
    }
}

fn in_proposal_order<T>(mut items: Vec<(usize, T)>) -> Vec<T> {
    items.sort_by_key(|(idx, _)| *idx);
    items.into_iter().map(|(_, item)| item).collect()
}
