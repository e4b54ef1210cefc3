//! Greedy forward/backward stepwise traversal.
//!
//! Each step looks at every single-group toggle of the current selection. New
//! neighbors are fitted in parallel and the step waits for all of them; neighbors
//! seen earlier reuse their score. The walk moves to the best neighbor only if it
//! strictly improves on the current score, and otherwise stops.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use tracing::debug;

use crate::data::DataProvider;
use crate::domain::{ModelSpecification, ScoredModel, SpecKey};
use crate::error::{RoverError, RoverResult};
use crate::fit::rank_order;
use crate::search::run::{SearchRun, Visited};

impl SearchRun<'_> {
    pub(crate) fn greedy<D>(&self, data: &D, forward: bool) -> RoverResult<Visited>
    where
        D: DataProvider + ?Sized,
    {
        let g = self.space.group_count();
        let mut selection = vec![!forward; g];

        let start = self.space.specification(&selection);
        if !self.admissible(&start) {
            return Err(RoverError::invalid_config(format!(
                "greedy start point {} has {} covariates, above max_covariates",
                start.key(),
                start.covariate_count()
            )));
        }

        let mut out = Visited::default();
        let mut seen: HashMap<SpecKey, ScoredModel> = HashMap::new();
        let mut skipped: HashSet<SpecKey> = HashSet::new();

        let mut current = self.evaluate(&start, data)?;
        seen.insert(current.key().clone(), current.clone());
        out.scored.push(current.clone());

        while out.steps < self.config.max_steps {
            let mut candidates: Vec<(usize, ScoredModel)> = Vec::new();
            let mut fresh: Vec<(usize, ModelSpecification)> = Vec::new();

            for i in 0..g {
                selection[i] = !selection[i];
                let spec = self.space.specification(&selection);
                selection[i] = !selection[i];

                if !self.admissible(&spec) {
                    if skipped.insert(spec.key().clone()) {
                        debug!(spec = %spec.key(), covariates = spec.covariate_count(), "skipped");
                        out.skipped.push(spec.key().clone());
                    }
                    continue;
                }
                match seen.get(spec.key()) {
                    Some(model) => candidates.push((i, model.clone())),
                    None => fresh.push((i, spec)),
                }
            }

            let fitted: Vec<(usize, ScoredModel)> = fresh
                .par_iter()
                .map(|(i, spec)| self.evaluate(spec, data).map(|m| (*i, m)))
                .collect::<RoverResult<_>>()?;

            for (i, model) in fitted {
                seen.insert(model.key().clone(), model.clone());
                out.scored.push(model.clone());
                candidates.push((i, model));
            }

            let best = candidates
                .into_iter()
                .filter(|(_, m)| m.score < current.score)
                .min_by(|a, b| rank_order(&a.1, &b.1));

            let Some((toggle, model)) = best else {
                break;
            };

            selection[toggle] = !selection[toggle];
            out.steps += 1;
            debug!(
                step = out.steps,
                group = self.space.groups()[toggle].label.as_str(),
                added = selection[toggle],
                score = model.score,
                "greedy move"
            );
            current = model;
        }

        out.skipped_count = out.skipped.len() as u64;
        Ok(out)
    }
}
