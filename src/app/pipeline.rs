//! Shared "search pipeline" used by the CLI.
//!
//! sample generation -> registry -> search -> ensemble -> holdout prediction
//!
//! Holdout rows score the ensemble and, separately, every viable model.
//!
//! Keeping the workflow here lets `app` focus on presentation and exports.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::data::{DataFrame, DataProvider, INTERCEPT, SampleConfig, SampleData, generate_sample};
use crate::domain::{Covariate, SearchConfig};
use crate::ensemble::{Ensemble, EnsembleCoefficient, build_ensemble};
use crate::error::{RoverError, RoverResult};
use crate::fit::{FitAdapter, GaussianFamily};
use crate::registry::CovariateRegistry;
use crate::report::{HoldoutSummary, ModelHoldout, holdout_summary, model_holdout};
use crate::search::{SearchOutcome, SearchRun};

/// Everything one `rover search` run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub sample: SampleConfig,
    /// Covariates forced into every model (the intercept always is).
    pub fixed: Vec<String>,
    /// Explorable groups by label.
    pub groups: Vec<(String, Vec<String>)>,
    /// Fraction of rows held out from fitting, in `[0, 1)`.
    pub holdout_fraction: f64,
    pub lasso_lambda: f64,
    pub search: SearchConfig,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub sample: SampleData,
    pub covariate_names: Vec<String>,
    pub collaborator: String,
    pub train_rows: usize,
    pub outcome: SearchOutcome,
    pub ensemble: Ensemble,
    pub coefficients: Vec<EnsembleCoefficient>,
    pub holdout: Option<HoldoutSummary>,
    /// Per-model holdout RMSE, best-scored first. Empty without holdout rows.
    pub model_holdout: Vec<ModelHoldout>,
}

pub fn run_pipeline(config: &RunConfig) -> RoverResult<RunOutput> {
    let family = gaussian_family(config.lasso_lambda)?;
    let sample = generate_sample(&config.sample)?;
    let registry = build_registry(config)?;
    let (train, holdout) = split_holdout(&sample.frame, config.holdout_fraction)?;

    let adapter = FitAdapter::new(Arc::new(family), config.sample.response.clone())
        .with_timeout(config.search.fit_timeout(), config.search.workers.unwrap_or(0))?;

    let mut run = SearchRun::new(&registry, &adapter, config.search.clone())?;
    let outcome = run.execute(&train)?;

    let ensemble = build_ensemble(&outcome.scored, config.search.selection_mode)?
        .with_offset(adapter.offset_column());
    let covariate_names = registry.all_names();
    let coefficients = ensemble.coefficients(&covariate_names);

    let holdout_result = match &holdout {
        Some(frame) if !ensemble.is_empty() => {
            let predictions = ensemble.predict(frame)?;
            let observed = crate::data::require_column(frame, &config.sample.response)?;
            Some(holdout_summary(&predictions, observed))
        }
        _ => None,
    };
    let model_holdout = match &holdout {
        Some(frame) => model_holdout(
            &outcome.ranked(),
            frame,
            &config.sample.response,
            adapter.offset_column(),
        )?,
        None => Vec::new(),
    };

    info!(
        members = ensemble.len(),
        holdout_rows = holdout_result.as_ref().map_or(0, |h| h.n),
        "ensemble built"
    );

    Ok(RunOutput {
        sample,
        covariate_names,
        collaborator: adapter.collaborator_name().to_string(),
        train_rows: train.n_rows(),
        outcome,
        ensemble,
        coefficients,
        holdout: holdout_result,
        model_holdout,
    })
}

/// OLS for `lambda == 0`, lasso with an unpenalized intercept above it.
fn gaussian_family(lambda: f64) -> RoverResult<GaussianFamily> {
    if !(lambda.is_finite() && lambda >= 0.0) {
        return Err(RoverError::invalid_config(format!(
            "lasso lambda must be finite and >= 0, got {lambda}"
        )));
    }
    Ok(if lambda > 0.0 {
        GaussianFamily::lasso(lambda, &[INTERCEPT])
    } else {
        GaussianFamily::ols()
    })
}

/// Intercept and `fixed` are fixed; every other generated covariate is
/// explorable, grouped when it appears in `groups`.
pub fn build_registry(config: &RunConfig) -> RoverResult<CovariateRegistry> {
    let known: HashSet<&str> = config
        .sample
        .covariates
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();

    let mentioned = config
        .fixed
        .iter()
        .chain(config.groups.iter().flat_map(|(_, members)| members));
    for name in mentioned {
        if !known.contains(name.as_str()) {
            return Err(RoverError::invalid_config(format!(
                "unknown covariate '{name}' (not in the generated data)"
            )));
        }
    }

    let mut registry = CovariateRegistry::new();
    registry.register(Covariate::fixed(INTERCEPT))?;
    for (name, _) in &config.sample.covariates {
        let covariate = if config.fixed.contains(name) {
            Covariate::fixed(name.clone())
        } else {
            let group = config
                .groups
                .iter()
                .find(|(_, members)| members.contains(name))
                .map(|(label, _)| label.clone());
            match group {
                Some(label) => Covariate::explorable(name.clone()).in_group(label),
                None => Covariate::explorable(name.clone()),
            }
        };
        registry.register(covariate)?;
    }
    registry.close();
    Ok(registry)
}

/// The trailing `fraction` of rows becomes the holdout frame.
fn split_holdout(frame: &DataFrame, fraction: f64) -> RoverResult<(DataFrame, Option<DataFrame>)> {
    if !(fraction.is_finite() && (0.0..1.0).contains(&fraction)) {
        return Err(RoverError::invalid_config(format!(
            "holdout fraction must be in [0, 1), got {fraction}"
        )));
    }
    let n = frame.n_rows();
    let n_holdout = (n as f64 * fraction).round() as usize;
    if n_holdout == 0 {
        return Ok((frame.clone(), None));
    }
    let n_train = n - n_holdout;
    let train: Vec<usize> = (0..n_train).collect();
    let test: Vec<usize> = (n_train..n).collect();
    Ok((frame.select_rows(&train)?, Some(frame.select_rows(&test)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SelectionMode, Strategy};

    fn config() -> RunConfig {
        RunConfig {
            sample: SampleConfig {
                n_rows: 120,
                seed: 3,
                response: "y".into(),
                intercept: 0.5,
                covariates: vec![
                    ("a".into(), 2.0),
                    ("b".into(), 0.0),
                    ("c1".into(), 1.0),
                    ("c2".into(), -1.0),
                ],
                noise_sd: 0.5,
            },
            fixed: vec![],
            groups: vec![("c".into(), vec!["c1".into(), "c2".into()])],
            holdout_fraction: 0.25,
            lasso_lambda: 0.0,
            search: SearchConfig {
                strategy: Strategy::Exhaustive,
                selection_mode: SelectionMode::TopK(3),
                workers: Some(2),
                ..SearchConfig::default()
            },
        }
    }

    #[test]
    fn pipeline_finds_the_true_support() {
        let out = run_pipeline(&config()).unwrap();

        // Groups a, b, c -> 8 specifications.
        assert_eq!(out.outcome.scored.len(), 8);
        assert_eq!(out.train_rows, 90);
        let best = out.ensemble.best().unwrap();
        assert!(best.key().names().contains(&"a".to_string()));
        assert!(best.key().names().contains(&"c1".to_string()));
        let holdout = out.holdout.unwrap();
        assert_eq!(holdout.n, 30);
        assert!(holdout.rmse < 1.5);

        assert_eq!(out.model_holdout.len(), 8);
        assert_eq!(&out.model_holdout[0].key, best.key());
        // The empty model cannot beat the true support out of sample.
        let empty = out
            .model_holdout
            .iter()
            .find(|m| m.key.names() == ["intercept"])
            .unwrap();
        assert!(out.model_holdout[0].rmse < empty.rmse);
    }

    #[test]
    fn grouped_covariates_move_together() {
        let out = run_pipeline(&config()).unwrap();
        for model in &out.outcome.scored {
            let names = model.key().names();
            let has_c1 = names.contains(&"c1".to_string());
            let has_c2 = names.contains(&"c2".to_string());
            assert_eq!(has_c1, has_c2);
        }
    }

    #[test]
    fn unknown_fixed_covariate_is_rejected() {
        let mut cfg = config();
        cfg.fixed = vec!["income".into()];
        assert!(matches!(
            build_registry(&cfg),
            Err(RoverError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn zero_holdout_fits_on_everything() {
        let mut cfg = config();
        cfg.holdout_fraction = 0.0;
        let out = run_pipeline(&cfg).unwrap();
        assert_eq!(out.train_rows, 120);
        assert!(out.holdout.is_none());
        assert!(out.model_holdout.is_empty());
    }

    #[test]
    fn negative_lasso_penalty_is_rejected() {
        let mut cfg = config();
        for lambda in [-0.5, f64::NAN] {
            cfg.lasso_lambda = lambda;
            assert!(matches!(
                run_pipeline(&cfg),
                Err(RoverError::InvalidConfiguration { .. })
            ));
        }
    }

    #[test]
    fn bad_holdout_fraction_is_rejected() {
        let mut cfg = config();
        cfg.holdout_fraction = 1.0;
        assert!(run_pipeline(&cfg).is_err());
    }
}
