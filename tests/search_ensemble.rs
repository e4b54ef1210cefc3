use std::collections::HashSet;
use std::sync::Arc;

use rover::data::{DataProvider, INTERCEPT, SampleConfig, generate_sample};
use rover::domain::{Covariate, Penalty, SearchConfig, SelectionMode, Strategy};
use rover::ensemble::build_ensemble;
use rover::error::RoverError;
use rover::fit::{
    CollaboratorError, FitAdapter, FitCollaborator, FitOutcome, FitRequest, GaussianFamily,
};
use rover::registry::CovariateRegistry;
use rover::search::{RunState, SearchRun};

fn sample() -> rover::data::SampleData {
    generate_sample(&SampleConfig {
        n_rows: 150,
        seed: 11,
        response: "y".into(),
        intercept: 2.0,
        covariates: vec![
            ("age".into(), 0.7),
            ("bmi".into(), 1.2),
            ("smoker".into(), 0.0),
            ("steps".into(), -0.9),
        ],
        noise_sd: 0.8,
    })
    .unwrap()
}

/// Two fixed covariates plus three explorable ones.
fn registry() -> CovariateRegistry {
    let mut reg = CovariateRegistry::new();
    reg.register_all([
        Covariate::fixed(INTERCEPT),
        Covariate::fixed("age"),
        Covariate::explorable("bmi"),
        Covariate::explorable("smoker"),
        Covariate::explorable("steps"),
    ])
    .unwrap();
    reg.close();
    reg
}

fn config() -> SearchConfig {
    SearchConfig {
        strategy: Strategy::Exhaustive,
        penalty: Penalty::Bic,
        selection_mode: SelectionMode::TopK(2),
        workers: Some(4),
        ..SearchConfig::default()
    }
}

#[test]
fn exhaustive_bic_top_two_end_to_end() {
    let data = sample();
    let reg = registry();
    let adapter = FitAdapter::new(Arc::new(GaussianFamily::ols()), "y");

    let mut run = SearchRun::new(&reg, &adapter, config()).unwrap();
    let outcome = run.execute(&data.frame).unwrap();

    assert_eq!(outcome.state, RunState::Completed);
    assert_eq!(outcome.scored.len(), 8);
    let keys: HashSet<_> = outcome.scored.iter().map(|m| m.key().clone()).collect();
    assert_eq!(keys.len(), 8);
    assert_eq!(adapter.invocations(), 8);

    let ensemble = build_ensemble(&outcome.scored, SelectionMode::TopK(2)).unwrap();
    assert_eq!(ensemble.len(), 2);

    let ranked = outcome.ranked();
    let member_keys: Vec<_> = ensemble.members().iter().map(|m| m.model.key()).collect();
    assert_eq!(member_keys, [ranked[0].key(), ranked[1].key()]);
    let total: f64 = ensemble.members().iter().map(|m| m.weight).sum();
    assert!((total - 1.0).abs() < 1e-12);
    assert!(ensemble.members()[0].weight >= ensemble.members()[1].weight);

    let predictions = ensemble.predict(&data.frame).unwrap();
    assert_eq!(predictions.len(), data.frame.n_rows());
    assert!(predictions.iter().all(|p| p.mean.is_finite()));
    assert!(predictions.iter().all(|p| p.variance >= 0.0));

    // The true support is bmi + steps on top of the fixed block.
    let best = ensemble.best().unwrap();
    assert!(best.key().names().contains(&"bmi".to_string()));
    assert!(best.key().names().contains(&"steps".to_string()));

    let coefs = ensemble.coefficients(&reg.all_names());
    assert_eq!(coefs.len(), 5);
    assert_eq!(coefs[0].name, INTERCEPT);
    assert!((coefs[0].inclusion - 1.0).abs() < 1e-12);
}

#[test]
fn repeated_runs_agree() {
    let data = sample();
    let reg = registry();
    let adapter = FitAdapter::new(Arc::new(GaussianFamily::ols()), "y");

    let mut first = SearchRun::new(&reg, &adapter, config()).unwrap();
    let a = first.execute(&data.frame).unwrap();
    let mut second = SearchRun::new(&reg, &adapter, config()).unwrap();
    let b = second.execute(&data.frame).unwrap();

    assert_eq!(first.cache_snapshot(), second.cache_snapshot());
    assert_eq!(a.scored, b.scored);
}

#[test]
fn greedy_forward_fits_fewer_models_and_agrees_on_the_best() {
    let data = sample();
    let reg = registry();
    let exhaustive_adapter = FitAdapter::new(Arc::new(GaussianFamily::ols()), "y");
    let greedy_adapter = FitAdapter::new(Arc::new(GaussianFamily::ols()), "y");

    let best_exhaustive = SearchRun::new(&reg, &exhaustive_adapter, config())
        .unwrap()
        .execute(&data.frame)
        .unwrap()
        .ranked()[0]
        .key()
        .clone();

    let greedy_config = SearchConfig {
        strategy: Strategy::GreedyForward,
        ..config()
    };
    let outcome = SearchRun::new(&reg, &greedy_adapter, greedy_config)
        .unwrap()
        .execute(&data.frame)
        .unwrap();

    assert_eq!(outcome.ranked()[0].key(), &best_exhaustive);
    assert!(greedy_adapter.invocations() <= 8);
    assert_eq!(greedy_adapter.invocations(), outcome.fits_computed);
}

struct AlwaysSingular;

impl FitCollaborator for AlwaysSingular {
    fn name(&self) -> &str {
        "always-singular"
    }

    fn fit(&self, _request: &FitRequest) -> Result<FitOutcome, CollaboratorError> {
        Err(CollaboratorError::SingularDesign)
    }
}

#[test]
fn all_failed_fits_give_an_empty_ensemble() {
    let data = sample();
    let reg = registry();
    let adapter = FitAdapter::new(Arc::new(AlwaysSingular), "y");

    let mut run = SearchRun::new(&reg, &adapter, config()).unwrap();
    let outcome = run.execute(&data.frame).unwrap();

    assert_eq!(outcome.state, RunState::Completed);
    assert_eq!(outcome.scored.len(), 8);
    assert!(outcome.scored.iter().all(|m| m.score == f64::INFINITY));

    let ensemble = build_ensemble(&outcome.scored, SelectionMode::TopK(2)).unwrap();
    assert!(ensemble.is_empty());
    assert_eq!(
        ensemble.predict(&data.frame).unwrap_err(),
        RoverError::EmptyEnsemble
    );
}

#[test]
fn direct_adapter_fit_bypasses_the_run_cache() {
    let data = sample();
    let reg = registry();
    let adapter = FitAdapter::new(Arc::new(GaussianFamily::ols()), "y");

    let mut run = SearchRun::new(&reg, &adapter, config()).unwrap();
    let outcome = run.execute(&data.frame).unwrap();
    let best = outcome.ranked()[0].clone();

    let spec = run
        .space()
        .exhaustive()
        .unwrap()
        .find(|s| s.key() == best.key())
        .unwrap();
    let refit = adapter.fit(&spec, &data.frame).unwrap();

    assert_eq!(adapter.invocations(), 9);
    assert_eq!(&refit, best.fit.as_ref());
    assert_eq!(run.cache_snapshot().len(), 8);
}

#[test]
fn lasso_collaborator_reduces_effective_parameters() {
    let data = sample();
    let reg = registry();
    let adapter = FitAdapter::new(Arc::new(GaussianFamily::lasso(0.3, &[INTERCEPT])), "y");

    let mut run = SearchRun::new(&reg, &adapter, config()).unwrap();
    let outcome = run.execute(&data.frame).unwrap();

    let full = outcome
        .scored
        .iter()
        .find(|m| m.key().len() == 5)
        .unwrap();
    assert!(full.fit.converged);
    // smoker has no effect and is shrunk to exactly zero.
    assert_eq!(full.fit.coefficient("smoker").unwrap().estimate, 0.0);
    assert!(full.effective_parameter_count < 5);
}
