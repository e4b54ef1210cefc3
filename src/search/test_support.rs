use std::collections::HashMap;
use std::sync::Arc;

use crate::data::DataFrame;
use crate::domain::{Covariate, Penalty, SearchConfig, SelectionMode, Strategy};
use crate::fit::{CollaboratorError, FitAdapter, FitCollaborator, FitOutcome, FitRequest};
use crate::registry::CovariateRegistry;

/// Log-likelihood looked up by the comma-joined selected columns.
pub struct Scripted {
    pub ll: HashMap<&'static str, f64>,
}

impl Scripted {
    pub fn new(entries: &[(&'static str, f64)]) -> Self {
        Self {
            ll: entries.iter().copied().collect(),
        }
    }
}

impl FitCollaborator for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fit(&self, request: &FitRequest) -> Result<FitOutcome, CollaboratorError> {
        let selected: Vec<&str> = request
            .columns
            .iter()
            .map(String::as_str)
            .filter(|c| *c != "intercept")
            .collect();
        let ll = self
            .ll
            .get(selected.join(",").as_str())
            .copied()
            .unwrap_or(-100.0);
        Ok(FitOutcome {
            coefficients: vec![1.0; request.columns.len()],
            covariance: None,
            log_likelihood: ll,
            converged: true,
            iterations: 1,
        })
    }
}

pub struct Offline;

impl FitCollaborator for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    fn fit(&self, _request: &FitRequest) -> Result<FitOutcome, CollaboratorError> {
        Err(CollaboratorError::Unavailable("no backend".into()))
    }
}

pub fn registry(explorable: &[&str]) -> CovariateRegistry {
    let mut reg = CovariateRegistry::new();
    reg.register(Covariate::fixed("intercept")).unwrap();
    for name in explorable {
        reg.register(Covariate::explorable(*name)).unwrap();
    }
    reg.close();
    reg
}

pub fn frame() -> DataFrame {
    DataFrame::new()
        .with_column("a", vec![0.0, 1.0, 2.0, 3.0, 4.0])
        .and_then(|f| f.with_constant("intercept", 1.0))
        .and_then(|f| f.with_column("b", vec![1.0, 0.0, 1.0, 0.0, 1.0]))
        .and_then(|f| f.with_column("c", vec![2.0, 3.0, 1.0, 5.0, 4.0]))
        .and_then(|f| f.with_column("y", vec![1.0, 2.5, 2.9, 4.2, 5.1]))
        .unwrap()
}

pub fn adapter(collaborator: impl FitCollaborator + 'static) -> FitAdapter {
    FitAdapter::new(Arc::new(collaborator), "y")
}

/// Score equals `-2 ll`.
pub fn config(strategy: Strategy) -> SearchConfig {
    SearchConfig {
        strategy,
        penalty: Penalty::Custom(0.0),
        selection_mode: SelectionMode::TopK(3),
        workers: Some(2),
        ..SearchConfig::default()
    }
}
