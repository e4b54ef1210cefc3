//! Adapter between the search and a `FitCollaborator`.
//!
//! Responsibilities:
//!
//! - build the design matrix for a specification from named data columns
//! - call the collaborator, optionally under a wall-clock watchdog on a bounded pool
//! - turn numerical failures (and panics) into a failed `FitResult`
//! - surface setup problems (missing columns, unavailable collaborator) as errors

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::data::{DataProvider, require_column};
use crate::domain::{CoefficientEstimate, FailureReason, FitResult, ModelSpecification};
use crate::error::{RoverError, RoverResult};
use crate::fit::collaborator::{CollaboratorError, FitCollaborator, FitOutcome, FitRequest};

pub struct FitAdapter {
    collaborator: Arc<dyn FitCollaborator>,
    response: String,
    weights: Option<String>,
    offset: Option<String>,
    timeout: Option<Duration>,
    /// Runs timed fits; sized once so abandoned fits cannot pile up threads.
    watchdog: Option<rayon::ThreadPool>,
    invocations: AtomicUsize,
}

impl std::fmt::Debug for FitAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitAdapter")
            .field("collaborator", &self.collaborator.name())
            .field("response", &self.response)
            .field("weights", &self.weights)
            .field("offset", &self.offset)
            .field("timeout", &self.timeout)
            .field(
                "watchdog_threads",
                &self.watchdog.as_ref().map(rayon::ThreadPool::current_num_threads),
            )
            .finish()
    }
}

impl FitAdapter {
    pub fn new(collaborator: Arc<dyn FitCollaborator>, response: impl Into<String>) -> Self {
        Self {
            collaborator,
            response: response.into(),
            weights: None,
            offset: None,
            timeout: None,
            watchdog: None,
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn with_weights(mut self, column: impl Into<String>) -> Self {
        self.weights = Some(column.into());
        self
    }

    pub fn with_offset(mut self, column: impl Into<String>) -> Self {
        self.offset = Some(column.into());
        self
    }

    /// Stop waiting for a single fit after `timeout` and record it as failed.
    ///
    /// Timed fits run on a dedicated pool of `threads` threads (0 picks the rayon
    /// default). A fit that ignores its deadline holds its thread until it
    /// returns; later fits queue behind it, and queueing counts against their
    /// own timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>, threads: usize) -> RoverResult<Self> {
        self.watchdog = match timeout {
            Some(_) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("rover-fit-{i}"))
                    .build()
                    .map_err(|e| RoverError::invalid_config(format!("fit watchdog pool: {e}")))?,
            ),
            None => None,
        };
        self.timeout = timeout;
        Ok(self)
    }

    pub fn collaborator_name(&self) -> &str {
        self.collaborator.name()
    }

    pub fn offset_column(&self) -> Option<&str> {
        self.offset.as_deref()
    }

    /// How many times the collaborator has been called.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Check the columns every fit needs regardless of specification.
    pub fn check_columns<D>(&self, data: &D) -> RoverResult<()>
    where
        D: DataProvider + ?Sized,
    {
        require_column(data, &self.response)?;
        if let Some(w) = &self.weights {
            require_column(data, w)?;
        }
        if let Some(o) = &self.offset {
            require_column(data, o)?;
        }
        Ok(())
    }

    /// Fit one specification. Bypasses any cache.
    pub fn fit<D>(&self, spec: &ModelSpecification, data: &D) -> RoverResult<FitResult>
    where
        D: DataProvider + ?Sized,
    {
        let request = self.build_request(spec, data)?;
        let n_obs = request.n_obs();

        self.invocations.fetch_add(1, Ordering::SeqCst);
        let outcome = self.call_collaborator(request);

        match outcome {
            Ok(out) => Ok(self.to_fit_result(spec, out, n_obs)),
            Err(CollaboratorError::Unavailable(reason)) => {
                Err(RoverError::CollaboratorUnavailable { reason })
            }
            Err(err) => {
                let (reason, iterations) = classify(&err);
                debug!(spec = %spec.key(), reason = %reason, error = %err, "fit failed");
                Ok(FitResult::failed(spec.key().clone(), reason, n_obs, iterations))
            }
        }
    }

    fn build_request<D>(&self, spec: &ModelSpecification, data: &D) -> RoverResult<FitRequest>
    where
        D: DataProvider + ?Sized,
    {
        let n = data.n_rows();
        let columns: Vec<String> = spec.design_columns().map(str::to_string).collect();

        let mut design = DMatrix::<f64>::zeros(n, columns.len());
        for (j, name) in columns.iter().enumerate() {
            let col = require_column(data, name)?;
            design.set_column(j, &DVector::from_column_slice(col));
        }

        let response = DVector::from_column_slice(require_column(data, &self.response)?);
        let weights = match &self.weights {
            Some(w) => Some(DVector::from_column_slice(require_column(data, w)?)),
            None => None,
        };
        let offset = match &self.offset {
            Some(o) => Some(DVector::from_column_slice(require_column(data, o)?)),
            None => None,
        };

        Ok(FitRequest {
            design,
            columns,
            response,
            weights,
            offset,
            deadline: self.timeout.map(|t| Instant::now() + t),
        })
    }

    fn call_collaborator(&self, request: FitRequest) -> Result<FitOutcome, CollaboratorError> {
        let (Some(timeout), Some(watchdog)) = (self.timeout, &self.watchdog) else {
            return catch_unwind(AssertUnwindSafe(|| self.collaborator.fit(&request)))
                .unwrap_or_else(|_| Err(CollaboratorError::Other("collaborator panicked".into())));
        };

        // Watchdog: the fit runs on the watchdog pool; if it overruns we stop
        // waiting and its eventual result is dropped.
        let (tx, rx) = mpsc::channel();
        let collaborator = Arc::clone(&self.collaborator);
        watchdog.spawn(move || {
            let res = catch_unwind(AssertUnwindSafe(|| collaborator.fit(&request)));
            let _ = tx.send(res);
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(res)) => res,
            Ok(Err(_)) => Err(CollaboratorError::Other("collaborator panicked".into())),
            Err(RecvTimeoutError::Timeout) => Err(CollaboratorError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CollaboratorError::Other("collaborator thread vanished".into()))
            }
        }
    }

    fn to_fit_result(&self, spec: &ModelSpecification, out: FitOutcome, n_obs: usize) -> FitResult {
        let key = spec.key().clone();
        let p = spec.covariate_count();

        if out.coefficients.len() != p {
            debug!(
                spec = %key,
                expected = p,
                found = out.coefficients.len(),
                "collaborator returned wrong coefficient count"
            );
            return FitResult::failed(key, FailureReason::Unknown, n_obs, out.iterations);
        }
        if !out.converged {
            return FitResult::failed(key, FailureReason::MaxIterationsExceeded, n_obs, out.iterations);
        }
        if !out.log_likelihood.is_finite() || out.coefficients.iter().any(|b| !b.is_finite()) {
            return FitResult::failed(key, FailureReason::NumericalOverflow, n_obs, out.iterations);
        }

        let covariance = out
            .covariance
            .filter(|c| c.shape() == (p, p))
            // nalgebra is column-major; FitResult stores row-major.
            .map(|c| c.transpose().as_slice().to_vec());

        let coefficients = spec
            .design_columns()
            .zip(&out.coefficients)
            .enumerate()
            .map(|(j, (name, &estimate))| CoefficientEstimate {
                name: name.to_string(),
                estimate,
                variance: covariance.as_ref().map_or(f64::NAN, |c| c[j * p + j]),
            })
            .collect();

        FitResult {
            specification_key: key,
            coefficients,
            covariance,
            log_likelihood: Some(out.log_likelihood),
            converged: true,
            iterations_used: out.iterations,
            failure_reason: None,
            n_obs,
        }
    }
}

fn classify(err: &CollaboratorError) -> (FailureReason, usize) {
    match err {
        CollaboratorError::SingularDesign => (FailureReason::SingularDesign, 0),
        CollaboratorError::MaxIterations { iterations } => {
            (FailureReason::MaxIterationsExceeded, *iterations)
        }
        CollaboratorError::Overflow => (FailureReason::NumericalOverflow, 0),
        CollaboratorError::Timeout => (FailureReason::Timeout, 0),
        CollaboratorError::Other(_) | CollaboratorError::Unavailable(_) => {
            (FailureReason::Unknown, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataFrame;
    use crate::fit::GaussianFamily;

    fn frame() -> DataFrame {
        DataFrame::new()
            .with_column("intercept", vec![1.0; 6])
            .unwrap()
            .with_column("x", vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap()
            .with_column("x_copy", vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap()
            .with_column("y", vec![1.1, 2.9, 5.2, 6.8, 9.1, 11.0])
            .unwrap()
    }

    fn adapter() -> FitAdapter {
        FitAdapter::new(Arc::new(GaussianFamily::ols()), "y")
    }

    struct Sleepy;

    impl FitCollaborator for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn fit(&self, _request: &FitRequest) -> Result<FitOutcome, CollaboratorError> {
            std::thread::sleep(Duration::from_millis(500));
            Err(CollaboratorError::Other("woke up too late".into()))
        }
    }

    struct Panicky;

    impl FitCollaborator for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }

        fn fit(&self, _request: &FitRequest) -> Result<FitOutcome, CollaboratorError> {
            panic!("boom")
        }
    }

    struct Offline;

    impl FitCollaborator for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        fn fit(&self, _request: &FitRequest) -> Result<FitOutcome, CollaboratorError> {
            Err(CollaboratorError::Unavailable("backend not configured".into()))
        }
    }

    #[test]
    fn successful_fit_maps_coefficients_in_design_order() {
        let spec = ModelSpecification::new(["intercept"], ["x"]);
        let fit = adapter().fit(&spec, &frame()).unwrap();

        assert!(fit.is_usable());
        assert_eq!(fit.coefficients[0].name, "intercept");
        assert_eq!(fit.coefficients[1].name, "x");
        assert!(fit.coefficients.iter().all(|c| c.variance > 0.0));
        assert_eq!(fit.n_obs, 6);
        // Row-major symmetric covariance.
        let cov = fit.covariance.as_ref().unwrap();
        assert!((cov[1] - cov[2]).abs() < 1e-12);
        assert_eq!(fit.covariance_at(1, 1), fit.coefficients[1].variance);
    }

    #[test]
    fn missing_column_is_a_setup_error() {
        let spec = ModelSpecification::new(["intercept"], ["income"]);
        let err = adapter().fit(&spec, &frame()).unwrap_err();
        assert_eq!(err, RoverError::missing_column("income"));
    }

    #[test]
    fn singular_design_becomes_data() {
        let spec = ModelSpecification::new(["intercept"], ["x", "x_copy"]);
        let fit = adapter().fit(&spec, &frame()).unwrap();

        assert!(!fit.converged);
        assert_eq!(fit.log_likelihood, None);
        assert_eq!(fit.failure_reason, Some(FailureReason::SingularDesign));
    }

    #[test]
    fn overrunning_fit_times_out() {
        let adapter = FitAdapter::new(Arc::new(Sleepy), "y")
            .with_timeout(Some(Duration::from_millis(20)), 1)
            .unwrap();
        let spec = ModelSpecification::new(["intercept"], Vec::<String>::new());
        let fit = adapter.fit(&spec, &frame()).unwrap();
        assert_eq!(fit.failure_reason, Some(FailureReason::Timeout));
    }

    /// Ignores its deadline and records how many fits ran at once.
    #[derive(Default)]
    struct Stubborn {
        running: AtomicUsize,
        peak: AtomicUsize,
        finished: AtomicUsize,
    }

    impl FitCollaborator for Stubborn {
        fn name(&self) -> &str {
            "stubborn"
        }

        fn fit(&self, _request: &FitRequest) -> Result<FitOutcome, CollaboratorError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(60));
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            Err(CollaboratorError::Other("finished late".into()))
        }
    }

    #[test]
    fn abandoned_fits_stay_within_the_watchdog_pool() {
        let stubborn = Arc::new(Stubborn::default());
        let adapter = FitAdapter::new(stubborn.clone(), "y")
            .with_timeout(Some(Duration::from_millis(5)), 2)
            .unwrap();
        let spec = ModelSpecification::new(["intercept"], Vec::<String>::new());

        for _ in 0..6 {
            let fit = adapter.fit(&spec, &frame()).unwrap();
            assert_eq!(fit.failure_reason, Some(FailureReason::Timeout));
        }

        // Three rounds of 60ms on two threads; wait well past that.
        let started = Instant::now();
        while stubborn.finished.load(Ordering::SeqCst) < 6 && started.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(stubborn.finished.load(Ordering::SeqCst), 6);
        assert_eq!(stubborn.peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn no_timeout_means_no_watchdog_pool() {
        let adapter = adapter().with_timeout(None, 4).unwrap();
        assert!(adapter.watchdog.is_none());
        let spec = ModelSpecification::new(["intercept"], ["x"]);
        assert!(adapter.fit(&spec, &frame()).unwrap().is_usable());
    }

    #[test]
    fn panics_are_contained() {
        let adapter = FitAdapter::new(Arc::new(Panicky), "y");
        let spec = ModelSpecification::new(["intercept"], Vec::<String>::new());
        let fit = adapter.fit(&spec, &frame()).unwrap();
        assert_eq!(fit.failure_reason, Some(FailureReason::Unknown));
    }

    #[test]
    fn unavailable_collaborator_is_fatal() {
        let adapter = FitAdapter::new(Arc::new(Offline), "y");
        let spec = ModelSpecification::new(["intercept"], Vec::<String>::new());
        let err = adapter.fit(&spec, &frame()).unwrap_err();
        assert!(matches!(err, RoverError::CollaboratorUnavailable { .. }));
    }

    #[test]
    fn invocations_are_counted() {
        let adapter = adapter();
        let spec = ModelSpecification::new(["intercept"], ["x"]);
        adapter.fit(&spec, &frame()).unwrap();
        adapter.fit(&spec, &frame()).unwrap();
        assert_eq!(adapter.invocations(), 2);
    }

    #[test]
    fn weights_and_offset_columns_feed_the_request() {
        let data = frame()
            .with_column("w", vec![1.0, 1.0, 2.0, 2.0, 1.0, 1.0])
            .unwrap()
            .with_column("off", vec![1.0; 6])
            .unwrap();
        let adapter = adapter().with_weights("w").with_offset("off");
        assert_eq!(adapter.offset_column(), Some("off"));

        let spec = ModelSpecification::new(["intercept"], ["x"]);
        let with_offset = adapter.fit(&spec, &data).unwrap();
        let plain = FitAdapter::new(Arc::new(GaussianFamily::ols()), "y")
            .with_weights("w")
            .fit(&spec, &data)
            .unwrap();

        // A constant offset only moves the intercept.
        let shift = plain.coefficients[0].estimate - with_offset.coefficients[0].estimate;
        assert!((shift - 1.0).abs() < 1e-9);
        assert!((plain.coefficients[1].estimate - with_offset.coefficients[1].estimate).abs() < 1e-9);

        let missing = FitAdapter::new(Arc::new(GaussianFamily::ols()), "y").with_weights("w");
        assert_eq!(
            missing.check_columns(&frame()).unwrap_err(),
            RoverError::missing_column("w")
        );
    }

    #[test]
    fn missing_response_is_caught_up_front() {
        let adapter = FitAdapter::new(Arc::new(GaussianFamily::ols()), "outcome");
        assert_eq!(
            adapter.check_columns(&frame()).unwrap_err(),
            RoverError::missing_column("outcome")
        );
    }
}
