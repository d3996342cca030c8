//! Top-level coordinate-ascent driver.
//!
//! A run moves through `Uninitialized → Initialized → Iterating` and ends in
//! either `Converged` (ELBO delta under the tolerance) or `MaxIterReached`.
//! Each iteration is E-step → statistics → M-step → expectations → ELBO.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};
use vbgmm_config::{
    validate_config, FitConfig, Parameterization, PriorConfig, Regularization, WeightMode,
};

use super::elbo::{compute_elbo, ElboTerms};
use super::expectation::{compute_expectations, Expectations};
use super::init::{initializer_for, Initializer};
use super::posterior::{Posterior, PriorHyperparams};
use super::responsibility::{e_step, Responsibilities};
use super::stats::{compute_statistics, SufficientStatistics};
use super::update::update_posterior;
use crate::error::{FitError, FitResult, FitWarning};
use crate::logging::{event_names, generate_run_id};
use crate::observer::{FitObserver, IterationSnapshot, NoopObserver};

/// Absolute slack before an ELBO decrease is reported.
const ELBO_DECREASE_TOLERANCE: f64 = 1e-6;

/// A component is reported empty once its raw count falls below this
/// fraction of the number of observations.
const EMPTY_COMPONENT_FRACTION: f64 = 1e-6;

/// True when `current` falls more than the absolute slack below `previous`.
fn elbo_decreased(previous: f64, current: f64) -> bool {
    current < previous - ELBO_DECREASE_TOLERANCE
}

/// Tolerance on responsibility row sums accepted from an initializer.
const INIT_ROW_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitState {
    Uninitialized,
    Initialized,
    Iterating,
    Converged,
    MaxIterReached,
}

impl FitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FitState::Converged | FitState::MaxIterReached)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FitState::Uninitialized => "uninitialized",
            FitState::Initialized => "initialized",
            FitState::Iterating => "iterating",
            FitState::Converged => "converged",
            FitState::MaxIterReached => "max_iter_reached",
        }
    }
}

impl std::fmt::Display for FitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point summary of the posterior exposed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedParams {
    /// Mixing weights (Dirichlet mean or point estimate).
    pub weights: Vec<f64>,
    /// Component means m_k, K×D.
    pub means: Vec<Vec<f64>>,
    /// Component covariances W_k⁻¹ / ν_k, K×D×D.
    pub covariances: Vec<Vec<Vec<f64>>>,
}

impl FittedParams {
    pub fn from_posterior(posterior: &Posterior) -> Self {
        let means = posterior
            .components
            .iter()
            .map(|c| c.mean.iter().copied().collect())
            .collect();
        let covariances = posterior
            .components
            .iter()
            .map(|c| {
                let cov = c.covariance();
                cov.row_iter()
                    .map(|row| row.iter().copied().collect())
                    .collect()
            })
            .collect();
        Self {
            weights: posterior.weights.mean(),
            means,
            covariances,
        }
    }

    pub fn k(&self) -> usize {
        self.weights.len()
    }
}

/// Result of a single iteration.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    pub iteration: usize,
    pub elbo: f64,
    /// Change from the previous iteration; None on the first.
    pub delta: Option<f64>,
    pub terms: ElboTerms,
}

/// Everything a finished fit produces.
#[derive(Debug, Clone)]
pub struct FitReport {
    pub run_id: String,
    pub state: FitState,
    pub iterations: usize,
    pub params: FittedParams,
    /// One ELBO value per loop iteration.
    pub elbo_trace: Vec<f64>,
    pub warnings: Vec<FitWarning>,
    pub prior: PriorHyperparams,
    pub posterior: Posterior,
    pub responsibilities: Responsibilities,
    pub regularization: Regularization,
}

impl FitReport {
    /// Hard labels for the training data.
    pub fn labels(&self) -> Vec<usize> {
        self.responsibilities.hard_labels()
    }

    /// Responsibilities of new points under the fitted posterior.
    pub fn predict_proba(&self, x: &DMatrix<f64>) -> FitResult<Responsibilities> {
        let d = self.posterior.dim();
        if x.ncols() != d {
            return Err(FitError::DimensionMismatch {
                what: "prediction data columns",
                expected: d,
                actual: x.ncols(),
            });
        }
        validate_data(x)?;
        let exps = compute_expectations(&self.posterior, self.regularization.count_floor());
        e_step(
            x,
            &exps,
            self.posterior.parameterization,
            self.regularization.covariance_floor,
        )
    }

    /// Most responsible component for each row of `x`.
    pub fn predict(&self, x: &DMatrix<f64>) -> FitResult<Vec<usize>> {
        Ok(self.predict_proba(x)?.hard_labels())
    }

    /// Number of components with weight above `threshold`.
    pub fn effective_components(&self, threshold: f64) -> usize {
        self.params.weights.iter().filter(|w| **w > threshold).count()
    }

    pub fn final_elbo(&self) -> Option<f64> {
        self.elbo_trace.last().copied()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Reject empty or non-finite data.
pub fn validate_data(x: &DMatrix<f64>) -> FitResult<()> {
    if x.nrows() == 0 {
        return Err(FitError::InvalidData("no samples".into()));
    }
    if x.ncols() == 0 {
        return Err(FitError::InvalidData("samples have zero dimensions".into()));
    }
    if let Some(pos) = x.iter().position(|v| !v.is_finite()) {
        // Column-major storage.
        let (row, col) = (pos % x.nrows(), pos / x.nrows());
        return Err(FitError::InvalidData(format!(
            "non-finite value at row {}, column {}",
            row, col
        )));
    }
    Ok(())
}

/// In-progress fit over borrowed data.
///
/// Drive it with [`FitRun::step`] for manual control, or let
/// [`VariationalGmm::fit`] run the whole loop.
#[derive(Debug)]
pub struct FitRun<'a> {
    x: &'a DMatrix<f64>,
    parameterization: Parameterization,
    weight_mode: WeightMode,
    regularization: Regularization,
    prior: PriorHyperparams,
    posterior: Posterior,
    expectations: Expectations,
    responsibilities: Responsibilities,
    state: FitState,
    iteration: usize,
    elbo_trace: Vec<f64>,
    warnings: Vec<FitWarning>,
    empty: Vec<bool>,
}

impl<'a> FitRun<'a> {
    /// Validate the data, resolve the prior, and apply the first M-step to
    /// the initializer's responsibilities.
    pub fn initialize(
        x: &'a DMatrix<f64>,
        config: &FitConfig,
        initializer: &dyn Initializer,
    ) -> FitResult<Self> {
        validate_data(x)?;
        let k = config.components;
        let regularization = config.regularization;
        let parameterization = config.parameterization;
        let weight_mode = config.weight_mode();
        let prior =
            PriorHyperparams::from_config(&config.priors, x, k, regularization.covariance_floor)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let resp = initializer.initialize(x, k, &mut rng)?;
        check_initial_responsibilities(&resp, x.nrows(), k)?;
        let responsibilities = Responsibilities::from_resp(resp);

        let start = Posterior::from_prior(&prior, parameterization, weight_mode)?;
        let start_exps = compute_expectations(&start, regularization.count_floor());
        let stats = compute_statistics(x, &responsibilities.resp, &regularization)?;
        let posterior = update_posterior(
            &prior,
            &stats,
            &start_exps,
            parameterization,
            weight_mode,
            regularization.covariance_floor,
        )?;
        let expectations = compute_expectations(&posterior, regularization.count_floor());

        let mut run = Self {
            x,
            parameterization,
            weight_mode,
            regularization,
            prior,
            posterior,
            expectations,
            responsibilities,
            state: FitState::Initialized,
            iteration: 0,
            elbo_trace: Vec::new(),
            warnings: Vec::new(),
            empty: vec![false; k],
        };
        run.check_empty_components(&stats);
        Ok(run)
    }

    /// One full E → M → ELBO iteration.
    pub fn step(&mut self) -> FitResult<StepOutcome> {
        let resp = e_step(
            self.x,
            &self.expectations,
            self.parameterization,
            self.regularization.covariance_floor,
        )?;
        let stats = compute_statistics(self.x, &resp.resp, &self.regularization)?;
        let posterior = update_posterior(
            &self.prior,
            &stats,
            &self.expectations,
            self.parameterization,
            self.weight_mode,
            self.regularization.covariance_floor,
        )?;
        let expectations = compute_expectations(&posterior, self.regularization.count_floor());
        let terms = compute_elbo(&self.prior, &posterior, &expectations, &stats, &resp);
        let elbo = terms.total();

        self.iteration += 1;
        if !elbo.is_finite() {
            return Err(FitError::NonFinite {
                context: format!("ELBO at iteration {}", self.iteration),
            });
        }

        self.responsibilities = resp;
        self.posterior = posterior;
        self.expectations = expectations;
        self.state = FitState::Iterating;

        let previous = self.elbo_trace.last().copied();
        let delta = previous.map(|p| elbo - p);
        if let Some(prev) = previous {
            if elbo_decreased(prev, elbo) {
                warn!(
                    event = event_names::FIT_ELBO_DECREASE,
                    iteration = self.iteration,
                    previous = prev,
                    current = elbo,
                    "ELBO decreased"
                );
                self.warnings.push(FitWarning::ElboDecrease {
                    iteration: self.iteration,
                    previous: prev,
                    current: elbo,
                });
            }
        }
        self.elbo_trace.push(elbo);
        self.check_empty_components(&stats);

        debug!(
            event = event_names::FIT_ITERATION,
            iteration = self.iteration,
            elbo,
            delta = delta.unwrap_or(f64::NAN),
            "iteration complete"
        );

        Ok(StepOutcome {
            iteration: self.iteration,
            elbo,
            delta,
            terms,
        })
    }

    fn check_empty_components(&mut self, stats: &SufficientStatistics) {
        let threshold = EMPTY_COMPONENT_FRACTION * self.x.nrows() as f64;
        for (k, s) in stats.components.iter().enumerate() {
            let is_empty = s.raw_count < threshold;
            if is_empty && !self.empty[k] {
                warn!(
                    event = event_names::FIT_EMPTY_COMPONENT,
                    iteration = self.iteration,
                    component = k,
                    effective_count = s.count,
                    "component lost its responsibility mass"
                );
                self.warnings.push(FitWarning::EmptyComponent {
                    iteration: self.iteration,
                    component: k,
                    effective_count: s.count,
                });
            }
            self.empty[k] = is_empty;
        }
    }

    pub fn state(&self) -> FitState {
        self.state
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn posterior(&self) -> &Posterior {
        &self.posterior
    }

    pub fn prior(&self) -> &PriorHyperparams {
        &self.prior
    }

    pub fn responsibilities(&self) -> &Responsibilities {
        &self.responsibilities
    }

    pub fn elbo_trace(&self) -> &[f64] {
        &self.elbo_trace
    }

    pub fn warnings(&self) -> &[FitWarning] {
        &self.warnings
    }

    pub fn params(&self) -> FittedParams {
        FittedParams::from_posterior(&self.posterior)
    }

    fn notify(&self, observer: &mut dyn FitObserver, is_final: bool) {
        let params = self.params();
        observer.on_iteration(&IterationSnapshot {
            iteration: self.iteration,
            elbo: self.elbo_trace.last().copied(),
            params: &params,
            posterior: &self.posterior,
            responsibilities: &self.responsibilities,
            data: self.x,
            is_final,
        });
    }

    fn finish(self, run_id: String) -> FitReport {
        FitReport {
            run_id,
            state: self.state,
            iterations: self.iteration,
            params: FittedParams::from_posterior(&self.posterior),
            elbo_trace: self.elbo_trace,
            warnings: self.warnings,
            prior: self.prior,
            posterior: self.posterior,
            responsibilities: self.responsibilities,
            regularization: self.regularization,
        }
    }
}

fn check_initial_responsibilities(resp: &DMatrix<f64>, n: usize, k: usize) -> FitResult<()> {
    if resp.shape() != (n, k) {
        return Err(FitError::Initialization(format!(
            "initializer returned a {}x{} matrix, expected {}x{}",
            resp.nrows(),
            resp.ncols(),
            n,
            k
        )));
    }
    if resp.iter().any(|v| !(v.is_finite() && *v >= 0.0)) {
        return Err(FitError::Initialization(
            "responsibilities must be finite and non-negative".into(),
        ));
    }
    for (i, row) in resp.row_iter().enumerate() {
        if (row.sum() - 1.0).abs() > INIT_ROW_SUM_TOLERANCE {
            return Err(FitError::Initialization(format!(
                "responsibility row {} sums to {}",
                i,
                row.sum()
            )));
        }
    }
    Ok(())
}

/// Configured variational GMM.
pub struct VariationalGmm {
    config: FitConfig,
    initializer: Box<dyn Initializer>,
}

impl std::fmt::Debug for VariationalGmm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariationalGmm")
            .field("config", &self.config)
            .field("initializer", &self.initializer.name())
            .finish()
    }
}

impl VariationalGmm {
    /// Validates the configuration; data-dependent checks happen in `fit`.
    pub fn new(config: FitConfig) -> FitResult<Self> {
        validate_config(&config)?;
        let initializer = initializer_for(config.init);
        Ok(Self {
            config,
            initializer,
        })
    }

    /// Replace the configured initializer.
    pub fn with_initializer(mut self, initializer: Box<dyn Initializer>) -> Self {
        self.initializer = initializer;
        self
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn fit(&self, x: &DMatrix<f64>) -> FitResult<FitReport> {
        self.fit_with_observer(x, &mut NoopObserver)
    }

    /// Run the fit, calling `observer` every `plot_period` iterations when
    /// display is on, and once with the final state in every case.
    pub fn fit_with_observer(
        &self,
        x: &DMatrix<f64>,
        observer: &mut dyn FitObserver,
    ) -> FitResult<FitReport> {
        let run_id = generate_run_id();
        let span = info_span!(
            "fit",
            run_id = %run_id,
            n = x.nrows(),
            d = x.ncols(),
            k = self.config.components,
            parameterization = %self.config.parameterization,
        );
        let _guard = span.enter();

        info!(
            event = event_names::FIT_STARTED,
            init = self.initializer.name(),
            seed = self.config.seed,
            max_iter = self.config.max_iter,
            weights = %self.config.weight_mode(),
            "fit started"
        );

        match self.run_loop(x, observer) {
            Ok(run) => {
                let report = run.finish(run_id);
                info!(
                    event = event_names::FIT_FINISHED,
                    state = %report.state,
                    iterations = report.iterations,
                    final_elbo = report.final_elbo().unwrap_or(f64::NAN),
                    warnings = report.warnings.len(),
                    "fit finished"
                );
                Ok(report)
            }
            Err(err) => {
                error!(event = event_names::FIT_FAILED, error = %err, "fit failed");
                Err(err)
            }
        }
    }

    fn run_loop<'a>(
        &self,
        x: &'a DMatrix<f64>,
        observer: &mut dyn FitObserver,
    ) -> FitResult<FitRun<'a>> {
        let mut run = FitRun::initialize(x, &self.config, self.initializer.as_ref())?;
        info!(
            event = event_names::FIT_INITIALIZED,
            effective = run.params().weights.iter().filter(|w| **w > 0.0).count(),
            "initial M-step complete"
        );

        let period = self.config.observer_period();
        if period.is_some() {
            run.notify(observer, false);
        }
        for _ in 0..self.config.max_iter {
            let outcome = run.step()?;

            if let Some(tol) = self.config.tol {
                if outcome.delta.is_some_and(|d| d.abs() < tol) {
                    run.state = FitState::Converged;
                    break;
                }
            }
            if let Some(p) = period {
                if outcome.iteration % p == 0 && outcome.iteration < self.config.max_iter {
                    run.notify(observer, false);
                }
            }
        }
        if !run.state.is_terminal() {
            run.state = FitState::MaxIterReached;
        }
        run.notify(observer, true);
        Ok(run)
    }
}

/// Fit with default settings apart from K, the iteration budget and priors.
pub fn fit(
    x: &DMatrix<f64>,
    k: usize,
    max_iter: usize,
    priors: PriorConfig,
) -> FitResult<FitReport> {
    let config = FitConfig {
        components: k,
        max_iter,
        priors,
        ..FitConfig::default()
    };
    VariationalGmm::new(config)?.fit(x)
}
