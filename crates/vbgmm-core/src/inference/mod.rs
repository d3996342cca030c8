//! Mean-field variational inference for a Gaussian mixture.
//!
//! Module layout follows one coordinate-ascent iteration:
//! - `posterior`: prior and posterior hyperparameters
//! - `expectation`: E[T], E[ln|T|], E[μ], E[μμᵀ] under the posterior
//! - `responsibility`: the E-step
//! - `stats`: weighted counts, means and scatter
//! - `update`: the M-step
//! - `elbo`: the lower bound
//! - `init`: initial responsibilities
//! - `fit`: the driver and its report

pub mod elbo;
pub mod expectation;
pub mod fit;
pub mod init;
pub mod posterior;
pub mod responsibility;
pub mod stats;
pub mod update;

pub use elbo::{compute_elbo, ElboTerms};
pub use expectation::{compute_expectations, ComponentExpectations, Expectations};
pub use fit::{
    fit, validate_data, FitReport, FitRun, FitState, FittedParams, StepOutcome, VariationalGmm,
};
pub use init::{initialize, initializer_for, Initializer, KMeansInit, RandomInit};
pub use posterior::{
    ComponentPosterior, MeanPrecision, Posterior, PriorHyperparams, WeightPosterior,
};
pub use responsibility::{e_step, Responsibilities};
pub use stats::{compute_statistics, ComponentStats, SufficientStatistics};
pub use update::update_posterior;
