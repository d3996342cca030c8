//! Variational Bayesian Gaussian Mixture Core Library
//!
//! This library provides:
//! - Mean-field variational inference for a full-covariance Gaussian mixture
//!   with a Dirichlet weight prior and a Gaussian-Wishart mean/precision prior
//! - Observers for watching a fit as it runs
//! - Configuration loading, data helpers and structured output for the CLI
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod data;
pub mod error;
pub mod exit_codes;
pub mod inference;
pub mod logging;
pub mod observer;
pub mod output;

pub use error::{FitError, FitResult, FitWarning};
pub use inference::{fit, FitReport, FitState, FittedParams, VariationalGmm};
pub use observer::{FitObserver, IterationSnapshot, JsonlObserver, NoopObserver, TracingObserver};
