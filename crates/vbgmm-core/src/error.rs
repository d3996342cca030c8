//! Fit errors and warnings.
//!
//! Errors abort a fit and no partial result is returned. Warnings are collected
//! on the report while the fit keeps running.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vbgmm_config::ValidationError;
use vbgmm_math::LinalgError;

use crate::exit_codes::ExitCode;

/// Fatal fit errors.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("component {component}: {context} is singular after regularization ({source})")]
    SingularMatrix {
        component: usize,
        context: &'static str,
        #[source]
        source: LinalgError,
    },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("non-finite value in {context}")]
    NonFinite { context: String },
}

impl FitError {
    pub(crate) fn singular(component: usize, context: &'static str, source: LinalgError) -> Self {
        FitError::SingularMatrix {
            component,
            context,
            source,
        }
    }

    /// Exit code the CLI reports for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            FitError::SingularMatrix { .. } | FitError::NonFinite { .. } => {
                ExitCode::NumericalError
            }
            FitError::InvalidData(_) | FitError::DimensionMismatch { .. } => ExitCode::DataError,
            FitError::InvalidConfig(_) => ExitCode::ConfigError,
            FitError::Initialization(_) => ExitCode::NumericalError,
        }
    }
}

/// Result type for fit operations.
pub type FitResult<T> = Result<T, FitError>;

/// Recoverable anomalies collected during a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitWarning {
    /// A component's raw responsibility mass fell below a millionth of the
    /// observations.
    EmptyComponent {
        iteration: usize,
        component: usize,
        effective_count: f64,
    },

    /// The lower bound decreased between iterations by more than the tolerance.
    ElboDecrease {
        iteration: usize,
        previous: f64,
        current: f64,
    },
}

impl std::fmt::Display for FitWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitWarning::EmptyComponent {
                iteration,
                component,
                effective_count,
            } => write!(
                f,
                "iteration {}: component {} is empty (N_k = {:.3e})",
                iteration, component, effective_count
            ),
            FitWarning::ElboDecrease {
                iteration,
                previous,
                current,
            } => write!(
                f,
                "iteration {}: ELBO decreased from {:.9} to {:.9}",
                iteration, previous, current
            ),
        }
    }
}
