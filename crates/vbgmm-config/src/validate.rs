//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::options::FitConfig;
use crate::priors::PriorConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Dimension mismatch for {field}: expected {expected}, got {actual}")]
    DimensionMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
            ValidationError::DimensionMismatch { .. } => 67,
        }
    }

    fn invalid(field: &str, message: String) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message,
        }
    }
}

/// Validate the data-independent parts of a fit configuration.
pub fn validate_config(config: &FitConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if config.components == 0 {
        return Err(ValidationError::invalid(
            "components",
            "Must be at least 1".to_string(),
        ));
    }

    if config.max_iter == 0 {
        return Err(ValidationError::invalid(
            "max_iter",
            "Must be at least 1".to_string(),
        ));
    }

    if let Some(tol) = config.tol {
        if !(tol.is_finite() && tol > 0.0) {
            return Err(ValidationError::invalid(
                "tol",
                format!("Must be positive and finite, got {}", tol),
            ));
        }
    }

    if config.display && config.plot_period == Some(0) {
        return Err(ValidationError::invalid(
            "plot_period",
            "Must be at least 1 when display is enabled".to_string(),
        ));
    }

    validate_positive(
        "regularization.count_floor_eps",
        config.regularization.count_floor_eps,
    )?;
    validate_positive(
        "regularization.covariance_floor",
        config.regularization.covariance_floor,
    )?;

    validate_prior_scalars(&config.priors, config.components)?;

    Ok(())
}

/// Validate prior scalars that do not depend on the data dimension.
fn validate_prior_scalars(priors: &PriorConfig, k: usize) -> ValidationResult<()> {
    if let Some(beta0) = priors.beta0 {
        validate_positive("priors.beta0", beta0)?;
    }

    if let Some(ref alpha0) = priors.alpha0 {
        let expanded = alpha0.expand(k).ok_or_else(|| ValidationError::DimensionMismatch {
            field: "priors.alpha0".to_string(),
            expected: k,
            actual: alpha0.values().len(),
        })?;
        for (i, a) in expanded.iter().enumerate() {
            validate_positive(&format!("priors.alpha0[{}]", i), *a)?;
        }
    }

    if let Some(nu0) = priors.nu0 {
        if !nu0.is_finite() {
            return Err(ValidationError::invalid(
                "priors.nu0",
                format!("Must be finite, got {}", nu0),
            ));
        }
    }

    Ok(())
}

/// Validate prior hyperparameters against the data dimension D.
///
/// Positive-definiteness of W₀⁻¹ needs a factorization and is checked by
/// the inference engine when the prior is built.
pub fn validate_priors_for_dimension(priors: &PriorConfig, d: usize) -> ValidationResult<()> {
    if d == 0 {
        return Err(ValidationError::invalid(
            "data",
            "Dimension must be at least 1".to_string(),
        ));
    }

    if let Some(nu0) = priors.nu0 {
        if nu0 < d as f64 {
            return Err(ValidationError::invalid(
                "priors.nu0",
                format!("Must be at least the dimension {}, got {}", d, nu0),
            ));
        }
    }

    if let Some(ref mean0) = priors.mean0 {
        if mean0.len() != d {
            return Err(ValidationError::DimensionMismatch {
                field: "priors.mean0".to_string(),
                expected: d,
                actual: mean0.len(),
            });
        }
        if mean0.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::invalid(
                "priors.mean0",
                "Entries must be finite".to_string(),
            ));
        }
    }

    if let Some(ref inv_w0) = priors.inv_w0 {
        if inv_w0.len() != d {
            return Err(ValidationError::DimensionMismatch {
                field: "priors.inv_w0".to_string(),
                expected: d,
                actual: inv_w0.len(),
            });
        }
        for (i, row) in inv_w0.iter().enumerate() {
            if row.len() != d {
                return Err(ValidationError::DimensionMismatch {
                    field: format!("priors.inv_w0[{}]", i),
                    expected: d,
                    actual: row.len(),
                });
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(ValidationError::invalid(
                    "priors.inv_w0",
                    format!("Row {} has non-finite entries", i),
                ));
            }
        }
        for i in 0..d {
            if inv_w0[i][i] <= 0.0 {
                return Err(ValidationError::invalid(
                    "priors.inv_w0",
                    format!("Diagonal entry {} must be positive, got {}", i, inv_w0[i][i]),
                ));
            }
            for j in (i + 1)..d {
                let (a, b) = (inv_w0[i][j], inv_w0[j][i]);
                if (a - b).abs() > 1e-9 * a.abs().max(b.abs()).max(1.0) {
                    return Err(ValidationError::SemanticError(format!(
                        "priors.inv_w0 must be symmetric: [{}][{}]={} but [{}][{}]={}",
                        i, j, a, j, i, b
                    )));
                }
            }
        }
    }

    Ok(())
}

fn validate_positive(field: &str, value: f64) -> ValidationResult<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ValidationError::invalid(
            field,
            format!("Must be positive and finite, got {}", value),
        ));
    }
    Ok(())
}
