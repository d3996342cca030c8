//! Variational GMM configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for fit options and prior hyperparameters
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Config snapshots for reproducible runs

pub mod options;
pub mod priors;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use options::{FitConfig, InitMethod, Parameterization, Regularization, WeightMode};
pub use priors::{Concentration, PriorConfig};
pub use resolve::{resolve_config, ConfigSource, ResolvedConfigPath};
pub use snapshot::ConfigSnapshot;
pub use validate::{
    validate_config, validate_priors_for_dimension, ValidationError, ValidationResult,
};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
