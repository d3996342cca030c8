//! Fit configuration loading.
//!
//! This module handles:
//! - Config resolution order (CLI > env > XDG > defaults)
//! - Parsing TOML or JSON into `FitConfig`
//! - Semantic validation
//! - Config snapshot generation for fit output

pub use vbgmm_config::validate::ValidationError;
pub use vbgmm_config::{ConfigSnapshot, ConfigSource, FitConfig, ResolvedConfigPath};

use std::path::{Path, PathBuf};

use thiserror::Error;
use vbgmm_config::resolve::{is_json_path, resolve_config};
use vbgmm_config::validate::validate_config;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Semantic validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Loaded configuration with provenance information.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: FitConfig,
    pub resolved: ResolvedConfigPath,
}

impl LoadedConfig {
    /// Snapshot of the effective configuration for fit output.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(&self.config, &self.resolved)
    }
}

/// Resolve, parse and validate the fit configuration.
///
/// An explicit `cli_path` that does not exist is an error; every other source
/// falls back to built-in defaults.
pub fn load_fit_config(cli_path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let resolved = resolve_config(cli_path);
    let config = match &resolved.path {
        Some(path) => parse_config_file(path)?,
        None => FitConfig::default(),
    };
    validate_config(&config)?;
    Ok(LoadedConfig { config, resolved })
}

/// Parse a config file: `.json` as JSON, anything else as TOML.
pub fn parse_config_file(path: &Path) -> Result<FitConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&content, is_json_path(path)).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse config text in the given format.
pub fn parse_config_str(content: &str, json: bool) -> Result<FitConfig, String> {
    if json {
        serde_json::from_str(content).map_err(|e| e.to_string())
    } else {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}
