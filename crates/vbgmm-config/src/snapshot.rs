//! Configuration snapshots for reproducible fits.
//!
//! A snapshot captures the exact configuration a fit ran with, so a result can
//! be traced back to its settings and rerun bit-for-bit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::options::FitConfig;
use crate::resolve::{ConfigSource, ResolvedConfigPath};

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path the config was loaded from.
    #[serde(default)]
    pub config_path: Option<String>,

    /// Source of the configuration.
    pub config_source: String,

    /// SHA-256 hash of the canonical JSON form of the effective config.
    pub config_hash: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub components: usize,
    pub init: String,
    pub seed: u64,
    pub max_iter: usize,
    #[serde(default)]
    pub tol: Option<f64>,
    pub parameterization: String,
    pub weights: String,
    /// True when every prior hyperparameter is derived from the data.
    pub data_derived_priors: bool,
}

impl ConfigSnapshot {
    /// Create a snapshot of the effective configuration.
    pub fn new(config: &FitConfig, resolved: &ResolvedConfigPath) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            config_path: resolved.path.as_ref().map(|p| p.display().to_string()),
            config_source: resolved.source.to_string(),
            config_hash: hash_content(&config.to_canonical_json()),
            summary: ConfigSummary::from_config(config),
        }
    }

    /// Create a snapshot with only defaults (no config file loaded).
    pub fn defaults_only() -> Self {
        let config = FitConfig::default();
        let resolved = ResolvedConfigPath {
            path: None,
            source: ConfigSource::BuiltinDefault,
        };
        Self::new(&config, &resolved)
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this snapshot matches another (same effective config).
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.config_hash == other.config_hash
    }

    /// Get a short identifier for this snapshot (first 12 chars of hash).
    pub fn short_id(&self) -> &str {
        &self.config_hash[..12.min(self.config_hash.len())]
    }
}

impl ConfigSummary {
    fn from_config(config: &FitConfig) -> Self {
        ConfigSummary {
            components: config.components,
            init: config.init.to_string(),
            seed: config.seed,
            max_iter: config.max_iter,
            tol: config.tol,
            parameterization: config.parameterization.to_string(),
            weights: config.weight_mode().to_string(),
            data_derived_priors: config.priors.is_data_derived(),
        }
    }
}

/// Hash content with SHA-256 and return hex string.
fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
