//! Fit options: component count, initialization, iteration budget, model variant.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::priors::PriorConfig;

/// How the initial responsibility matrix is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMethod {
    /// Uniform random draws normalized per row.
    #[default]
    Random,
    /// One-hot labels from k-means clustering.
    Kmeans,
}

impl InitMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitMethod::Random => "random",
            InitMethod::Kmeans => "kmeans",
        }
    }
}

impl fmt::Display for InitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InitMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" | "rand" => Ok(InitMethod::Random),
            "kmeans" | "k-means" | "k_means" => Ok(InitMethod::Kmeans),
            _ => Err(format!("unknown init method: {}", s)),
        }
    }
}

/// Parameterization of the mean/precision posterior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameterization {
    /// Joint Gaussian-Wishart posterior: μ | Λ ~ N(m, (βΛ)⁻¹), Λ ~ W(W, ν).
    #[default]
    GaussianWishart,
    /// Factorized posterior q(μ) q(Λ) with a full mean-precision matrix
    /// (Corduneanu & Bishop, 2001).
    CorduneanuBishop,
}

impl Parameterization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Parameterization::GaussianWishart => "gaussian_wishart",
            Parameterization::CorduneanuBishop => "corduneanu_bishop",
        }
    }

    /// Weight treatment used when the config does not name one.
    pub fn default_weight_mode(&self) -> WeightMode {
        match self {
            Parameterization::GaussianWishart => WeightMode::Dirichlet,
            Parameterization::CorduneanuBishop => WeightMode::PointEstimate,
        }
    }
}

impl fmt::Display for Parameterization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Parameterization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "gaussian_wishart" | "gw" | "bishop" => Ok(Parameterization::GaussianWishart),
            "corduneanu_bishop" | "cb" => Ok(Parameterization::CorduneanuBishop),
            _ => Err(format!("unknown parameterization: {}", s)),
        }
    }
}

/// Treatment of the mixing weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMode {
    /// Dirichlet posterior over weights; E-step uses E[log π].
    Dirichlet,
    /// Weights are a point estimate N_k / N refreshed every M-step.
    PointEstimate,
}

impl WeightMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightMode::Dirichlet => "dirichlet",
            WeightMode::PointEstimate => "point_estimate",
        }
    }
}

impl fmt::Display for WeightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WeightMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "dirichlet" => Ok(WeightMode::Dirichlet),
            "point_estimate" | "point" | "ml" => Ok(WeightMode::PointEstimate),
            _ => Err(format!("unknown weight mode: {}", s)),
        }
    }
}

/// Numerical floors applied to the sufficient statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Regularization {
    /// Effective counts get `count_floor_eps · f64::EPSILON` added.
    pub count_floor_eps: f64,
    /// Added to the diagonal of every weighted scatter matrix.
    pub covariance_floor: f64,
}

impl Default for Regularization {
    fn default() -> Self {
        Self {
            count_floor_eps: 10.0,
            covariance_floor: 1e-6,
        }
    }
}

impl Regularization {
    /// Absolute floor added to every effective count.
    pub fn count_floor(&self) -> f64 {
        self.count_floor_eps * f64::EPSILON
    }
}

/// Complete fit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub schema_version: String,

    /// Number of mixture components K.
    pub components: usize,

    pub init: InitMethod,

    /// Seed for the initializer's RNG.
    pub seed: u64,

    /// Iteration budget.
    pub max_iter: usize,

    /// Stop early once the ELBO improves by less than this.
    pub tol: Option<f64>,

    /// Invoke the observer during the fit.
    pub display: bool,

    /// Observer period in iterations (defaults to 1 when display is on).
    pub plot_period: Option<usize>,

    pub parameterization: Parameterization,

    /// Defaults to the parameterization's weight mode.
    pub weights: Option<WeightMode>,

    pub regularization: Regularization,

    pub priors: PriorConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            components: 1,
            init: InitMethod::Random,
            seed: 2208,
            max_iter: 200,
            tol: None,
            display: false,
            plot_period: None,
            parameterization: Parameterization::GaussianWishart,
            weights: None,
            regularization: Regularization::default(),
            priors: PriorConfig::default(),
        }
    }
}

impl FitConfig {
    /// Defaults with K components.
    pub fn with_components(components: usize) -> Self {
        Self {
            components,
            ..Self::default()
        }
    }

    /// Weight treatment after applying the parameterization default.
    pub fn weight_mode(&self) -> WeightMode {
        self.weights
            .unwrap_or_else(|| self.parameterization.default_weight_mode())
    }

    /// Observer period, or None when display is off.
    pub fn observer_period(&self) -> Option<usize> {
        if self.display {
            Some(self.plot_period.unwrap_or(1))
        } else {
            None
        }
    }

    /// Parse from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Canonical JSON used for hashing and snapshots.
    pub fn to_canonical_json(&self) -> String {
        // Struct field order is fixed, so serde output is stable.
        serde_json::to_string(self).unwrap_or_default()
    }
}
