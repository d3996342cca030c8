//! Prior hyperparameters for the mixture.
//!
//! Every field is optional. Unset values are derived from the data when the
//! fit starts: ν₀ = D, W₀⁻¹ = sample covariance, β₀ = 1, α₀ = 1/K and
//! m₀ = sample mean.

use serde::{Deserialize, Serialize};

/// Dirichlet concentration, either shared by all components or per component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Concentration {
    Symmetric(f64),
    PerComponent(Vec<f64>),
}

impl Concentration {
    /// Expand to a K-vector. Returns None when a per-component vector has the
    /// wrong length.
    pub fn expand(&self, k: usize) -> Option<Vec<f64>> {
        match self {
            Concentration::Symmetric(a) => Some(vec![*a; k]),
            Concentration::PerComponent(v) if v.len() == k => Some(v.clone()),
            Concentration::PerComponent(_) => None,
        }
    }

    pub fn values(&self) -> Vec<f64> {
        match self {
            Concentration::Symmetric(a) => vec![*a],
            Concentration::PerComponent(v) => v.clone(),
        }
    }
}

/// User-supplied prior hyperparameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    /// Dirichlet concentration α₀.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha0: Option<Concentration>,

    /// Mean precision scale β₀.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta0: Option<f64>,

    /// Prior mean m₀ (length D).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean0: Option<Vec<f64>>,

    /// Wishart degrees of freedom ν₀.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nu0: Option<f64>,

    /// Wishart inverse scale W₀⁻¹, row-major D×D.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inv_w0: Option<Vec<Vec<f64>>>,
}

impl PriorConfig {
    /// True when every hyperparameter is derived from the data.
    pub fn is_data_derived(&self) -> bool {
        self.alpha0.is_none()
            && self.beta0.is_none()
            && self.mean0.is_none()
            && self.nu0.is_none()
            && self.inv_w0.is_none()
    }

    /// Dimension implied by m₀ or W₀⁻¹, if either is set.
    pub fn implied_dimension(&self) -> Option<usize> {
        self.mean0
            .as_ref()
            .map(|m| m.len())
            .or_else(|| self.inv_w0.as_ref().map(|w| w.len()))
    }
}
