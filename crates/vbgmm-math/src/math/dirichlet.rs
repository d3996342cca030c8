//! Dirichlet distribution over mixing weights.
//!
//! The mixture model uses:
//! - Prior: `π = (π_1..π_K) ~ Dirichlet(α0_1..α0_K)`
//! - Assignments: `z_n | π ~ Categorical(π)`
//! - Variational posterior: `q(π) = Dirichlet(α0_k + N_k)` where `N_k` is the
//!   soft count of observations assigned to component k.

use serde::{Deserialize, Serialize};

use super::stable::{digamma, log_gamma};

/// Parameters for a Dirichlet distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirichletParams {
    /// Concentration parameters (all must be > 0)
    pub alpha: Vec<f64>,
}

impl DirichletParams {
    /// Create new Dirichlet parameters with validation.
    ///
    /// Returns None if any parameter is non-positive, NaN, or if the vector is empty.
    pub fn new(alpha: Vec<f64>) -> Option<Self> {
        if alpha.is_empty() {
            return None;
        }
        for &a in &alpha {
            if a.is_nan() || a <= 0.0 {
                return None;
            }
        }
        Some(Self { alpha })
    }

    /// Create a symmetric Dirichlet with all α_i = value.
    pub fn symmetric(k: usize, value: f64) -> Option<Self> {
        if k == 0 || value.is_nan() || value <= 0.0 {
            return None;
        }
        Some(Self {
            alpha: vec![value; k],
        })
    }

    /// Number of components K.
    pub fn k(&self) -> usize {
        self.alpha.len()
    }

    /// Sum of all concentration parameters: Σ_i α_i.
    pub fn concentration(&self) -> f64 {
        self.alpha.iter().sum()
    }

    /// Mean of the distribution: E[π_i] = α_i / Σ_j α_j.
    pub fn mean(&self) -> Vec<f64> {
        let sum = self.concentration();
        self.alpha.iter().map(|a| a / sum).collect()
    }

    /// Expected log weights: E[log π_i] = ψ(α_i) - ψ(Σ_j α_j).
    pub fn expected_log_weights(&self) -> Vec<f64> {
        let psi_sum = digamma(self.concentration());
        self.alpha.iter().map(|&a| digamma(a) - psi_sum).collect()
    }

    /// Log normalizing constant: log C(α) = log Γ(Σ α) - Σ log Γ(α_i).
    pub fn log_normalizer(&self) -> f64 {
        -log_multivariate_beta(&self.alpha)
    }

    /// Conjugate update with soft counts: α'_i = α_i + n_i.
    ///
    /// Returns None when the counts do not match the component count or
    /// contain negative/NaN entries.
    pub fn posterior(&self, counts: &[f64]) -> Option<DirichletParams> {
        if counts.len() != self.k() {
            return None;
        }
        if counts.iter().any(|c| c.is_nan() || *c < 0.0) {
            return None;
        }
        let alpha = self
            .alpha
            .iter()
            .zip(counts)
            .map(|(&a, &n)| a + n)
            .collect();
        DirichletParams::new(alpha)
    }
}

/// Compute log of the multivariate beta function.
///
/// log B(α) = Σ_i lgamma(α_i) - lgamma(Σ_i α_i)
pub fn log_multivariate_beta(alpha: &[f64]) -> f64 {
    if alpha.is_empty() {
        return f64::NAN;
    }
    for &a in alpha {
        if a.is_nan() || a <= 0.0 {
            return f64::NAN;
        }
    }

    let sum: f64 = alpha.iter().sum();
    let log_sum_gamma: f64 = alpha.iter().map(|&a| log_gamma(a)).sum();

    log_sum_gamma - log_gamma(sum)
}
