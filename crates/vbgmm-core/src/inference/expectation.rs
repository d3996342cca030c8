//! Expectations of the latent parameters under the variational posterior.

use nalgebra::{DMatrix, DVector};
use vbgmm_math::math::linalg::{outer, trace_of_product};

use super::posterior::{ComponentPosterior, Posterior};

/// E[T], E[ln|T|], E[μ] and E[μμᵀ] for one component.
#[derive(Debug, Clone)]
pub struct ComponentExpectations {
    /// E[T_k] = ν_k W_k.
    pub precision: DMatrix<f64>,
    /// E[ln|T_k|] = Σ_i ψ((ν_k - i)/2) + D ln 2 - ln|W_k⁻¹|.
    pub log_det_precision: f64,
    /// E[μ_k] = m_k.
    pub mean: DVector<f64>,
    /// E[μ_k μ_kᵀ] = Cov[μ_k] + m_k m_kᵀ.
    pub mean_outer: DMatrix<f64>,
    /// tr(E[T_k] Cov[μ_k]); D / β_k for the joint parameterization.
    pub mean_uncertainty: f64,
}

impl ComponentExpectations {
    pub fn from_posterior(component: &ComponentPosterior) -> Self {
        let precision = component.inv_scale_factor().inverse() * component.dof;
        let log_det_precision = component.wishart().expected_log_det();
        let mean = component.mean.clone();
        let mean_cov = component.mean_covariance();
        let mean_uncertainty = match component.beta() {
            Some(beta) => component.dim() as f64 / beta,
            None => trace_of_product(&precision, &mean_cov),
        };
        let mean_outer = mean_cov + outer(&mean, &mean);
        Self {
            precision,
            log_det_precision,
            mean,
            mean_outer,
            mean_uncertainty,
        }
    }

    /// Cov[μ_k] recovered from the second moment.
    pub fn mean_covariance(&self) -> DMatrix<f64> {
        &self.mean_outer - outer(&self.mean, &self.mean)
    }
}

/// Expectations for every component plus the expected log mixing weights.
#[derive(Debug, Clone)]
pub struct Expectations {
    pub components: Vec<ComponentExpectations>,
    /// ln π̃_k as used by the E-step.
    pub log_weights: Vec<f64>,
}

/// Recompute all expectations from the posterior.
///
/// `weight_floor` is added to point-estimate weights before taking logs.
pub fn compute_expectations(posterior: &Posterior, weight_floor: f64) -> Expectations {
    Expectations {
        components: posterior
            .components
            .iter()
            .map(ComponentExpectations::from_posterior)
            .collect(),
        log_weights: posterior.weights.expected_log_weights(weight_floor),
    }
}
