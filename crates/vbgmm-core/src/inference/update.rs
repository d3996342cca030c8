//! M-step: closed-form posterior updates from sufficient statistics.

use nalgebra::{DMatrix, DVector};
use vbgmm_config::{Parameterization, WeightMode};
use vbgmm_math::math::linalg::{outer, regularize_spd};

use super::expectation::{ComponentExpectations, Expectations};
use super::posterior::{
    ComponentPosterior, MeanPrecision, Posterior, PriorHyperparams, WeightPosterior,
};
use super::stats::{ComponentStats, SufficientStatistics};
use crate::error::{FitError, FitResult};

/// Update every component and the weights.
///
/// `previous` holds the expectations of the posterior being replaced. Only the
/// factorized parameterization reads it (E[T_k] drives its q(μ_k) update).
pub fn update_posterior(
    prior: &PriorHyperparams,
    stats: &SufficientStatistics,
    previous: &Expectations,
    parameterization: Parameterization,
    weight_mode: WeightMode,
    covariance_floor: f64,
) -> FitResult<Posterior> {
    if stats.components.len() != prior.k() {
        return Err(FitError::DimensionMismatch {
            what: "component statistics",
            expected: prior.k(),
            actual: stats.components.len(),
        });
    }

    let components = stats
        .components
        .iter()
        .enumerate()
        .map(|(k, s)| match parameterization {
            Parameterization::GaussianWishart => {
                update_joint(prior, s, covariance_floor).map_err(|e| e.at(k))
            }
            Parameterization::CorduneanuBishop => {
                update_factorized(prior, s, &previous.components[k], covariance_floor)
                    .map_err(|e| e.at(k))
            }
        })
        .collect::<FitResult<Vec<_>>>()?;

    let weights = update_weights(prior, stats, weight_mode)?;

    Ok(Posterior {
        parameterization,
        components,
        weights,
    })
}

/// Gaussian-Wishart update (Bishop, PRML 10.60-10.63):
///
/// β_k = β₀ + N_k, m_k = (β₀ m₀ + N_k x̄_k) / β_k, ν_k = ν₀ + N_k,
/// W_k⁻¹ = W₀⁻¹ + N_k S_k + (β₀ N_k / β_k)(x̄_k - m₀)(x̄_k - m₀)ᵀ.
fn update_joint(
    prior: &PriorHyperparams,
    stats: &ComponentStats,
    covariance_floor: f64,
) -> Result<ComponentPosterior, ComponentFailure> {
    let n = stats.count;
    let beta = prior.beta + n;
    let mean = (&prior.mean * prior.beta + &stats.mean * n) / beta;
    let dof = prior.dof + n;

    let diff = &stats.mean - &prior.mean;
    let inv_scale =
        &prior.inv_scale + &stats.scatter * n + outer(&diff, &diff) * (prior.beta * n / beta);

    finish_component(
        mean,
        MeanPrecision::Scaled(beta),
        inv_scale,
        dof,
        covariance_floor,
    )
}

/// Factorized update (Corduneanu & Bishop, 2001), q(μ_k) first, then q(T_k)
/// against the new q(μ_k):
///
/// S_k = β₀ I + N_k E[T_k], m_k = S_k⁻¹ (β₀ m₀ + E[T_k] N_k x̄_k),
/// ν_k = ν₀ + N_k, W_k⁻¹ = W₀⁻¹ + N_k (S̄_k + (x̄_k - m_k)(x̄_k - m_k)ᵀ + S_k⁻¹)
/// where S̄_k is the weighted scatter.
fn update_factorized(
    prior: &PriorHyperparams,
    stats: &ComponentStats,
    previous: &ComponentExpectations,
    covariance_floor: f64,
) -> Result<ComponentPosterior, ComponentFailure> {
    let n = stats.count;
    let d = prior.dim();

    let precision = DMatrix::identity(d, d) * prior.beta + &previous.precision * n;
    let (precision, factor) = regularize_spd(precision, covariance_floor)
        .map_err(|e| ComponentFailure::singular("mean precision", e))?;
    let rhs = &prior.mean * prior.beta + &previous.precision * (&stats.mean * n);
    let mean = factor.solve(&rhs);
    let mean_cov = factor.inverse();

    let diff = &stats.mean - &mean;
    let inv_scale = &prior.inv_scale + (&stats.scatter + outer(&diff, &diff) + mean_cov) * n;

    finish_component(
        mean,
        MeanPrecision::Full {
            matrix: precision,
            factor,
        },
        inv_scale,
        prior.dof + n,
        covariance_floor,
    )
}

fn finish_component(
    mean: DVector<f64>,
    mean_precision: MeanPrecision,
    inv_scale: DMatrix<f64>,
    dof: f64,
    covariance_floor: f64,
) -> Result<ComponentPosterior, ComponentFailure> {
    if mean.iter().any(|v| !v.is_finite()) {
        return Err(ComponentFailure::NonFinite("posterior mean"));
    }
    let (inv_scale, factor) = regularize_spd(inv_scale, covariance_floor)
        .map_err(|e| ComponentFailure::singular("Wishart inverse scale", e))?;
    Ok(ComponentPosterior::from_factored(
        mean,
        mean_precision,
        inv_scale,
        factor,
        dof,
    ))
}

/// α_k = α₀_k + N_k, or π_k = Σ_n r_nk / N for point estimates.
fn update_weights(
    prior: &PriorHyperparams,
    stats: &SufficientStatistics,
    weight_mode: WeightMode,
) -> FitResult<WeightPosterior> {
    match weight_mode {
        WeightMode::Dirichlet => prior
            .dirichlet()
            .posterior(&stats.counts())
            .map(WeightPosterior::Dirichlet)
            .ok_or_else(|| FitError::NonFinite {
                context: "Dirichlet concentration update".to_string(),
            }),
        WeightMode::PointEstimate => {
            let raw = stats.raw_counts();
            let total: f64 = raw.iter().sum();
            if !(total.is_finite() && total > 0.0) {
                return Err(FitError::NonFinite {
                    context: "mixing weight normalizer".to_string(),
                });
            }
            Ok(WeightPosterior::PointEstimate(
                raw.iter().map(|c| c / total).collect(),
            ))
        }
    }
}

/// Per-component failure, tagged with the component index by the caller.
enum ComponentFailure {
    Singular(&'static str, vbgmm_math::LinalgError),
    NonFinite(&'static str),
}

impl ComponentFailure {
    fn singular(context: &'static str, err: vbgmm_math::LinalgError) -> Self {
        ComponentFailure::Singular(context, err)
    }

    fn at(self, component: usize) -> FitError {
        match self {
            ComponentFailure::Singular(context, source) => {
                FitError::singular(component, context, source)
            }
            ComponentFailure::NonFinite(what) => FitError::NonFinite {
                context: format!("component {} {}", component, what),
            },
        }
    }
}
