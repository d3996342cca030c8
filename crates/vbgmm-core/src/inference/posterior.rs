//! Prior and variational posterior hyperparameters.
//!
//! The prior is fixed for a run. The posterior holds one record per component
//! plus the mixing-weight posterior, and is replaced wholesale by every M-step.

use nalgebra::{DMatrix, DVector};
use vbgmm_config::{Parameterization, PriorConfig, ValidationError, WeightMode};
use vbgmm_math::math::linalg::{add_to_diagonal, symmetrize};
use vbgmm_math::{DirichletParams, LinalgError, SpdFactor, WishartParams};

use crate::error::{FitError, FitResult};

/// Prior hyperparameters: Dirichlet(α₀) over weights, Gaussian-Wishart
/// (m₀, β₀, W₀⁻¹, ν₀) over each component's mean and precision.
#[derive(Debug, Clone)]
pub struct PriorHyperparams {
    /// Dirichlet concentration, one entry per component.
    pub alpha: Vec<f64>,
    /// Mean precision scale β₀.
    pub beta: f64,
    /// Prior mean m₀.
    pub mean: DVector<f64>,
    /// Wishart inverse scale W₀⁻¹.
    pub inv_scale: DMatrix<f64>,
    /// Wishart degrees of freedom ν₀.
    pub dof: f64,
    inv_scale_factor: SpdFactor,
}

impl PriorHyperparams {
    /// Build a prior from explicit values.
    pub fn new(
        alpha: Vec<f64>,
        beta: f64,
        mean: DVector<f64>,
        mut inv_scale: DMatrix<f64>,
        dof: f64,
    ) -> FitResult<Self> {
        let d = mean.len();
        if d == 0 {
            return Err(FitError::InvalidData("dimension must be at least 1".into()));
        }
        if alpha.is_empty() || alpha.iter().any(|a| !(a.is_finite() && *a > 0.0)) {
            return Err(invalid("priors.alpha0", "entries must be positive"));
        }
        if !(beta.is_finite() && beta > 0.0) {
            return Err(invalid("priors.beta0", "must be positive"));
        }
        if !(dof.is_finite() && dof >= d as f64) {
            return Err(invalid(
                "priors.nu0",
                &format!("must be at least the dimension {}, got {}", d, dof),
            ));
        }
        if mean.iter().any(|v| !v.is_finite()) {
            return Err(invalid("priors.mean0", "entries must be finite"));
        }
        if inv_scale.shape() != (d, d) {
            return Err(FitError::DimensionMismatch {
                what: "prior inverse scale",
                expected: d,
                actual: inv_scale.nrows(),
            });
        }
        symmetrize(&mut inv_scale);
        let inv_scale_factor = SpdFactor::new(&inv_scale)
            .map_err(|_| invalid("priors.inv_w0", "must be positive-definite"))?;

        Ok(Self {
            alpha,
            beta,
            mean,
            inv_scale,
            dof,
            inv_scale_factor,
        })
    }

    /// Resolve configured hyperparameters against the data, deriving any
    /// unset value: ν₀ = D, W₀⁻¹ = sample covariance (+ floor on the
    /// diagonal), β₀ = 1, α₀ = 1/K, m₀ = sample mean.
    pub fn from_config(
        priors: &PriorConfig,
        x: &DMatrix<f64>,
        k: usize,
        covariance_floor: f64,
    ) -> FitResult<Self> {
        let d = x.ncols();
        vbgmm_config::validate_priors_for_dimension(priors, d)?;

        let alpha = match &priors.alpha0 {
            Some(c) => c.expand(k).ok_or(FitError::DimensionMismatch {
                what: "priors.alpha0",
                expected: k,
                actual: c.values().len(),
            })?,
            None => vec![1.0 / k as f64; k],
        };
        let beta = priors.beta0.unwrap_or(1.0);
        let mean = match &priors.mean0 {
            Some(m) => DVector::from_column_slice(m),
            None => sample_mean(x),
        };
        let inv_scale = match &priors.inv_w0 {
            Some(rows) => DMatrix::from_fn(d, d, |i, j| rows[i][j]),
            None => {
                let mut cov = sample_covariance(x);
                add_to_diagonal(&mut cov, covariance_floor);
                cov
            }
        };
        let dof = priors.nu0.unwrap_or(d as f64);

        Self::new(alpha, beta, mean, inv_scale, dof)
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn k(&self) -> usize {
        self.alpha.len()
    }

    pub fn dirichlet(&self) -> DirichletParams {
        DirichletParams {
            alpha: self.alpha.clone(),
        }
    }

    pub fn wishart(&self) -> WishartParams {
        WishartParams {
            dof: self.dof,
            dim: self.dim(),
            log_det_inv_scale: self.inv_scale_factor.log_det(),
        }
    }

    pub fn inv_scale_factor(&self) -> &SpdFactor {
        &self.inv_scale_factor
    }
}

fn invalid(field: &str, message: &str) -> FitError {
    FitError::InvalidConfig(ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    })
}

/// Column means of `x`.
pub fn sample_mean(x: &DMatrix<f64>) -> DVector<f64> {
    let n = x.nrows().max(1) as f64;
    x.row_sum().transpose() / n
}

/// Unbiased sample covariance of the rows of `x` (divides by N - 1, or by 1
/// for a single row).
pub fn sample_covariance(x: &DMatrix<f64>) -> DMatrix<f64> {
    let mean = sample_mean(x);
    let centered = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] - mean[j]);
    let denom = (x.nrows().saturating_sub(1)).max(1) as f64;
    let mut cov = centered.transpose() * &centered / denom;
    symmetrize(&mut cov);
    cov
}

/// Precision of the mean given the component's precision matrix T.
#[derive(Debug, Clone)]
pub enum MeanPrecision {
    /// Joint Gaussian-Wishart: μ | T ~ N(m, (βT)⁻¹).
    Scaled(f64),
    /// Factorized: μ ~ N(m, S⁻¹) with its own D×D precision S.
    Full {
        matrix: DMatrix<f64>,
        factor: SpdFactor,
    },
}

/// Variational posterior of one component's mean and precision.
#[derive(Debug, Clone)]
pub struct ComponentPosterior {
    /// Posterior mean m_k.
    pub mean: DVector<f64>,
    pub mean_precision: MeanPrecision,
    /// Wishart inverse scale W_k⁻¹.
    pub inv_scale: DMatrix<f64>,
    /// Wishart degrees of freedom ν_k.
    pub dof: f64,
    inv_scale_factor: SpdFactor,
}

impl ComponentPosterior {
    /// `inv_scale` must already be symmetric positive-definite.
    pub fn new(
        mean: DVector<f64>,
        mean_precision: MeanPrecision,
        inv_scale: DMatrix<f64>,
        dof: f64,
    ) -> Result<Self, LinalgError> {
        let inv_scale_factor = SpdFactor::new(&inv_scale)?;
        Ok(Self::from_factored(mean, mean_precision, inv_scale, inv_scale_factor, dof))
    }

    pub(crate) fn from_factored(
        mean: DVector<f64>,
        mean_precision: MeanPrecision,
        inv_scale: DMatrix<f64>,
        inv_scale_factor: SpdFactor,
        dof: f64,
    ) -> Self {
        Self {
            mean,
            mean_precision,
            inv_scale,
            dof,
            inv_scale_factor,
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// β_k for the joint parameterization.
    pub fn beta(&self) -> Option<f64> {
        match self.mean_precision {
            MeanPrecision::Scaled(beta) => Some(beta),
            MeanPrecision::Full { .. } => None,
        }
    }

    pub fn inv_scale_factor(&self) -> &SpdFactor {
        &self.inv_scale_factor
    }

    pub fn wishart(&self) -> WishartParams {
        WishartParams {
            dof: self.dof,
            dim: self.dim(),
            log_det_inv_scale: self.inv_scale_factor.log_det(),
        }
    }

    /// Fitted covariance W_k⁻¹ / ν_k.
    pub fn covariance(&self) -> DMatrix<f64> {
        &self.inv_scale / self.dof
    }

    /// Effective posterior covariance of the mean. For the joint form this is
    /// (β E[T])⁻¹, which makes tr(E[T] · cov) exactly D / β.
    pub fn mean_covariance(&self) -> DMatrix<f64> {
        match &self.mean_precision {
            MeanPrecision::Scaled(beta) => &self.inv_scale / (beta * self.dof),
            MeanPrecision::Full { factor, .. } => factor.inverse(),
        }
    }
}

/// Posterior over the mixing weights.
#[derive(Debug, Clone)]
pub enum WeightPosterior {
    Dirichlet(DirichletParams),
    /// Point estimate π_k = Σ_n r_nk / N.
    PointEstimate(Vec<f64>),
}

impl WeightPosterior {
    /// ln π̃_k used by the E-step: E[ln π_k] for a Dirichlet, ln(π_k + floor)
    /// for a point estimate.
    pub fn expected_log_weights(&self, floor: f64) -> Vec<f64> {
        match self {
            WeightPosterior::Dirichlet(d) => d.expected_log_weights(),
            WeightPosterior::PointEstimate(w) => w.iter().map(|p| (p + floor).ln()).collect(),
        }
    }

    /// Point weights reported to callers.
    pub fn mean(&self) -> Vec<f64> {
        match self {
            WeightPosterior::Dirichlet(d) => d.mean(),
            WeightPosterior::PointEstimate(w) => w.clone(),
        }
    }

    pub fn mode(&self) -> WeightMode {
        match self {
            WeightPosterior::Dirichlet(_) => WeightMode::Dirichlet,
            WeightPosterior::PointEstimate(_) => WeightMode::PointEstimate,
        }
    }
}

/// Full variational posterior for a run.
#[derive(Debug, Clone)]
pub struct Posterior {
    pub parameterization: Parameterization,
    pub components: Vec<ComponentPosterior>,
    pub weights: WeightPosterior,
}

impl Posterior {
    /// Posterior equal to the prior for every component. Used as the state
    /// the first M-step updates from.
    pub fn from_prior(
        prior: &PriorHyperparams,
        parameterization: Parameterization,
        weight_mode: WeightMode,
    ) -> FitResult<Self> {
        let k = prior.k();
        let d = prior.dim();
        let mean_precision = match parameterization {
            Parameterization::GaussianWishart => MeanPrecision::Scaled(prior.beta),
            Parameterization::CorduneanuBishop => {
                let matrix = DMatrix::identity(d, d) * prior.beta;
                let factor = SpdFactor::new(&matrix)
                    .map_err(|e| FitError::singular(0, "prior mean precision", e))?;
                MeanPrecision::Full { matrix, factor }
            }
        };
        let component = ComponentPosterior::from_factored(
            prior.mean.clone(),
            mean_precision,
            prior.inv_scale.clone(),
            prior.inv_scale_factor.clone(),
            prior.dof,
        );
        let weights = match weight_mode {
            WeightMode::Dirichlet => WeightPosterior::Dirichlet(prior.dirichlet()),
            WeightMode::PointEstimate => WeightPosterior::PointEstimate(vec![1.0 / k as f64; k]),
        };
        Ok(Self {
            parameterization,
            components: vec![component; k],
            weights,
        })
    }

    pub fn k(&self) -> usize {
        self.components.len()
    }

    pub fn dim(&self) -> usize {
        self.components.first().map(|c| c.dim()).unwrap_or(0)
    }
}
