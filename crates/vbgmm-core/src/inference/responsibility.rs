//! E-step: responsibilities from the current expectations.
//!
//! Everything stays in the log domain until each row has been normalized by
//! its log-sum-exp, so well-separated clusters never underflow.

use std::f64::consts::PI;

use nalgebra::DMatrix;
use vbgmm_config::Parameterization;
use vbgmm_math::log_sum_exp;
use vbgmm_math::math::linalg::quadratic_form;

use super::expectation::Expectations;
use crate::error::{FitError, FitResult};

/// Normalized responsibilities in both log and linear form.
#[derive(Debug, Clone)]
pub struct Responsibilities {
    /// ln r_nk
    pub log_resp: DMatrix<f64>,
    /// r_nk, rows sum to one.
    pub resp: DMatrix<f64>,
}

impl Responsibilities {
    /// Wrap an initial responsibility matrix (rows must already sum to one).
    pub fn from_resp(resp: DMatrix<f64>) -> Self {
        let log_resp = resp.map(f64::ln);
        Self { log_resp, resp }
    }

    /// Σ_nk r_nk ln r_nk with 0 ln 0 = 0.
    pub fn neg_entropy(&self) -> f64 {
        self.resp
            .iter()
            .zip(self.log_resp.iter())
            .filter(|(r, _)| **r > 0.0)
            .map(|(r, lr)| r * lr)
            .sum()
    }

    /// Index of the largest responsibility in each row.
    pub fn hard_labels(&self) -> Vec<usize> {
        self.resp
            .row_iter()
            .map(|row| row.transpose().argmax().0)
            .collect()
    }
}

/// ln ρ_nk = ln π̃_k + ½ E[ln|T_k|] - ½ E[(x_n - μ_k)ᵀ T_k (x_n - μ_k)]
///           - ½ floor · tr(E[T_k]) [- D/2 ln 2π for the joint form].
///
/// The quadratic expectation expands as
/// (x_n - m_k)ᵀ E[T_k] (x_n - m_k) + tr(E[T_k] Cov[μ_k]). The floor term
/// matches the covariance floor added to the scatter matrices.
pub fn log_unnormalized(
    x: &DMatrix<f64>,
    expectations: &Expectations,
    parameterization: Parameterization,
    covariance_floor: f64,
) -> DMatrix<f64> {
    let n = x.nrows();
    let d = x.ncols() as f64;
    let k = expectations.components.len();
    let gauss_const = match parameterization {
        Parameterization::GaussianWishart => 0.5 * d * (2.0 * PI).ln(),
        Parameterization::CorduneanuBishop => 0.0,
    };

    let mut log_rho = DMatrix::zeros(n, k);
    for (j, (e, log_w)) in expectations
        .components
        .iter()
        .zip(&expectations.log_weights)
        .enumerate()
    {
        let offset = log_w + 0.5 * e.log_det_precision
            - 0.5 * (e.mean_uncertainty + covariance_floor * e.precision.trace())
            - gauss_const;
        for (i, row) in x.row_iter().enumerate() {
            let diff = row.transpose() - &e.mean;
            log_rho[(i, j)] = offset - 0.5 * quadratic_form(&e.precision, &diff);
        }
    }
    log_rho
}

/// Normalize each row of ln ρ by its log-sum-exp.
pub fn normalize(log_rho: DMatrix<f64>) -> FitResult<Responsibilities> {
    let mut log_resp = log_rho;
    let mut row_buf = vec![0.0; log_resp.ncols()];
    for i in 0..log_resp.nrows() {
        for (j, v) in row_buf.iter_mut().enumerate() {
            *v = log_resp[(i, j)];
        }
        let lse = log_sum_exp(&row_buf);
        if !lse.is_finite() {
            return Err(FitError::NonFinite {
                context: format!("log-responsibility normalizer for sample {}", i),
            });
        }
        for j in 0..log_resp.ncols() {
            log_resp[(i, j)] -= lse;
        }
    }
    let resp = log_resp.map(f64::exp);
    Ok(Responsibilities { log_resp, resp })
}

/// Full E-step.
pub fn e_step(
    x: &DMatrix<f64>,
    expectations: &Expectations,
    parameterization: Parameterization,
    covariance_floor: f64,
) -> FitResult<Responsibilities> {
    normalize(log_unnormalized(
        x,
        expectations,
        parameterization,
        covariance_floor,
    ))
}
