//! Wishart distribution quantities for precision-matrix posteriors.
//!
//! A precision matrix `Λ ~ W(W, ν)` over D dimensions has density
//! `B(W, ν) |Λ|^{(ν-D-1)/2} exp(-tr(W⁻¹Λ)/2)`. Everything here is expressed in
//! terms of the inverse scale `W⁻¹` because that is the matrix the mixture
//! updates accumulate; only its log-determinant is needed.

use std::f64::consts::LN_2;

use serde::{Deserialize, Serialize};

use super::stable::{log_multivariate_gamma, multivariate_digamma};

/// Scalar summary of a Wishart distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WishartParams {
    /// Degrees of freedom ν (must exceed D - 1).
    pub dof: f64,
    /// Dimension D of the precision matrix.
    pub dim: usize,
    /// log |W⁻¹|.
    pub log_det_inv_scale: f64,
}

impl WishartParams {
    /// Returns None when ν ≤ D - 1, D = 0, or the log-determinant is not finite.
    pub fn new(dof: f64, dim: usize, log_det_inv_scale: f64) -> Option<Self> {
        if dim == 0 || dof.is_nan() || dof <= dim as f64 - 1.0 {
            return None;
        }
        if !log_det_inv_scale.is_finite() {
            return None;
        }
        Some(Self {
            dof,
            dim,
            log_det_inv_scale,
        })
    }

    /// log B(W, ν) = -(ν/2) log|W| - (νD/2) log 2 - log Γ_D(ν/2)
    pub fn log_normalizer(&self) -> f64 {
        let d = self.dim as f64;
        0.5 * self.dof * self.log_det_inv_scale
            - 0.5 * self.dof * d * LN_2
            - log_multivariate_gamma(0.5 * self.dof, self.dim)
    }

    /// E[log |Λ|] = Σ_{i=0..D-1} ψ((ν-i)/2) + D log 2 - log|W⁻¹|
    pub fn expected_log_det(&self) -> f64 {
        multivariate_digamma(self.dof, self.dim) + self.dim as f64 * LN_2
            - self.log_det_inv_scale
    }

    /// H[Λ] = -log B(W, ν) - ((ν-D-1)/2) E[log|Λ|] + νD/2
    pub fn entropy(&self) -> f64 {
        let d = self.dim as f64;
        -self.log_normalizer() - 0.5 * (self.dof - d - 1.0) * self.expected_log_det()
            + 0.5 * self.dof * d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::stable::{digamma, log_gamma};

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    // For D = 1 the Wishart with inverse scale s is Gamma(shape ν/2, rate s/2).

    #[test]
    fn one_dim_normalizer_matches_gamma() {
        let (nu, s) = (5.0, 3.0);
        let w = WishartParams::new(nu, 1, f64::ln(s)).unwrap();
        let (a, b) = (0.5 * nu, 0.5 * s);
        let expected = a * b.ln() - log_gamma(a);
        assert!(approx_eq(w.log_normalizer(), expected, 1e-10));
    }

    #[test]
    fn one_dim_expected_log_matches_gamma() {
        let (nu, s) = (2.5, 0.7);
        let w = WishartParams::new(nu, 1, f64::ln(s)).unwrap();
        let expected = digamma(0.5 * nu) - (0.5 * s).ln();
        assert!(approx_eq(w.expected_log_det(), expected, 1e-12));
    }

    #[test]
    fn one_dim_entropy_matches_gamma() {
        let (nu, s) = (7.0, 1.3);
        let w = WishartParams::new(nu, 1, f64::ln(s)).unwrap();
        let (a, b) = (0.5 * nu, 0.5 * s);
        let expected = a - b.ln() + log_gamma(a) + (1.0 - a) * digamma(a);
        assert!(approx_eq(w.entropy(), expected, 1e-10));
    }

    #[test]
    fn expected_log_det_shifts_with_scale() {
        // Scaling W⁻¹ by c scales Λ by 1/c: E[log|Λ|] drops by D log c.
        let d = 3;
        let base = WishartParams::new(6.0, d, 0.0).unwrap();
        let scaled = WishartParams::new(6.0, d, d as f64 * 4.0f64.ln()).unwrap();
        let drop = base.expected_log_det() - scaled.expected_log_det();
        assert!(approx_eq(drop, d as f64 * 4.0f64.ln(), 1e-12));
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(WishartParams::new(1.0, 3, 0.0).is_none());
        assert!(WishartParams::new(3.0, 0, 0.0).is_none());
        assert!(WishartParams::new(3.0, 2, f64::NEG_INFINITY).is_none());
        assert!(WishartParams::new(f64::NAN, 2, 0.0).is_none());
    }
}
