//! Numerically stable primitives for log-domain Bayesian math.

use std::f64::consts::PI;

const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8; // 0.5 * ln(2*pi)
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)] // These are published numerical constants
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Below this argument digamma is shifted up with the recurrence before the
/// asymptotic series is applied.
const DIGAMMA_ASYMPTOTIC_MIN: f64 = 10.0;

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let sum: f64 = values.iter().map(|v| (*v - max).exp()).sum();
    max + sum.ln()
}

/// Natural log of the Gamma function (log |Gamma(z)|).
///
/// Uses a Lanczos approximation with reflection for z < 0.5.
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() || z == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return f64::INFINITY;
    }
    if z <= 0.0 && z == z.floor() {
        return f64::NAN;
    }
    if z < 0.5 {
        let sin_pi = (PI * z).sin();
        return PI.ln() - sin_pi.abs().ln() - log_gamma(1.0 - z);
    }

    let z_minus = z - 1.0;
    let mut x = LANCZOS_COEFFS[0];
    for (i, coeff) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
        x += coeff / (z_minus + i as f64);
    }
    let t = z_minus + LANCZOS_G + 0.5;
    LOG_SQRT_2PI + (z_minus + 0.5) * t.ln() - t + x.ln()
}

/// Digamma function ψ(x) = d/dx log Γ(x).
///
/// Small arguments are shifted with ψ(x) = ψ(x+1) - 1/x, negative non-integer
/// arguments use the reflection formula. Poles (0, -1, -2, ...) return NaN.
pub fn digamma(x: f64) -> f64 {
    if x.is_nan() || x == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if x == f64::INFINITY {
        return f64::INFINITY;
    }
    if x <= 0.0 && x == x.floor() {
        return f64::NAN;
    }
    if x < 0.0 {
        return digamma(1.0 - x) - PI / (PI * x).tan();
    }

    let mut x = x;
    let mut acc = 0.0;
    while x < DIGAMMA_ASYMPTOTIC_MIN {
        acc -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    // Bernoulli-number tail: 1/12, 1/120, 1/252, 1/240, 1/132
    let tail = inv2
        * (1.0 / 12.0
            - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 * (1.0 / 240.0 - inv2 / 132.0))));
    acc + x.ln() - 0.5 * inv - tail
}

/// Multivariate log-gamma: log Γ_d(a) = d(d-1)/4 · log π + Σ_{j=1..d} log Γ(a + (1-j)/2).
///
/// Requires a > (d-1)/2; returns NaN otherwise.
pub fn log_multivariate_gamma(a: f64, d: usize) -> f64 {
    let df = d as f64;
    if a.is_nan() || a <= (df - 1.0) / 2.0 {
        return f64::NAN;
    }
    let mut acc = df * (df - 1.0) / 4.0 * PI.ln();
    for j in 0..d {
        acc += log_gamma(a - j as f64 / 2.0);
    }
    acc
}

/// Sum of digammas appearing in Wishart expectations:
/// Σ_{i=0..d-1} ψ((ν - i) / 2).
pub fn multivariate_digamma(nu: f64, d: usize) -> f64 {
    (0..d).map(|i| digamma(0.5 * (nu - i as f64))).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn log_sum_exp_basic() {
        let out = log_sum_exp(&[0.0, 0.0]);
        assert!(approx_eq(out, 2.0f64.ln(), 1e-12));
    }

    #[test]
    fn log_sum_exp_dominance() {
        let out = log_sum_exp(&[-1000.0, 0.0]);
        assert!(approx_eq(out, 0.0, 1e-12));
    }

    #[test]
    fn log_sum_exp_well_separated_does_not_underflow() {
        // exp(-2000) underflows to zero; the shifted form must not.
        let out = log_sum_exp(&[-2000.0, -2001.0]);
        let expected = -2000.0 + (1.0 + (-1.0f64).exp()).ln();
        assert!(approx_eq(out, expected, 1e-9));
    }

    #[test]
    fn log_sum_exp_all_neg_inf() {
        let out = log_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]);
        assert!(out.is_infinite() && out.is_sign_negative());
    }

    #[test]
    fn log_sum_exp_nan_propagates() {
        assert!(log_sum_exp(&[0.0, f64::NAN]).is_nan());
    }

    #[test]
    fn log_gamma_known_values() {
        assert!(approx_eq(log_gamma(1.0), 0.0, 1e-12));
        assert!(approx_eq(log_gamma(0.5), 0.5 * PI.ln(), 1e-10));
        assert!(approx_eq(log_gamma(5.0), 24.0f64.ln(), 1e-10));
    }

    #[test]
    fn log_gamma_negative_integer_is_nan() {
        assert!(log_gamma(-2.0).is_nan());
    }

    #[test]
    fn digamma_known_values() {
        assert!(approx_eq(digamma(1.0), -EULER_GAMMA, 1e-12));
        assert!(approx_eq(
            digamma(0.5),
            -EULER_GAMMA - 2.0 * 2.0f64.ln(),
            1e-12
        ));
        // ψ(n) = H_{n-1} - γ
        let h4 = 1.0 + 0.5 + 1.0 / 3.0 + 0.25;
        assert!(approx_eq(digamma(5.0), h4 - EULER_GAMMA, 1e-12));
    }

    #[test]
    fn digamma_recurrence_small_argument() {
        let x = 0.05;
        assert!(approx_eq(digamma(x + 1.0), digamma(x) + 1.0 / x, 1e-10));
    }

    #[test]
    fn digamma_reflection() {
        let x = -0.3;
        let lhs = digamma(1.0 - x) - digamma(x);
        let rhs = PI / (PI * x).tan();
        assert!(approx_eq(lhs, rhs, 1e-9));
    }

    #[test]
    fn digamma_poles_are_nan() {
        assert!(digamma(0.0).is_nan());
        assert!(digamma(-3.0).is_nan());
    }

    #[test]
    fn multivariate_gamma_reduces_to_scalar() {
        assert!(approx_eq(log_multivariate_gamma(3.7, 1), log_gamma(3.7), 1e-12));
    }

    #[test]
    fn multivariate_gamma_two_dims() {
        // Γ_2(a) = π^{1/2} Γ(a) Γ(a - 1/2)
        let a = 2.5;
        let expected = 0.5 * PI.ln() + log_gamma(a) + log_gamma(a - 0.5);
        assert!(approx_eq(log_multivariate_gamma(a, 2), expected, 1e-12));
    }

    #[test]
    fn multivariate_gamma_domain() {
        assert!(log_multivariate_gamma(0.5, 2).is_nan());
    }

    #[test]
    fn multivariate_digamma_sums_half_steps() {
        let nu = 4.0;
        let expected = digamma(2.0) + digamma(1.5) + digamma(1.0);
        assert!(approx_eq(multivariate_digamma(nu, 3), expected, 1e-12));
    }
}
