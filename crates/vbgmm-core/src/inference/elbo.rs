//! Evidence lower bound.
//!
//! L = E[ln p(X | Z, μ, T)] + E[ln p(Z | π)] + E[ln p(π)] + E[ln p(μ, T)]
//!     - E[ln q(Z)] - E[ln q(π)] - E[ln q(μ, T)]
//!
//! Evaluated right after an M-step with the expectations of the new posterior
//! and the responsibilities that produced its statistics. The covariance floor
//! in the scatter matrices acts as a small amount of smoothing on the data and
//! is matched by the E-step, so the bound stays consistent with both updates.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use vbgmm_math::math::linalg::{outer, quadratic_form, trace_of_product};

use super::expectation::{ComponentExpectations, Expectations};
use super::posterior::{MeanPrecision, Posterior, PriorHyperparams, WeightPosterior};
use super::responsibility::Responsibilities;
use super::stats::{ComponentStats, SufficientStatistics};

/// The bound broken into its groups of terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElboTerms {
    /// E[ln p(X | Z, μ, T)]
    pub data: f64,
    /// E[ln p(Z | π)] + E[ln p(π)] - E[ln q(π)]
    pub weights: f64,
    /// -E[ln q(Z)]
    pub assignments: f64,
    /// E[ln p(μ, T)]
    pub mean_precision_prior: f64,
    /// -E[ln q(μ, T)]
    pub mean_precision_entropy: f64,
}

impl ElboTerms {
    pub fn total(&self) -> f64 {
        self.data
            + self.weights
            + self.assignments
            + self.mean_precision_prior
            + self.mean_precision_entropy
    }
}

pub fn compute_elbo(
    prior: &PriorHyperparams,
    posterior: &Posterior,
    expectations: &Expectations,
    stats: &SufficientStatistics,
    resp: &Responsibilities,
) -> ElboTerms {
    let d = prior.dim() as f64;
    let ln_2pi = (2.0 * PI).ln();
    let prior_log_b = prior.wishart().log_normalizer();

    let mut terms = ElboTerms {
        assignments: -resp.neg_entropy(),
        weights: weight_terms(prior, &posterior.weights, expectations, stats),
        ..Default::default()
    };

    for ((c, e), s) in posterior
        .components
        .iter()
        .zip(&expectations.components)
        .zip(&stats.components)
    {
        terms.data += data_term(e, s, d, ln_2pi);

        // Shared Wishart prior part: ln B₀ + (ν₀-D-1)/2 E[ln|T|] - ½ tr(W₀⁻¹ E[T])
        let wishart_prior = prior_log_b + 0.5 * (prior.dof - d - 1.0) * e.log_det_precision
            - 0.5 * trace_of_product(&prior.inv_scale, &e.precision);
        let wishart_entropy = c.wishart().entropy();

        match &c.mean_precision {
            MeanPrecision::Scaled(beta) => {
                let dm = &c.mean - &prior.mean;
                terms.mean_precision_prior += 0.5
                    * (d * (prior.beta / (2.0 * PI)).ln() + e.log_det_precision
                        - d * prior.beta / beta
                        - prior.beta * quadratic_form(&e.precision, &dm))
                    + wishart_prior;
                terms.mean_precision_entropy += -0.5 * e.log_det_precision
                    - 0.5 * d * (beta / (2.0 * PI)).ln()
                    + 0.5 * d
                    + wishart_entropy;
            }
            MeanPrecision::Full { factor, .. } => {
                let dm = &c.mean - &prior.mean;
                let mean_cov_trace = c.mean_covariance().trace();
                terms.mean_precision_prior += 0.5 * d * (prior.beta / (2.0 * PI)).ln()
                    - 0.5 * prior.beta * (mean_cov_trace + dm.norm_squared())
                    + wishart_prior;
                terms.mean_precision_entropy +=
                    0.5 * d * (1.0 + ln_2pi) - 0.5 * factor.log_det() + wishart_entropy;
            }
        }
    }

    terms
}

/// ½ N_k [E ln|T| - D ln 2π - tr(E[T](S_k + (x̄_k - m_k)(x̄_k - m_k)ᵀ)) - tr(E[T] Cov μ_k)]
fn data_term(e: &ComponentExpectations, s: &ComponentStats, d: f64, ln_2pi: f64) -> f64 {
    let diff = &s.mean - &e.mean;
    let spread = &s.scatter + outer(&diff, &diff);
    0.5 * s.count
        * (e.log_det_precision
            - d * ln_2pi
            - trace_of_product(&e.precision, &spread)
            - e.mean_uncertainty)
}

fn weight_terms(
    prior: &PriorHyperparams,
    weights: &WeightPosterior,
    expectations: &Expectations,
    stats: &SufficientStatistics,
) -> f64 {
    let log_w = &expectations.log_weights;
    let counts = stats.counts();
    let assignment: f64 = counts.iter().zip(log_w).map(|(n, lw)| n * lw).sum();

    match weights {
        WeightPosterior::Dirichlet(post) => {
            let prior_dir = prior.dirichlet();
            let log_prior = prior_dir.log_normalizer()
                + prior_dir
                    .alpha
                    .iter()
                    .zip(log_w)
                    .map(|(a, lw)| (a - 1.0) * lw)
                    .sum::<f64>();
            let log_q = post.log_normalizer()
                + post
                    .alpha
                    .iter()
                    .zip(log_w)
                    .map(|(a, lw)| (a - 1.0) * lw)
                    .sum::<f64>();
            assignment + log_prior - log_q
        }
        WeightPosterior::PointEstimate(_) => assignment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::expectation::compute_expectations;
    use crate::inference::responsibility::e_step;
    use crate::inference::stats::compute_statistics;
    use crate::inference::update::update_posterior;
    use nalgebra::{DMatrix, DVector};
    use vbgmm_config::{Parameterization, Regularization, WeightMode};

    const FLOOR: f64 = 1e-6;

    fn data_1d() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            10,
            1,
            &[-2.1, -1.9, -2.4, -1.7, -2.0, 1.8, 2.2, 2.05, 1.6, 2.4],
        )
    }

    fn initial_resp(n: usize, k: usize) -> Responsibilities {
        let raw = DMatrix::from_fn(n, k, |i, j| 1.0 + ((i * 7 + j * 3) % 5) as f64);
        let sums = raw.column_sum();
        Responsibilities::from_resp(DMatrix::from_fn(n, k, |i, j| raw[(i, j)] / sums[i]))
    }

    /// Run the coordinate-ascent loop by hand and collect the bound after
    /// every M-step.
    fn trace(param: Parameterization, mode: WeightMode, iters: usize) -> Vec<f64> {
        let x = data_1d();
        let k = 3;
        let prior = PriorHyperparams::new(
            vec![0.5; k],
            1.0,
            DVector::from_vec(vec![0.0]),
            DMatrix::from_element(1, 1, 4.0),
            1.0,
        )
        .unwrap();
        let reg = Regularization::default();
        let mut posterior = Posterior::from_prior(&prior, param, mode).unwrap();
        let mut exps = compute_expectations(&posterior, reg.count_floor());
        let mut resp = initial_resp(x.nrows(), k);
        let mut out = Vec::new();
        for it in 0..iters {
            if it > 0 {
                resp = e_step(&x, &exps, param, FLOOR).unwrap();
            }
            let stats = compute_statistics(&x, &resp.resp, &reg).unwrap();
            posterior = update_posterior(&prior, &stats, &exps, param, mode, FLOOR).unwrap();
            exps = compute_expectations(&posterior, reg.count_floor());
            out.push(compute_elbo(&prior, &posterior, &exps, &stats, &resp).total());
        }
        out
    }

    fn assert_non_decreasing(values: &[f64]) {
        for w in values.windows(2) {
            let tol = 1e-9 * w[0].abs().max(1.0);
            assert!(w[1] >= w[0] - tol, "bound decreased: {} -> {}", w[0], w[1]);
        }
    }

    #[test]
    fn joint_bound_is_monotone() {
        let t = trace(Parameterization::GaussianWishart, WeightMode::Dirichlet, 40);
        assert!(t.iter().all(|v| v.is_finite()));
        assert_non_decreasing(&t);
    }

    #[test]
    fn factorized_bound_is_monotone() {
        let t = trace(
            Parameterization::CorduneanuBishop,
            WeightMode::PointEstimate,
            40,
        );
        assert!(t.iter().all(|v| v.is_finite()));
        assert_non_decreasing(&t);
    }

    #[test]
    fn factorized_with_dirichlet_is_monotone() {
        let t = trace(Parameterization::CorduneanuBishop, WeightMode::Dirichlet, 40);
        assert_non_decreasing(&t);
    }

    #[test]
    fn bound_improves_from_start() {
        let t = trace(Parameterization::GaussianWishart, WeightMode::Dirichlet, 20);
        assert!(t[t.len() - 1] > t[0]);
    }

    #[test]
    fn assignment_term_is_entropy() {
        let x = data_1d();
        let prior = PriorHyperparams::new(
            vec![1.0; 2],
            1.0,
            DVector::from_vec(vec![0.0]),
            DMatrix::from_element(1, 1, 1.0),
            1.0,
        )
        .unwrap();
        let reg = Regularization::default();
        let resp = Responsibilities::from_resp(DMatrix::from_element(10, 2, 0.5));
        let post =
            Posterior::from_prior(&prior, Parameterization::GaussianWishart, WeightMode::Dirichlet)
                .unwrap();
        let exps = compute_expectations(&post, reg.count_floor());
        let stats = compute_statistics(&x, &resp.resp, &reg).unwrap();
        let terms = compute_elbo(&prior, &post, &exps, &stats, &resp);
        assert!((terms.assignments - 10.0 * 2f64.ln()).abs() < 1e-12);
        let sum = terms.data
            + terms.weights
            + terms.assignments
            + terms.mean_precision_prior
            + terms.mean_precision_entropy;
        assert_eq!(terms.total(), sum);
    }

    #[test]
    fn prior_posterior_has_zero_divergence() {
        // With q equal to the prior, E[ln p(π)] - E[ln q(π)] and
        // E[ln p(μ,T)] - E[ln q(μ,T)] both vanish.
        let x = data_1d();
        let prior = PriorHyperparams::new(
            vec![0.7, 1.3],
            2.0,
            DVector::from_vec(vec![0.5]),
            DMatrix::from_element(1, 1, 3.0),
            2.5,
        )
        .unwrap();
        let reg = Regularization::default();
        // All-zero statistics contribute nothing to the weight term.
        let resp = Responsibilities::from_resp(DMatrix::from_element(10, 2, 0.5));
        let mut stats = compute_statistics(&x, &resp.resp, &reg).unwrap();
        for s in &mut stats.components {
            s.count = 0.0;
        }
        for param in [
            Parameterization::GaussianWishart,
            Parameterization::CorduneanuBishop,
        ] {
            let post = Posterior::from_prior(&prior, param, WeightMode::Dirichlet).unwrap();
            let exps = compute_expectations(&post, reg.count_floor());
            let terms = compute_elbo(&prior, &post, &exps, &stats, &resp);
            assert!(terms.weights.abs() < 1e-10, "{:?}", terms);
            assert!(
                (terms.mean_precision_prior + terms.mean_precision_entropy).abs() < 1e-10,
                "{:?}",
                terms
            );
        }
    }
}
