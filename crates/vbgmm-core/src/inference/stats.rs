//! Responsibility-weighted sufficient statistics (the M-step inputs).

use nalgebra::{DMatrix, DVector};
use vbgmm_config::Regularization;
use vbgmm_math::math::linalg::{add_to_diagonal, symmetrize};

use crate::error::{FitError, FitResult};

/// Count, mean and scatter of the data under one component's responsibilities.
#[derive(Debug, Clone)]
pub struct ComponentStats {
    /// Σ_n r_nk before the floor.
    pub raw_count: f64,
    /// N_k = raw_count + count floor. Always positive.
    pub count: f64,
    /// x̄_k = Σ_n r_nk x_n / N_k.
    pub mean: DVector<f64>,
    /// S_k = Σ_n r_nk (x_n - x̄_k)(x_n - x̄_k)ᵀ / N_k + floor · I.
    pub scatter: DMatrix<f64>,
}

/// Statistics for all components.
#[derive(Debug, Clone)]
pub struct SufficientStatistics {
    pub components: Vec<ComponentStats>,
}

impl SufficientStatistics {
    pub fn counts(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.count).collect()
    }

    pub fn raw_counts(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.raw_count).collect()
    }

    /// Σ_k raw N_k, which equals N when responsibility rows sum to one.
    pub fn total_raw_count(&self) -> f64 {
        self.components.iter().map(|c| c.raw_count).sum()
    }
}

/// Compute the statistics of `x` (N×D) under responsibilities `resp` (N×K).
pub fn compute_statistics(
    x: &DMatrix<f64>,
    resp: &DMatrix<f64>,
    regularization: &Regularization,
) -> FitResult<SufficientStatistics> {
    if x.nrows() != resp.nrows() {
        return Err(FitError::DimensionMismatch {
            what: "responsibility rows",
            expected: x.nrows(),
            actual: resp.nrows(),
        });
    }
    let count_floor = regularization.count_floor();
    let d = x.ncols();

    let components = resp
        .column_iter()
        .map(|r| {
            let raw_count = r.sum();
            let count = raw_count + count_floor;
            let mean = x.tr_mul(&r) / count;

            let mut scatter = DMatrix::zeros(d, d);
            for (n, row) in x.row_iter().enumerate() {
                if r[n] == 0.0 {
                    continue;
                }
                let diff = row.transpose() - &mean;
                scatter.ger(r[n], &diff, &diff, 1.0);
            }
            scatter /= count;
            symmetrize(&mut scatter);
            add_to_diagonal(&mut scatter, regularization.covariance_floor);

            ComponentStats {
                raw_count,
                count,
                mean,
                scatter,
            }
        })
        .collect();

    Ok(SufficientStatistics { components })
}
