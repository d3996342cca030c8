//! Small dense linear algebra for symmetric positive-definite matrices.
//!
//! Determinants and inverses always go through a Cholesky factorization;
//! nothing here uses cofactor expansion or a general LU.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn, SymmetricEigen};
use thiserror::Error;

/// Number of escalating jitter attempts before giving up on a matrix.
const MAX_JITTER_STEPS: usize = 6;

/// Errors from SPD factorizations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinalgError {
    #[error("matrix is not square ({rows}x{cols})")]
    NonSquare { rows: usize, cols: usize },

    #[error("{dim}x{dim} matrix is not positive-definite")]
    NotPositiveDefinite { dim: usize },

    #[error("matrix contains non-finite entries")]
    NonFinite,
}

/// Cholesky factor of an SPD matrix with its log-determinant cached.
#[derive(Debug, Clone)]
pub struct SpdFactor {
    chol: Cholesky<f64, Dyn>,
    log_det: f64,
}

impl SpdFactor {
    /// Factor `m`. Only the lower triangle is read.
    pub fn new(m: &DMatrix<f64>) -> Result<Self, LinalgError> {
        if !m.is_square() {
            return Err(LinalgError::NonSquare {
                rows: m.nrows(),
                cols: m.ncols(),
            });
        }
        if m.iter().any(|v| !v.is_finite()) {
            return Err(LinalgError::NonFinite);
        }
        let chol = Cholesky::new(m.clone())
            .ok_or(LinalgError::NotPositiveDefinite { dim: m.nrows() })?;
        let log_det = 2.0 * chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum::<f64>();
        if !log_det.is_finite() {
            return Err(LinalgError::NotPositiveDefinite { dim: m.nrows() });
        }
        Ok(Self { chol, log_det })
    }

    pub fn dim(&self) -> usize {
        self.chol.l_dirty().nrows()
    }

    /// log |M|
    pub fn log_det(&self) -> f64 {
        self.log_det
    }

    /// M⁻¹, symmetrized against roundoff.
    pub fn inverse(&self) -> DMatrix<f64> {
        let mut inv = self.chol.inverse();
        symmetrize(&mut inv);
        inv
    }

    /// Solve M x = b.
    pub fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        self.chol.solve(b)
    }
}

/// Replace `m` with (m + mᵀ) / 2.
pub fn symmetrize(m: &mut DMatrix<f64>) {
    let n = m.nrows().min(m.ncols());
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (m[(i, j)] + m[(j, i)]);
            m[(i, j)] = avg;
            m[(j, i)] = avg;
        }
    }
}

/// Add `value` to every diagonal entry.
pub fn add_to_diagonal(m: &mut DMatrix<f64>, value: f64) {
    let n = m.nrows().min(m.ncols());
    for i in 0..n {
        m[(i, i)] += value;
    }
}

/// a bᵀ
pub fn outer(a: &DVector<f64>, b: &DVector<f64>) -> DMatrix<f64> {
    a * b.transpose()
}

/// tr(A B) without forming the product.
pub fn trace_of_product(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    debug_assert_eq!(a.ncols(), b.nrows());
    debug_assert_eq!(a.nrows(), b.ncols());
    let mut acc = 0.0;
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            acc += a[(i, j)] * b[(j, i)];
        }
    }
    acc
}

/// xᵀ A x
pub fn quadratic_form(a: &DMatrix<f64>, x: &DVector<f64>) -> f64 {
    (x.transpose() * a * x)[(0, 0)]
}

/// True when |m_ij - m_ji| ≤ tol · max(1, |m_ij|) for all entries.
pub fn is_symmetric(m: &DMatrix<f64>, tol: f64) -> bool {
    if !m.is_square() {
        return false;
    }
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let scale = m[(i, j)].abs().max(m[(j, i)].abs()).max(1.0);
            if (m[(i, j)] - m[(j, i)]).abs() > tol * scale {
                return false;
            }
        }
    }
    true
}

/// Smallest eigenvalue of a symmetric matrix.
pub fn min_eigenvalue(m: &DMatrix<f64>) -> f64 {
    SymmetricEigen::new(m.clone())
        .eigenvalues
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min)
}

/// Symmetrize `m` and factor it, adding escalating diagonal jitter
/// (`floor`, `10·floor`, ...) if the plain factorization fails.
///
/// Returns the (possibly jittered) matrix together with its factor.
pub fn regularize_spd(
    mut m: DMatrix<f64>,
    floor: f64,
) -> Result<(DMatrix<f64>, SpdFactor), LinalgError> {
    symmetrize(&mut m);
    match SpdFactor::new(&m) {
        Ok(factor) => return Ok((m, factor)),
        Err(LinalgError::NotPositiveDefinite { .. }) => {}
        Err(err) => return Err(err),
    }

    let mut jitter = floor;
    for _ in 0..MAX_JITTER_STEPS {
        let mut candidate = m.clone();
        add_to_diagonal(&mut candidate, jitter);
        if let Ok(factor) = SpdFactor::new(&candidate) {
            return Ok((candidate, factor));
        }
        jitter *= 10.0;
    }
    Err(LinalgError::NotPositiveDefinite { dim: m.nrows() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn spd_2x2() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0])
    }

    #[test]
    fn log_det_matches_closed_form() {
        let f = SpdFactor::new(&spd_2x2()).unwrap();
        assert!(approx_eq(f.log_det(), 11.0f64.ln(), 1e-12));
        assert_eq!(f.dim(), 2);
    }

    #[test]
    fn inverse_is_inverse() {
        let m = spd_2x2();
        let inv = SpdFactor::new(&m).unwrap().inverse();
        let id = &m * &inv;
        assert!(approx_eq(id[(0, 0)], 1.0, 1e-12));
        assert!(approx_eq(id[(0, 1)], 0.0, 1e-12));
        assert!(approx_eq(id[(1, 1)], 1.0, 1e-12));
        assert!(is_symmetric(&inv, 0.0));
    }

    #[test]
    fn solve_matches_inverse() {
        let m = spd_2x2();
        let f = SpdFactor::new(&m).unwrap();
        let b = DVector::from_vec(vec![1.0, -2.0]);
        let x = f.solve(&b);
        let x2 = f.inverse() * &b;
        assert!(approx_eq(x[0], x2[0], 1e-12));
        assert!(approx_eq(x[1], x2[1], 1e-12));
    }

    #[test]
    fn rejects_indefinite_and_non_square() {
        let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert_eq!(
            SpdFactor::new(&indefinite).unwrap_err(),
            LinalgError::NotPositiveDefinite { dim: 2 }
        );
        let rect = DMatrix::<f64>::zeros(2, 3);
        assert!(matches!(
            SpdFactor::new(&rect),
            Err(LinalgError::NonSquare { rows: 2, cols: 3 })
        ));
        let mut nan = spd_2x2();
        nan[(0, 0)] = f64::NAN;
        assert_eq!(SpdFactor::new(&nan).unwrap_err(), LinalgError::NonFinite);
    }

    #[test]
    fn trace_and_quadratic_form() {
        let a = spd_2x2();
        let b = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        assert!(approx_eq(trace_of_product(&a, &b), (&a * &b).trace(), 1e-12));
        let x = DVector::from_vec(vec![1.0, 2.0]);
        // 4 + 2*1*2 + 3*4 = 20
        assert!(approx_eq(quadratic_form(&a, &x), 20.0, 1e-12));
    }

    #[test]
    fn outer_product_shape() {
        let a = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let b = DVector::from_vec(vec![4.0, 5.0]);
        let o = outer(&a, &b);
        assert_eq!(o.shape(), (3, 2));
        assert!(approx_eq(o[(2, 1)], 15.0, 0.0));
    }

    #[test]
    fn regularize_repairs_singular_matrix() {
        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let (fixed, factor) = regularize_spd(singular, 1e-6).unwrap();
        assert!(min_eigenvalue(&fixed) > 0.0);
        assert!(factor.log_det().is_finite());
    }

    #[test]
    fn regularize_leaves_spd_untouched() {
        let m = spd_2x2();
        let (same, _) = regularize_spd(m.clone(), 1e-6).unwrap();
        assert_eq!(same, m);
    }

    #[test]
    fn regularize_gives_up_on_strongly_negative() {
        let m = DMatrix::from_row_slice(1, 1, &[-1.0]);
        assert!(regularize_spd(m, 1e-9).is_err());
    }

    #[test]
    fn min_eigenvalue_of_diagonal() {
        let m = DMatrix::from_diagonal(&DVector::from_vec(vec![3.0, 0.5, 2.0]));
        assert!(approx_eq(min_eigenvalue(&m), 0.5, 1e-12));
    }
}
