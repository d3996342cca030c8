//! Initial responsibilities.
//!
//! The first M-step needs an N×K responsibility matrix. Both strategies are
//! driven by a seeded [`StdRng`] so a fixed seed reproduces a fit exactly.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vbgmm_config::InitMethod;

use crate::error::{FitError, FitResult};

/// Produces initial responsibilities (rows sum to one).
pub trait Initializer {
    fn initialize(&self, x: &DMatrix<f64>, k: usize, rng: &mut StdRng) -> FitResult<DMatrix<f64>>;

    fn name(&self) -> &'static str;
}

/// Independent uniform draws per entry, each row normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomInit;

impl Initializer for RandomInit {
    fn initialize(&self, x: &DMatrix<f64>, k: usize, rng: &mut StdRng) -> FitResult<DMatrix<f64>> {
        check_shape(x, k)?;
        // 1 - U[0, 1) lies in (0, 1], so no row can sum to zero.
        let mut resp = DMatrix::from_fn(x.nrows(), k, |_, _| 1.0 - rng.random::<f64>());
        for mut row in resp.row_iter_mut() {
            let total = row.sum();
            row.iter_mut().for_each(|v| *v /= total);
        }
        Ok(resp)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// One-hot responsibilities from Lloyd's k-means with k-means++ seeding.
#[derive(Debug, Clone, Copy)]
pub struct KMeansInit {
    pub max_iter: usize,
}

impl Default for KMeansInit {
    fn default() -> Self {
        Self { max_iter: 100 }
    }
}

impl Initializer for KMeansInit {
    fn initialize(&self, x: &DMatrix<f64>, k: usize, rng: &mut StdRng) -> FitResult<DMatrix<f64>> {
        check_shape(x, k)?;
        let points: Vec<DVector<f64>> = x.row_iter().map(|r| r.transpose()).collect();
        let mut centers = seed_centers(&points, k, rng);

        let mut labels = assign(&points, &centers);
        for _ in 0..self.max_iter {
            recompute_centers(&points, &labels, &mut centers);
            let next = assign(&points, &centers);
            if next == labels {
                break;
            }
            labels = next;
        }

        let mut resp = DMatrix::zeros(points.len(), k);
        for (n, &label) in labels.iter().enumerate() {
            resp[(n, label)] = 1.0;
        }
        Ok(resp)
    }

    fn name(&self) -> &'static str {
        "kmeans"
    }
}

fn check_shape(x: &DMatrix<f64>, k: usize) -> FitResult<()> {
    if k == 0 {
        return Err(FitError::Initialization("need at least one component".into()));
    }
    if x.nrows() == 0 {
        return Err(FitError::Initialization("no samples to initialize from".into()));
    }
    Ok(())
}

/// k-means++: first center uniform, then each next center drawn with
/// probability proportional to its squared distance from the nearest
/// existing center. Falls back to a uniform draw once every point
/// coincides with a center.
fn seed_centers(points: &[DVector<f64>], k: usize, rng: &mut StdRng) -> Vec<DVector<f64>> {
    let n = points.len();
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.random_range(0..n)].clone());

    let mut nearest: Vec<f64> = points
        .iter()
        .map(|p| (p - &centers[0]).norm_squared())
        .collect();

    while centers.len() < k {
        let total: f64 = nearest.iter().sum();
        let idx = if total > 0.0 && total.is_finite() {
            let target = rng.random::<f64>() * total;
            let mut cumsum = 0.0;
            let mut chosen = n - 1;
            for (i, d) in nearest.iter().enumerate() {
                cumsum += d;
                if cumsum > target {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            rng.random_range(0..n)
        };
        let center = points[idx].clone();
        for (d, p) in nearest.iter_mut().zip(points) {
            *d = d.min((p - &center).norm_squared());
        }
        centers.push(center);
    }
    centers
}

fn assign(points: &[DVector<f64>], centers: &[DVector<f64>]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            centers
                .iter()
                .enumerate()
                .map(|(j, c)| (j, (p - c).norm_squared()))
                .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
                .0
        })
        .collect()
}

/// Move each center to the mean of its points; empty clusters keep their center.
fn recompute_centers(points: &[DVector<f64>], labels: &[usize], centers: &mut [DVector<f64>]) {
    let d = centers.first().map(|c| c.len()).unwrap_or(0);
    let mut sums = vec![DVector::zeros(d); centers.len()];
    let mut counts = vec![0usize; centers.len()];
    for (p, &label) in points.iter().zip(labels) {
        sums[label] += p;
        counts[label] += 1;
    }
    for ((center, sum), count) in centers.iter_mut().zip(sums).zip(counts) {
        if count > 0 {
            *center = sum / count as f64;
        }
    }
}

pub fn initializer_for(method: InitMethod) -> Box<dyn Initializer> {
    match method {
        InitMethod::Random => Box::new(RandomInit),
        InitMethod::Kmeans => Box::new(KMeansInit::default()),
    }
}

/// Initial responsibilities for `x` using a fresh generator seeded with `seed`.
pub fn initialize(
    x: &DMatrix<f64>,
    k: usize,
    method: InitMethod,
    seed: u64,
) -> FitResult<DMatrix<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    initializer_for(method).initialize(x, k, &mut rng)
}
