//! Matrix loading, standardization and the reference dataset.
//!
//! Input files hold one observation per line with values separated by
//! whitespace or commas. Blank lines and lines starting with `#` are skipped.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("line {line}: expected {expected} values, found {actual}")]
    Ragged {
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("no observations found")]
    Empty,
}

/// Parse a matrix from text.
pub fn parse_matrix(text: &str) -> Result<DMatrix<f64>, DataError> {
    let mut values = Vec::new();
    let mut width = None;
    let mut rows = 0;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let before = values.len();
        for token in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let v: f64 = token.parse().map_err(|_| DataError::Parse {
                line: line_no,
                message: format!("invalid number '{}'", token),
            })?;
            values.push(v);
        }
        let count = values.len() - before;
        match width {
            None => width = Some(count),
            Some(w) if w != count => {
                return Err(DataError::Ragged {
                    line: line_no,
                    expected: w,
                    actual: count,
                })
            }
            Some(_) => {}
        }
        rows += 1;
    }

    match width {
        Some(w) if rows > 0 && w > 0 => Ok(DMatrix::from_row_slice(rows, w, &values)),
        _ => Err(DataError::Empty),
    }
}

pub fn load_matrix(path: &Path) -> Result<DMatrix<f64>, DataError> {
    let text = std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_matrix(&text)
}

/// Render rows as whitespace-separated text, optionally followed by a label
/// column.
pub fn format_matrix(x: &DMatrix<f64>, labels: Option<&[usize]>) -> String {
    let mut out = String::new();
    for (i, row) in x.row_iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|v| format!("{}", v)).collect();
        out.push_str(&cells.join(" "));
        if let Some(l) = labels.and_then(|l| l.get(i)) {
            let _ = write!(out, " {}", l);
        }
        out.push('\n');
    }
    out
}

/// Per-column shift and scale applied by [`standardize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardization {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Standardization {
    /// Map standardized coordinates back to the original units.
    pub fn restore_point(&self, z: &[f64]) -> Vec<f64> {
        z.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(v, (m, s))| v * s + m)
            .collect()
    }

    pub fn apply_point(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

/// Z-score each column with the population standard deviation. Constant
/// columns are centered but not scaled.
pub fn standardize(x: &DMatrix<f64>) -> (DMatrix<f64>, Standardization) {
    let n = x.nrows().max(1) as f64;
    let mean: Vec<f64> = x.column_iter().map(|c| c.sum() / n).collect();
    let std: Vec<f64> = x
        .column_iter()
        .zip(&mean)
        .map(|(c, m)| {
            let var = c.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let s = var.sqrt();
            if s > 0.0 && s.is_finite() {
                s
            } else {
                1.0
            }
        })
        .collect();
    let z = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| (x[(i, j)] - mean[j]) / std[j]);
    (z, Standardization { mean, std })
}

/// Generating means of the reference dataset.
pub const REFERENCE_MEANS: [[f64; 2]; 5] = [
    [0.0, 0.0],
    [3.0, -3.0],
    [3.0, 3.0],
    [-3.0, 3.0],
    [-3.0, -3.0],
];

/// Off-diagonal correlation of each reference cluster (unit variances).
pub const REFERENCE_CORRELATIONS: [f64; 5] = [0.0, 0.5, -0.5, 0.5, -0.5];

/// Draw the five-cluster 2-D reference dataset.
///
/// Returns the points (5 · `points_per_cluster` rows, clusters in order) and
/// the generating cluster of each row.
pub fn sample_reference_clusters(
    points_per_cluster: usize,
    seed: u64,
) -> (DMatrix<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = points_per_cluster * REFERENCE_MEANS.len();
    let mut values = Vec::with_capacity(n * 2);
    let mut labels = Vec::with_capacity(n);

    for (k, (mean, rho)) in REFERENCE_MEANS
        .iter()
        .zip(REFERENCE_CORRELATIONS)
        .enumerate()
    {
        // Cholesky factor of [[1, ρ], [ρ, 1]].
        let l21 = rho;
        let l22 = (1.0 - rho * rho).sqrt();
        for _ in 0..points_per_cluster {
            let z1: f64 = rng.sample(StandardNormal);
            let z2: f64 = rng.sample(StandardNormal);
            values.push(mean[0] + z1);
            values.push(mean[1] + l21 * z1 + l22 * z2);
            labels.push(k);
        }
    }
    (DMatrix::from_row_slice(n, 2, &values), labels)
}

/// Reference means as vectors.
pub fn reference_means() -> Vec<DVector<f64>> {
    REFERENCE_MEANS
        .iter()
        .map(|m| DVector::from_column_slice(m))
        .collect()
}
