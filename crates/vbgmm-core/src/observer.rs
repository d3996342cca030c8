//! Read-only hooks into a running fit.
//!
//! Observers see a snapshot of the state after an iteration. They cannot
//! mutate inference state, and an observer that fails (for example a closed
//! pipe) never aborts the fit.

use std::io::{self, Write};

use nalgebra::DMatrix;
use serde::Serialize;

use crate::inference::fit::FittedParams;
use crate::inference::posterior::Posterior;
use crate::inference::responsibility::Responsibilities;

/// State handed to observers.
#[derive(Debug, Clone, Copy)]
pub struct IterationSnapshot<'a> {
    /// 1-based iteration count; 0 for the state right after initialization.
    pub iteration: usize,
    pub elbo: Option<f64>,
    pub params: &'a FittedParams,
    pub posterior: &'a Posterior,
    pub responsibilities: &'a Responsibilities,
    pub data: &'a DMatrix<f64>,
    /// Set on the single snapshot delivered after the loop terminates.
    pub is_final: bool,
}

pub trait FitObserver {
    fn on_iteration(&mut self, snapshot: &IterationSnapshot<'_>);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FitObserver for NoopObserver {
    fn on_iteration(&mut self, _snapshot: &IterationSnapshot<'_>) {}
}

/// Logs the fitted parameters at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl FitObserver for TracingObserver {
    fn on_iteration(&mut self, snapshot: &IterationSnapshot<'_>) {
        tracing::debug!(
            target: "vbgmm.observer",
            iteration = snapshot.iteration,
            elbo = ?snapshot.elbo,
            is_final = snapshot.is_final,
            weights = ?snapshot.params.weights,
            "fit snapshot"
        );
    }
}

#[derive(Serialize)]
struct TraceRecord<'a> {
    iteration: usize,
    elbo: Option<f64>,
    #[serde(rename = "final")]
    is_final: bool,
    weights: &'a [f64],
    means: &'a [Vec<f64>],
    covariances: &'a [Vec<Vec<f64>>],
}

/// Writes one JSON object per snapshot, for external plotting.
///
/// The first write error is kept and later snapshots are dropped.
#[derive(Debug)]
pub struct JsonlObserver<W: Write> {
    writer: W,
    error: Option<io::Error>,
    written: usize,
}

impl<W: Write> JsonlObserver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
            written: 0,
        }
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    fn write_record(&mut self, snapshot: &IterationSnapshot<'_>) -> io::Result<()> {
        let record = TraceRecord {
            iteration: snapshot.iteration,
            elbo: snapshot.elbo,
            is_final: snapshot.is_final,
            weights: &snapshot.params.weights,
            means: &snapshot.params.means,
            covariances: &snapshot.params.covariances,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        if snapshot.is_final {
            self.writer.flush()?;
        }
        Ok(())
    }

    /// Flush and return the writer, or the first error encountered.
    pub fn into_inner(mut self) -> io::Result<W> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> FitObserver for JsonlObserver<W> {
    fn on_iteration(&mut self, snapshot: &IterationSnapshot<'_>) {
        if self.error.is_some() {
            return;
        }
        match self.write_record(snapshot) {
            Ok(()) => self.written += 1,
            Err(err) => {
                tracing::warn!(error = %err, "trace output failed; further snapshots dropped");
                self.error = Some(err);
            }
        }
    }
}
