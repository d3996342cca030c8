//! Serializable fit summaries and their human rendering.

use std::fmt::Write as _;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use vbgmm_config::ConfigSnapshot;

use crate::data::Standardization;
use crate::error::FitWarning;
use crate::inference::fit::{FitReport, FitState, FittedParams};

/// Output schema version for `vbgmm fit` payloads.
pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

/// Supported output formats for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structured JSON (default)
    #[default]
    Json,

    /// Short human-readable report
    Summary,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Summary => write!(f, "summary"),
        }
    }
}

/// Payload printed by `vbgmm fit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub schema_version: String,
    pub run_id: String,
    pub state: FitState,
    pub iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_elbo: Option<f64>,
    /// Components whose weight exceeds 1 / (2K).
    pub effective_components: usize,
    pub params: FittedParams,
    pub elbo_trace: Vec<f64>,
    pub warnings: Vec<FitWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<usize>>,
    /// Present when the data were standardized; fitted parameters are then in
    /// standardized units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standardization: Option<Standardization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSnapshot>,
}

impl FitSummary {
    pub fn from_report(report: &FitReport) -> Self {
        let k = report.params.k().max(1);
        Self {
            schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
            run_id: report.run_id.clone(),
            state: report.state,
            iterations: report.iterations,
            final_elbo: report.final_elbo(),
            effective_components: report.effective_components(1.0 / (2.0 * k as f64)),
            params: report.params.clone(),
            elbo_trace: report.elbo_trace.clone(),
            warnings: report.warnings.clone(),
            labels: None,
            standardization: None,
            config: None,
        }
    }

    pub fn with_labels(mut self, labels: Vec<usize>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_standardization(mut self, standardization: Standardization) -> Self {
        self.standardization = Some(standardization);
        self
    }

    pub fn with_config(mut self, snapshot: ConfigSnapshot) -> Self {
        self.config = Some(snapshot);
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Human report: one header line, then a line per component sorted by weight.
pub fn render_summary(summary: &FitSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} after {} iterations, ELBO {}",
        summary.run_id,
        summary.state,
        summary.iterations,
        summary
            .final_elbo
            .map(|e| format!("{:.4}", e))
            .unwrap_or_else(|| "n/a".to_string())
    );
    let _ = writeln!(
        out,
        "{} of {} components effective",
        summary.effective_components,
        summary.params.k()
    );

    let mut order: Vec<usize> = (0..summary.params.k()).collect();
    order.sort_by(|a, b| {
        summary.params.weights[*b]
            .partial_cmp(&summary.params.weights[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if summary.standardization.is_some() {
        let _ = writeln!(out, "(means and variances in original units)");
    }
    for k in order {
        let (mean, var) = component_moments(summary, k);
        let mean: Vec<String> = mean.iter().map(|v| format!("{:.3}", v)).collect();
        let var: Vec<String> = var.iter().map(|v| format!("{:.3}", v)).collect();
        let _ = writeln!(
            out,
            "  [{:>2}] weight {:.4}  mean [{}]  var [{}]",
            k,
            summary.params.weights[k],
            mean.join(", "),
            var.join(", ")
        );
    }

    if !summary.warnings.is_empty() {
        let _ = writeln!(out, "warnings:");
        for w in &summary.warnings {
            let _ = writeln!(out, "  - {}", w);
        }
    }
    out
}

/// Mean and marginal variances of component `k`, undoing standardization
/// when it was applied.
fn component_moments(summary: &FitSummary, k: usize) -> (Vec<f64>, Vec<f64>) {
    let mean = &summary.params.means[k];
    let var: Vec<f64> = summary.params.covariances[k]
        .iter()
        .enumerate()
        .map(|(i, row)| row[i])
        .collect();
    match &summary.standardization {
        Some(s) => (
            s.restore_point(mean),
            var.iter().zip(&s.std).map(|(v, sd)| v * sd * sd).collect(),
        ),
        None => (mean.clone(), var),
    }
}
