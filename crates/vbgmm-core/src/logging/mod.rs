//! Structured logging for fits and the CLI.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for pipelines
//!
//! stdout is reserved for command payloads; all log output goes to stderr.

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

/// Event names used as the `event` field on fit log records.
pub mod event_names {
    pub const FIT_STARTED: &str = "fit.started";
    pub const FIT_INITIALIZED: &str = "fit.initialized";
    pub const FIT_ITERATION: &str = "fit.iteration";
    pub const FIT_ELBO_DECREASE: &str = "fit.elbo_decrease";
    pub const FIT_EMPTY_COMPONENT: &str = "fit.empty_component";
    pub const FIT_FINISHED: &str = "fit.finished";
    pub const FIT_FAILED: &str = "fit.failed";
}

/// Initialize the logging subsystem.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(config: &LogConfig) {
    // A malformed RUST_LOG falls back to a global level filter.
    let filter = EnvFilter::try_new(config.filter_directive()).unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from(config.level).into())
    });

    let result = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => {
            let json_layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init()
        }
    };

    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    // Shorten to first 12 hex chars for readability
    format!("run-{}", &uuid.simple().to_string()[..12])
}
