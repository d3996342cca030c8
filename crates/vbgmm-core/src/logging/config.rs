//! Logging configuration.
//!
//! Supports configuration via:
//! - Environment variables (VBGMM_LOG, RUST_LOG, VBGMM_LOG_FORMAT)
//! - CLI flags (--log-level, --log-format)

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console format (default).
    #[default]
    Human,
    /// Machine-parseable JSON lines.
    Jsonl,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    /// Standard operational info (default).
    #[default]
    Info,
    Warn,
    Error,
    /// Completely silent.
    Off,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        match lower.as_str() {
            "warning" => Ok(LogLevel::Warn),
            "none" | "quiet" => Ok(LogLevel::Off),
            _ => [
                LogLevel::Trace,
                LogLevel::Debug,
                LogLevel::Info,
                LogLevel::Warn,
                LogLevel::Error,
                LogLevel::Off,
            ]
            .into_iter()
            .find(|l| l.as_str() == lower)
            .ok_or_else(|| format!("unknown log level: {}", s)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Whether to include timestamps in human output.
    pub timestamps: bool,
    /// Raw RUST_LOG directive, used verbatim as the filter when VBGMM_LOG is unset.
    pub directive: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
            directive: None,
        }
    }
}

impl LogConfig {
    /// Create config from environment and CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        let vbgmm_log = std::env::var("VBGMM_LOG").ok();
        let rust_log = std::env::var("RUST_LOG").ok();
        let format = std::env::var("VBGMM_LOG_FORMAT").ok();
        Self::from_sources(
            vbgmm_log.as_deref(),
            rust_log.as_deref(),
            format.as_deref(),
            cli_level,
            cli_format,
        )
    }

    /// Resolve from explicit values. Precedence: CLI > VBGMM_LOG > RUST_LOG.
    pub fn from_sources(
        vbgmm_log: Option<&str>,
        rust_log: Option<&str>,
        format: Option<&str>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let mut config = LogConfig::default();

        if let Some(level) = vbgmm_log.and_then(|v| v.parse::<LogLevel>().ok()) {
            config.level = level;
        } else if let Some(val) = rust_log.filter(|v| !v.trim().is_empty()) {
            config.directive = Some(val.to_string());
        }

        if let Some(fmt) = format.and_then(|v| v.parse::<LogFormat>().ok()) {
            config.format = fmt;
        }

        if let Some(level) = cli_level {
            config.level = level;
            config.directive = None;
        }
        if let Some(format) = cli_format {
            config.format = format;
        }

        config
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self.directive = None;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Filter directive handed to `EnvFilter`. The `vbgmm` prefix covers
    /// every workspace crate and the `vbgmm.observer` target.
    pub fn filter_directive(&self) -> String {
        match &self.directive {
            Some(d) => d.clone(),
            None => format!("vbgmm={}", self.level),
        }
    }
}
