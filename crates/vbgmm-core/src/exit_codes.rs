//! Exit codes for the vbgmm CLI.
//!
//! Exit codes communicate the outcome of a fit without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-1: Fit completed (with or without warnings)
//! - 10-19: User/input errors (recoverable by user action)
//! - 20-29: Numerical and internal errors

/// Exit codes for vbgmm operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Completed (0-1)
    // ========================================================================
    /// Success: fit completed with no warnings
    Clean = 0,

    /// Fit completed but collected warnings (empty components, ELBO decreases)
    FitWarnings = 1,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Config file missing, unparsable, or semantically invalid
    ConfigError = 11,

    /// Data file unparsable or unusable (ragged rows, non-finite values, too few rows)
    DataError = 12,

    // ========================================================================
    // Numerical / Internal Errors (20-29)
    // ========================================================================
    /// A scale matrix stayed singular after regularization, or values went non-finite
    NumericalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if the fit completed (codes 0-1).
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::FitWarnings)
    }

    /// Check if this exit code is a user/input error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code is a numerical or internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::FitWarnings => "OK_WARNINGS",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::DataError => "ERR_DATA",
            ExitCode::NumericalError => "ERR_NUMERICAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
