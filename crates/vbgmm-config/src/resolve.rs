//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG paths → defaults.

use std::path::{Path, PathBuf};

/// Discovered fit configuration file.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfigPath {
    /// Path to the config file (None means built-in defaults).
    pub path: Option<PathBuf>,

    /// Where the path came from (for diagnostics).
    pub source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "VBGMM_CONFIG";
pub const ENV_CONFIG_DIR: &str = "VBGMM_CONFIG_DIR";

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "fit.toml";

/// Application name for XDG directories.
const APP_NAME: &str = "vbgmm";

/// Resolve the fit configuration path.
///
/// Resolution order:
/// 1. Explicit CLI path (returned even if missing so the loader can report it)
/// 2. VBGMM_CONFIG environment variable
/// 3. VBGMM_CONFIG_DIR environment variable + fit.toml
/// 4. XDG config directory (~/.config/vbgmm/fit.toml)
/// 5. Built-in defaults (None)
pub fn resolve_config(cli_path: Option<&Path>) -> ResolvedConfigPath {
    // 1. CLI argument
    if let Some(path) = cli_path {
        return ResolvedConfigPath {
            path: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    // 2. Environment variable (direct path)
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return ResolvedConfigPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    // 3. Environment variable (config dir)
    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(CONFIG_FILENAME);
        if path.exists() {
            return ResolvedConfigPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    // 4. XDG config directory
    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            return ResolvedConfigPath {
                path: Some(path),
                source: ConfigSource::XdgConfig,
            };
        }
    }

    // 5. Built-in default
    ResolvedConfigPath::default()
}

/// Get the XDG config directory for vbgmm.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// True when the file should be parsed as JSON rather than TOML.
pub fn is_json_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(format!("{}", ConfigSource::XdgConfig), "XDG config");
        assert_eq!(
            format!("{}", ConfigSource::BuiltinDefault),
            "builtin default"
        );
    }

    #[test]
    fn test_cli_path_wins_even_when_missing() {
        let resolved = resolve_config(Some(Path::new("/nonexistent/fit.toml")));
        assert_eq!(resolved.source, ConfigSource::CliArgument);
        assert_eq!(
            resolved.path.as_deref(),
            Some(Path::new("/nonexistent/fit.toml"))
        );
    }

    #[test]
    fn test_json_detection() {
        assert!(is_json_path(Path::new("a/fit.json")));
        assert!(is_json_path(Path::new("FIT.JSON")));
        assert!(!is_json_path(Path::new("fit.toml")));
        assert!(!is_json_path(Path::new("fit")));
    }

    #[test]
    fn test_xdg_dir_ends_with_app_name() {
        if let Some(dir) = xdg_config_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
    }
}
