//! Configuration resolution + validation tests against real files on disk.
//!
//! Covers:
//! - Resolution order (CLI > VBGMM_CONFIG > VBGMM_CONFIG_DIR > defaults)
//! - TOML and JSON parsing of FitConfig
//! - Validation of parsed configs

use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use tempfile::TempDir;
use vbgmm_config::resolve::{is_json_path, resolve_config, ConfigSource, ENV_CONFIG_DIR, ENV_CONFIG_PATH};
use vbgmm_config::{
    validate_config, validate_priors_for_dimension, Concentration, ConfigSnapshot, FitConfig,
    InitMethod, Parameterization, ValidationError, WeightMode,
};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (idx, key) in self.keys.iter().enumerate() {
            match self.saved.get(idx).and_then(|v| v.as_ref()) {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env lock poisoned");
    f()
}

const SAMPLE_TOML: &str = r#"
components = 10
init = "kmeans"
seed = 7
max_iter = 50
parameterization = "corduneanu_bishop"

[regularization]
covariance_floor = 1e-5

[priors]
alpha0 = 0.1
beta0 = 2.0
nu0 = 3.0
inv_w0 = [[1.0, 0.0], [0.0, 1.0]]
"#;

fn parse_file(path: &Path) -> FitConfig {
    let content = fs::read_to_string(path).expect("read config");
    if is_json_path(path) {
        serde_json::from_str(&content).expect("parse json config")
    } else {
        toml::from_str(&content).expect("parse toml config")
    }
}

#[test]
fn toml_config_parses_and_validates() {
    let cfg: FitConfig = toml::from_str(SAMPLE_TOML).expect("parse");
    assert_eq!(cfg.components, 10);
    assert_eq!(cfg.init, InitMethod::Kmeans);
    assert_eq!(cfg.seed, 7);
    assert_eq!(cfg.parameterization, Parameterization::CorduneanuBishop);
    assert_eq!(cfg.weight_mode(), WeightMode::PointEstimate);
    assert_eq!(cfg.regularization.covariance_floor, 1e-5);
    assert_eq!(cfg.regularization.count_floor_eps, 10.0);
    assert_eq!(cfg.priors.alpha0, Some(Concentration::Symmetric(0.1)));
    validate_config(&cfg).expect("valid config");
    validate_priors_for_dimension(&cfg.priors, 2).expect("valid for D=2");
    assert!(validate_priors_for_dimension(&cfg.priors, 4).is_err());
}

#[test]
fn json_config_parses() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("fit.json");
    fs::write(
        &path,
        r#"{"components": 4, "tol": 1e-6, "priors": {"alpha0": [1, 2, 3, 4]}}"#,
    )
    .expect("write");
    let cfg = parse_file(&path);
    assert_eq!(cfg.components, 4);
    assert_eq!(cfg.tol, Some(1e-6));
    validate_config(&cfg).expect("valid config");
}

#[test]
fn invalid_file_values_are_reported() {
    let cfg: FitConfig = toml::from_str("components = 3\n[priors]\nalpha0 = [1.0, 1.0]\n")
        .expect("parse");
    match validate_config(&cfg) {
        Err(ValidationError::DimensionMismatch {
            field,
            expected,
            actual,
        }) => {
            assert_eq!(field, "priors.alpha0");
            assert_eq!(expected, 3);
            assert_eq!(actual, 2);
        }
        other => panic!("expected dimension mismatch, got {:?}", other),
    }
}

#[test]
fn resolution_prefers_cli_then_env_then_dir() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let dir = TempDir::new().expect("tempdir");

        let dir_file = dir.path().join("fit.toml");
        fs::write(&dir_file, "components = 2\n").expect("write dir file");
        let env_file = dir.path().join("env.toml");
        fs::write(&env_file, "components = 3\n").expect("write env file");
        let cli_file = dir.path().join("cli.json");
        fs::write(&cli_file, r#"{"components": 4}"#).expect("write cli file");

        env::set_var(ENV_CONFIG_DIR, dir.path());
        env::remove_var(ENV_CONFIG_PATH);
        let resolved = resolve_config(None);
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(resolved.path.as_deref(), Some(dir_file.as_path()));
        assert_eq!(parse_file(&dir_file).components, 2);

        env::set_var(ENV_CONFIG_PATH, &env_file);
        let resolved = resolve_config(None);
        assert_eq!(resolved.path.as_deref(), Some(env_file.as_path()));

        let resolved = resolve_config(Some(&cli_file));
        assert_eq!(resolved.source, ConfigSource::CliArgument);
        let cfg = parse_file(resolved.path.as_deref().expect("path"));
        assert_eq!(cfg.components, 4);
    });
}

#[test]
fn missing_env_path_falls_through() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let dir = TempDir::new().expect("tempdir");
        env::set_var(ENV_CONFIG_PATH, dir.path().join("missing.toml"));
        env::set_var(ENV_CONFIG_DIR, dir.path());
        let resolved = resolve_config(None);
        assert_ne!(resolved.source, ConfigSource::CliArgument);
        assert_ne!(resolved.source, ConfigSource::Environment);
    });
}

#[test]
fn snapshot_tracks_effective_config() {
    let a: FitConfig = toml::from_str(SAMPLE_TOML).expect("parse");
    let b: FitConfig = toml::from_str(SAMPLE_TOML).expect("parse");
    let resolved = resolve_config(Some(Path::new("fit.toml")));
    let sa = ConfigSnapshot::new(&a, &resolved);
    let sb = ConfigSnapshot::new(&b, &resolved);
    assert!(sa.matches(&sb));
    assert_eq!(sa.config_source, "CLI argument");
    assert_eq!(sa.summary.parameterization, "corduneanu_bishop");
    assert!(!sa.summary.data_derived_priors);
    assert!(!sa.matches(&ConfigSnapshot::defaults_only()));
}
