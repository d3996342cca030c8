//! vbgmm - Variational Bayesian Gaussian mixture fitting
//!
//! The main entry point, handling:
//! - Fitting a mixture to a data file
//! - Drawing the reference five-cluster dataset
//! - Resolving and validating configuration

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use nalgebra::DMatrix;
use vbgmm_config::{InitMethod, Parameterization, WeightMode};
use vbgmm_core::config::{load_fit_config, ConfigError, LoadedConfig};
use vbgmm_core::data::{
    format_matrix, load_matrix, parse_matrix, sample_reference_clusters, standardize, DataError,
};
use vbgmm_core::exit_codes::ExitCode;
use vbgmm_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use vbgmm_core::observer::{FitObserver, JsonlObserver, NoopObserver, TracingObserver};
use vbgmm_core::output::{render_summary, FitSummary, OutputFormat};
use vbgmm_core::VariationalGmm;

/// Variational Bayesian Gaussian mixture models
#[derive(Parser)]
#[command(name = "vbgmm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Fit config file (TOML, or JSON by extension)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log level (overrides -v/-q and VBGMM_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format: human or jsonl
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a mixture to a data file
    Fit(FitArgs),

    /// Draw the reference five-cluster 2-D dataset
    Sample(SampleArgs),

    /// Resolve and validate the fit configuration
    CheckConfig,

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct FitArgs {
    /// Data file, one observation per line ("-" for stdin)
    #[arg(long, short = 'd')]
    data: PathBuf,

    /// Number of mixture components
    #[arg(long, short = 'k')]
    components: Option<usize>,

    /// Initializer: random or kmeans
    #[arg(long)]
    init: Option<InitMethod>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    max_iter: Option<usize>,

    /// Stop once the ELBO changes by less than this
    #[arg(long)]
    tol: Option<f64>,

    /// gaussian_wishart or corduneanu_bishop
    #[arg(long)]
    parameterization: Option<Parameterization>,

    /// dirichlet or point_estimate
    #[arg(long)]
    weights: Option<WeightMode>,

    /// Z-score each column before fitting
    #[arg(long)]
    standardize: bool,

    /// Write a JSONL snapshot every plot period to this file
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Iterations between trace snapshots
    #[arg(long)]
    plot_period: Option<usize>,

    /// Output format
    #[arg(long, short = 'f', default_value = "json")]
    format: OutputFormat,

    /// Include hard labels for every observation
    #[arg(long)]
    labels: bool,
}

#[derive(Args, Debug)]
struct SampleArgs {
    #[arg(long, default_value_t = 100)]
    points_per_cluster: usize,

    #[arg(long, default_value_t = 2208)]
    seed: u64,

    /// Output file (stdout when omitted)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Append the generating cluster as a last column
    #[arg(long)]
    labels: bool,
}

fn main() {
    let cli = Cli::parse();

    let cli_level = cli.global.log_level.or(if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    });
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let exit_code = match &cli.command {
        Commands::Fit(args) => run_fit(&cli.global, args),
        Commands::Sample(args) => run_sample(args),
        Commands::CheckConfig => run_check_config(&cli.global),
        Commands::Version => {
            println!("vbgmm {}", env!("CARGO_PKG_VERSION"));
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

fn config_error_code(error: &ConfigError) -> ExitCode {
    match error {
        ConfigError::NotFound { .. } => ExitCode::ArgsError,
        ConfigError::Io { .. } => ExitCode::IoError,
        ConfigError::Parse { .. } | ConfigError::Validation(_) => ExitCode::ConfigError,
    }
}

fn data_error_code(error: &DataError) -> ExitCode {
    match error {
        DataError::Io { .. } => ExitCode::IoError,
        _ => ExitCode::DataError,
    }
}

fn load_config(global: &GlobalOpts) -> Result<LoadedConfig, ExitCode> {
    load_fit_config(global.config.as_deref()).map_err(|e| {
        eprintln!("vbgmm: {}", e);
        config_error_code(&e)
    })
}

fn read_data(path: &Path) -> Result<DMatrix<f64>, DataError> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|source| DataError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        parse_matrix(&text)
    } else {
        load_matrix(path)
    }
}

fn run_fit(global: &GlobalOpts, args: &FitArgs) -> ExitCode {
    let mut loaded = match load_config(global) {
        Ok(l) => l,
        Err(code) => return code,
    };
    apply_overrides(&mut loaded, args);

    let raw = match read_data(&args.data) {
        Ok(x) => x,
        Err(e) => {
            eprintln!("vbgmm: {}: {}", args.data.display(), e);
            return data_error_code(&e);
        }
    };
    let (x, standardization) = if args.standardize {
        let (z, s) = standardize(&raw);
        (z, Some(s))
    } else {
        (raw, None)
    };

    let model = match VariationalGmm::new(loaded.config.clone()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("vbgmm: {}", e);
            return e.exit_code();
        }
    };

    let mut trace = match &args.trace {
        Some(path) => match File::create(path) {
            Ok(f) => Some(JsonlObserver::new(BufWriter::new(f))),
            Err(e) => {
                eprintln!("vbgmm: cannot create {}: {}", path.display(), e);
                return ExitCode::IoError;
            }
        },
        None => None,
    };

    let result = match trace.as_mut() {
        Some(obs) => model.fit_with_observer(&x, obs as &mut dyn FitObserver),
        None if loaded.config.display => model.fit_with_observer(&x, &mut TracingObserver),
        None => model.fit_with_observer(&x, &mut NoopObserver),
    };
    let report = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("vbgmm: {}", e);
            return e.exit_code();
        }
    };

    if let Some(obs) = trace {
        if let Err(e) = obs.into_inner() {
            eprintln!("vbgmm: writing trace: {}", e);
            return ExitCode::IoError;
        }
    }

    let mut summary = FitSummary::from_report(&report).with_config(loaded.snapshot());
    if args.labels {
        summary = summary.with_labels(report.labels());
    }
    if let Some(s) = standardization {
        summary = summary.with_standardization(s);
    }

    let rendered = match args.format {
        OutputFormat::Json => match summary.to_json() {
            Ok(json) => json + "\n",
            Err(e) => {
                eprintln!("vbgmm: {}", e);
                return ExitCode::IoError;
            }
        },
        OutputFormat::Summary => render_summary(&summary),
    };
    if write_stdout(&rendered).is_err() {
        return ExitCode::IoError;
    }

    if report.has_warnings() {
        ExitCode::FitWarnings
    } else {
        ExitCode::Clean
    }
}

fn apply_overrides(loaded: &mut LoadedConfig, args: &FitArgs) {
    let config = &mut loaded.config;
    if let Some(k) = args.components {
        config.components = k;
    }
    if let Some(init) = args.init {
        config.init = init;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(max_iter) = args.max_iter {
        config.max_iter = max_iter;
    }
    if args.tol.is_some() {
        config.tol = args.tol;
    }
    if let Some(p) = args.parameterization {
        config.parameterization = p;
    }
    if args.weights.is_some() {
        config.weights = args.weights;
    }
    if args.trace.is_some() {
        config.display = true;
    }
    if args.plot_period.is_some() {
        config.plot_period = args.plot_period;
    }
}

fn run_sample(args: &SampleArgs) -> ExitCode {
    let (x, labels) = sample_reference_clusters(args.points_per_cluster, args.seed);
    let text = format_matrix(&x, args.labels.then_some(labels.as_slice()));
    let written = match &args.output {
        Some(path) => std::fs::write(path, text),
        None => write_stdout(&text),
    };
    match written {
        Ok(()) => ExitCode::Clean,
        Err(e) => {
            eprintln!("vbgmm: {}", e);
            ExitCode::IoError
        }
    }
}

fn run_check_config(global: &GlobalOpts) -> ExitCode {
    let loaded = match load_config(global) {
        Ok(l) => l,
        Err(code) => return code,
    };
    match loaded.snapshot().to_json() {
        Ok(json) => {
            if write_stdout(&(json + "\n")).is_err() {
                return ExitCode::IoError;
            }
            ExitCode::Clean
        }
        Err(e) => {
            eprintln!("vbgmm: {}", e);
            ExitCode::IoError
        }
    }
}

fn write_stdout(text: &str) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(text.as_bytes())?;
    out.flush()
}
