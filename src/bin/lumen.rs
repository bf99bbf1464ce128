//! Lumen CLI - Command-line interface for Lumen Trace
//!
//! Commands:
//! - filter: Remove outlier points from a recorded trace
//! - classify: Classify a recorded trace (or a contour) and print the shape analysis
//! - approx: Show contour simplification at several epsilon factors
//! - replay: Replay recorded frame observations through a tracking session
//! - config: Print or validate session configuration
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lumen_trace::classifier::DEFAULT_APPROXIMATION_FACTORS;
use lumen_trace::encoder::TraceEncoder;
use lumen_trace::export::NdjsonSink;
use lumen_trace::outlier::OutlierPolicy;
use lumen_trace::pipeline::{analyze_points, approximate_points, filter_points, SessionRunner};
use lumen_trace::{
    DistanceStatistics, PlanarGeometry, Point, PointDistanceStats, SessionConfig,
    ShapeClassifier, TrackError, PRODUCER_NAME, VERSION,
};

/// Lumen - Light-point tracking and drawn-shape recognition
#[derive(Parser)]
#[command(name = "lumen")]
#[command(version = VERSION)]
#[command(about = "Filter, classify and replay light-point traces", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove outlier points from a recorded trace
    Filter {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Outlier detection method
        #[arg(long, default_value = "hybrid")]
        method: FilterMethod,

        /// IQR fence multiplier
        #[arg(long, default_value = "1.5")]
        multiplier: f64,

        /// Modified Z-score threshold
        #[arg(long, default_value = "3.5")]
        threshold: f64,

        /// Maximum Hybrid iterations
        #[arg(long, default_value = "3")]
        max_iterations: u32,
    },

    /// Classify a recorded trace and print the shape analysis
    Classify {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Session configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Treat the input as a closed contour (skip filtering and rasterising)
        #[arg(long)]
        contour: bool,

        /// Output the analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show contour simplification at several epsilon factors
    Approx {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Epsilon factors (comma separated)
        #[arg(long, value_delimiter = ',')]
        factors: Vec<f64>,

        /// Session configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay recorded frame observations (NDJSON) through a tracking session
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path for trace records (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Session configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the default configuration or validate a configuration file
    Config {
        /// Configuration file to validate
        #[arg(long)]
        validate: Option<PathBuf>,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// JSON array of points
    Json,
    /// Newline-delimited JSON (one point per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum FilterMethod {
    Iqr,
    Zscore,
    Hybrid,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), LumenCliError> {
    match cli.command {
        Commands::Filter {
            input,
            output,
            input_format,
            method,
            multiplier,
            threshold,
            max_iterations,
        } => {
            let policy = match method {
                FilterMethod::Iqr => OutlierPolicy::Iqr { multiplier },
                FilterMethod::Zscore => OutlierPolicy::ModifiedZScore { threshold },
                FilterMethod::Hybrid => OutlierPolicy::Hybrid {
                    iqr_multiplier: multiplier,
                    z_threshold: threshold,
                    max_iterations,
                },
            };
            cmd_filter(&input, &output, input_format, policy)
        }

        Commands::Classify {
            input,
            input_format,
            config,
            contour,
            json,
        } => cmd_classify(&input, input_format, config.as_deref(), contour, json),

        Commands::Approx {
            input,
            input_format,
            factors,
            config,
            json,
        } => cmd_approx(&input, input_format, &factors, config.as_deref(), json),

        Commands::Replay {
            input,
            output,
            config,
        } => cmd_replay(&input, &output, config.as_deref()),

        Commands::Config { validate } => cmd_config(validate.as_deref()),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_filter(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    policy: OutlierPolicy,
) -> Result<(), LumenCliError> {
    let points = read_points(input, &input_format)?;
    let outcome = filter_points(&points, policy);

    let report = FilterReport {
        method: policy.name().to_string(),
        input_points: points.len(),
        output_points: outcome.points.len(),
        removed: outcome.removed,
        iterations: outcome.iterations,
        before: PointDistanceStats::compute(&points),
        after: PointDistanceStats::compute(&outcome.points),
        points: outcome.points,
    };

    write_output(output, &(serde_json::to_string_pretty(&report)? + "\n"))
}

fn cmd_classify(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    contour: bool,
    json: bool,
) -> Result<(), LumenCliError> {
    let config = load_config(config)?;
    let points = read_points(input, &input_format)?;

    let analysis = if contour {
        ShapeClassifier::with_epsilon_factor(config.epsilon_factor)
            .analyze_contour(&PlanarGeometry, &points)?
    } else {
        analyze_points(&points, &config)?.ok_or(LumenCliError::NoContour)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print!("{}", analysis);
    }
    Ok(())
}

fn cmd_approx(
    input: &Path,
    input_format: InputFormat,
    factors: &[f64],
    config: Option<&Path>,
    json: bool,
) -> Result<(), LumenCliError> {
    let config = load_config(config)?;
    let points = read_points(input, &input_format)?;
    let factors = if factors.is_empty() {
        &DEFAULT_APPROXIMATION_FACTORS[..]
    } else {
        factors
    };

    let levels = approximate_points(&points, &config, factors)?;
    if levels.is_empty() {
        return Err(LumenCliError::NoContour);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&levels)?);
    } else {
        println!("Multi-level Approximation");
        println!("=========================");
        for level in &levels {
            println!(
                "  epsilon {:.3} ({:6.2}px): {:4} -> {:3} points ({:.1}%)",
                level.epsilon_factor,
                level.epsilon,
                level.original_points,
                level.approximated_points,
                level.compression_ratio * 100.0
            );
        }
    }
    Ok(())
}

fn cmd_replay(input: &Path, output: &Path, config: Option<&Path>) -> Result<(), LumenCliError> {
    let config = load_config(config)?;

    let writer: Box<dyn Write> = if is_stdio(output) {
        Box::new(io::stdout())
    } else {
        Box::new(fs::File::create(output)?)
    };
    let mut runner = SessionRunner::new(config, NdjsonSink::with_encoder(writer, TraceEncoder::new()))?;

    let summary = if is_stdio(input) {
        runner.replay(io::stdin().lock())?
    } else {
        runner.replay(BufReader::new(fs::File::open(input)?))?
    };

    info!(
        frames = summary.frames,
        previews = summary.previews,
        finalized = summary.finalized,
        accepted = summary.accepted,
        export_failures = summary.export_failures,
        "replay complete"
    );
    Ok(())
}

fn cmd_config(validate: Option<&Path>) -> Result<(), LumenCliError> {
    match validate {
        Some(path) => {
            let config = load_config(Some(path))?;
            println!("Configuration valid");
            println!("{}", config.to_json()?);
        }
        None => println!("{}", SessionConfig::default().to_json()?),
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), LumenCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Lumen Trace version {}", VERSION),
    });

    if let Some(path) = config {
        checks.push(config_check(path));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Lumen Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    if report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error)) {
        Err(LumenCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn config_check(path: &Path) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Configuration file does not exist".to_string(),
        };
    }

    let loaded = fs::read_to_string(path)
        .map_err(TrackError::from)
        .and_then(|s| SessionConfig::from_json(&s));
    match loaded {
        Ok(config) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Configuration valid ({} policy, {}ms timeout)",
                config.outlier_policy.name(),
                config.no_light_timeout_ms
            ),
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    }
}

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn read_input(input: &Path) -> Result<String, LumenCliError> {
    if is_stdio(input) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), LumenCliError> {
    if is_stdio(output) {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn read_points(input: &Path, format: &InputFormat) -> Result<Vec<Point>, LumenCliError> {
    let data = read_input(input)?;
    let points: Vec<Point> = match format {
        InputFormat::Json => serde_json::from_str(&data)?,
        InputFormat::Ndjson => data
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str::<Point>(line))
            .collect::<Result<_, _>>()?,
    };

    if points.is_empty() {
        return Err(LumenCliError::NoPoints);
    }
    Ok(points)
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig, LumenCliError> {
    match path {
        Some(path) => Ok(SessionConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(SessionConfig::default()),
    }
}

// Error types

#[derive(Debug)]
enum LumenCliError {
    Io(io::Error),
    Track(TrackError),
    Json(serde_json::Error),
    NoPoints,
    NoContour,
    DoctorFailed,
}

impl From<io::Error> for LumenCliError {
    fn from(e: io::Error) -> Self {
        LumenCliError::Io(e)
    }
}

impl From<TrackError> for LumenCliError {
    fn from(e: TrackError) -> Self {
        LumenCliError::Track(e)
    }
}

impl From<serde_json::Error> for LumenCliError {
    fn from(e: serde_json::Error) -> Self {
        LumenCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LumenCliError> for CliError {
    fn from(e: LumenCliError) -> Self {
        match e {
            LumenCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LumenCliError::Track(TrackError::InvalidConfig(msg)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Run 'lumen config' to see a valid configuration".to_string()),
            },
            LumenCliError::Track(e) => CliError {
                code: "TRACK_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure observations are NDJSON frame records".to_string()),
            },
            LumenCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Points are objects like {\"x\": 10, \"y\": 20}".to_string()),
            },
            LumenCliError::NoPoints => CliError {
                code: "NO_POINTS".to_string(),
                message: "No points found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            LumenCliError::NoContour => CliError {
                code: "NO_CONTOUR".to_string(),
                message: "Trace produced no contour".to_string(),
                hint: None,
            },
            LumenCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct FilterReport {
    method: String,
    input_points: usize,
    output_points: usize,
    removed: usize,
    iterations: u32,
    before: DistanceStatistics,
    after: DistanceStatistics,
    points: Vec<Point>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Debug, PartialEq, serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
