//! Flux CLI - Command-line interface for PA Flux
//!
//! Commands:
//! - process: Reduce a raw recording into minute, 10 s and daily tables
//! - daily: Summarize an existing minute table by calendar day
//! - config: Print the default configuration

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use pa_flux::adapters::{CsvSampleProvider, PrecomputedCounts};
use pa_flux::encoder::{
    parse_timestamp, read_minute_table, write_daily_table, write_minute_table,
    write_ten_second_table,
};
use pa_flux::{ActivityProcessor, ComputeError, Cutpoints, DailyConfig, PipelineConfig, WakingHours};
use pa_flux::FLUX_VERSION;

/// Flux - Physical activity reduction for raw accelerometer recordings
#[derive(Parser)]
#[command(name = "paflux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Reduce accelerometer recordings into wear and intensity tables", long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce a raw recording into minute, 10 s and daily tables
    Process {
        /// Raw samples CSV (v,ml,ap in g)
        #[arg(long)]
        samples: PathBuf,

        /// Precomputed 60 s counts CSV (optional timestamp, then v,ml,ap)
        #[arg(long)]
        counts: PathBuf,

        /// Timestamp of the first sample, e.g. "2024-01-15 09:00:00"
        #[arg(long)]
        start: String,

        /// Sampling rate in Hz (defaults to the configured sampling_hz)
        #[arg(long)]
        hz: Option<u32>,

        /// Pipeline configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory receiving minute.csv, ten_second.csv and daily.csv
        #[arg(long)]
        out_dir: PathBuf,

        /// Also write a JSON report to this path (use - for stdout)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Apply the calibration coefficients to the ENMO pathway
        #[arg(long)]
        autocalibrate: bool,

        /// Per-axis calibration offset in g, as v,ml,ap
        #[arg(long, value_delimiter = ',', num_args = 1)]
        calibration_offset: Option<Vec<f32>>,

        /// Per-axis calibration scale, as v,ml,ap
        #[arg(long, value_delimiter = ',', num_args = 1)]
        calibration_scale: Option<Vec<f32>>,

        #[command(flatten)]
        daily: DailyArgs,
    },

    /// Summarize an existing minute table by calendar day
    Daily {
        /// Minute table CSV (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "csv")]
        format: DailyFormat,

        /// Pipeline configuration JSON (only the daily section is used)
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        daily: DailyArgs,
    },

    /// Print the default configuration as JSON
    Config,
}

/// Overrides for the daily aggregation settings
#[derive(Args)]
struct DailyArgs {
    /// Count cutpoints for light, moderate and vigorous, as c0,c1,c2
    #[arg(long, value_delimiter = ',', num_args = 1)]
    counts_cutpoints: Option<Vec<f64>>,

    /// ENMO cutpoints in mg, as c0,c1,c2
    #[arg(long, value_delimiter = ',', num_args = 1)]
    enmo_cutpoints: Option<Vec<f64>>,

    /// First waking hour (inclusive)
    #[arg(long)]
    waking_start: Option<u32>,

    /// Last waking hour (exclusive)
    #[arg(long)]
    waking_end: Option<u32>,
}

#[derive(Clone, ValueEnum)]
enum DailyFormat {
    /// One row per day
    Csv,
    /// Pretty-printed JSON array
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);

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

fn init_logging(level: LevelFilter) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), FluxCliError> {
    match cli.command {
        Commands::Process {
            samples,
            counts,
            start,
            hz,
            config,
            out_dir,
            report,
            autocalibrate,
            calibration_offset,
            calibration_scale,
            daily,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(hz) = hz {
                config.sampling_hz = hz;
            }
            if autocalibrate {
                config.calibration.enabled = true;
            }
            if let Some(offset) = calibration_offset {
                config.calibration.offset = axis_triple(&offset, "calibration-offset")?;
            }
            if let Some(scale) = calibration_scale {
                config.calibration.scale = axis_triple(&scale, "calibration-scale")?;
            }
            apply_daily_overrides(&mut config.daily, &daily)?;

            cmd_process(&samples, &counts, &start, config, &out_dir, report.as_deref())
        }

        Commands::Daily {
            input,
            output,
            format,
            config,
            daily,
        } => {
            let mut config = load_config(config.as_deref())?;
            apply_daily_overrides(&mut config.daily, &daily)?;
            cmd_daily(&input, &output, format, config)
        }

        Commands::Config => {
            println!("{}", PipelineConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, FluxCliError> {
    match path {
        Some(path) => Ok(PipelineConfig::from_path(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn axis_triple<T: Copy>(values: &[T], flag: &str) -> Result<[T; 3], FluxCliError> {
    match values {
        [v, ml, ap] => Ok([*v, *ml, *ap]),
        _ => Err(FluxCliError::InvalidArgument(format!(
            "--{flag} expects three comma-separated values, got {}",
            values.len()
        ))),
    }
}

fn apply_daily_overrides(config: &mut DailyConfig, args: &DailyArgs) -> Result<(), FluxCliError> {
    if let Some(values) = &args.counts_cutpoints {
        config.counts_cutpoints = Some(Cutpoints::from_slice(values)?);
    }
    if let Some(values) = &args.enmo_cutpoints {
        config.enmo_cutpoints = Some(Cutpoints::from_slice(values)?);
    }
    if args.waking_start.is_some() || args.waking_end.is_some() {
        config.waking_hours = WakingHours::new(
            args.waking_start.unwrap_or(config.waking_hours.start_hour),
            args.waking_end.unwrap_or(config.waking_hours.end_hour),
        )?;
    }
    Ok(())
}

fn cmd_process(
    samples: &Path,
    counts: &Path,
    start: &str,
    config: PipelineConfig,
    out_dir: &Path,
    report: Option<&Path>,
) -> Result<(), FluxCliError> {
    let start = parse_timestamp(start)?;
    let provider = CsvSampleProvider::new(samples, start, config.sampling_hz);
    let count_source = PrecomputedCounts::from_path(counts)?;
    let processor = ActivityProcessor::new(config)?;

    let source = samples.display().to_string();
    let (recording, report_json) = processor.process_to_json(&provider, &count_source, &source)?;

    fs::create_dir_all(out_dir)?;
    write_minute_table(
        BufWriter::new(File::create(out_dir.join("minute.csv"))?),
        &recording.reduced.minutes,
    )?;
    write_ten_second_table(
        BufWriter::new(File::create(out_dir.join("ten_second.csv"))?),
        &recording.reduced.ten_seconds,
    )?;
    write_daily_table(
        BufWriter::new(File::create(out_dir.join("daily.csv"))?),
        &recording.days,
    )?;
    info!(out_dir = %out_dir.display(), days = recording.days.len(), "wrote tables");

    if let Some(report) = report {
        if report.to_string_lossy() == "-" {
            println!("{}", report_json);
        } else {
            fs::write(report, report_json)?;
        }
    }

    Ok(())
}

fn cmd_daily(
    input: &Path,
    output: &Path,
    format: DailyFormat,
    config: PipelineConfig,
) -> Result<(), FluxCliError> {
    let minutes = if input.to_string_lossy() == "-" {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        read_minute_table(buffer.as_slice())?
    } else {
        read_minute_table(File::open(input)?)?
    };

    let processor = ActivityProcessor::new(config)?;
    let days = processor.summarize(&minutes)?;

    let mut writer: Box<dyn Write> = if output.to_string_lossy() == "-" {
        Box::new(io::stdout().lock())
    } else {
        Box::new(BufWriter::new(File::create(output)?))
    };

    match format {
        DailyFormat::Csv => write_daily_table(&mut writer, &days)?,
        DailyFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &days)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;

    Ok(())
}

// Error types

#[derive(Debug)]
enum FluxCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    InvalidArgument(String),
}

impl From<io::Error> for FluxCliError {
    fn from(e: io::Error) -> Self {
        FluxCliError::Io(e)
    }
}

impl From<ComputeError> for FluxCliError {
    fn from(e: ComputeError) -> Self {
        FluxCliError::Compute(e)
    }
}

impl From<serde_json::Error> for FluxCliError {
    fn from(e: serde_json::Error) -> Self {
        FluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FluxCliError> for CliError {
    fn from(e: FluxCliError) -> Self {
        match e {
            FluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FluxCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InsufficientData(_) => (
                        "INSUFFICIENT_DATA",
                        "Recordings need at least one full van Hees window",
                    ),
                    ComputeError::Configuration(_) => (
                        "CONFIG_ERROR",
                        "Run 'paflux config' to see valid settings",
                    ),
                    ComputeError::TimelineMismatch { .. } => (
                        "TIMELINE_MISMATCH",
                        "Counts and samples must cover the same minutes from the same start",
                    ),
                    ComputeError::DateParseError(_) => (
                        "DATE_PARSE_ERROR",
                        "Use YYYY-MM-DD HH:MM:SS timestamps",
                    ),
                    ComputeError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    ComputeError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    ComputeError::ParseError(_) | ComputeError::Csv(_) => (
                        "PARSE_ERROR",
                        "Ensure CSV files have a v,ml,ap header and numeric rows",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            FluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FluxCliError::InvalidArgument(msg) => CliError {
                code: "INVALID_ARGUMENT".to_string(),
                message: msg,
                hint: Some("Run 'paflux --help' for usage".to_string()),
            },
        }
    }
}
