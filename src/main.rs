//! CLI entry point for the oyster dashboard pipeline.
//!
//! Provides subcommands for exporting station JSON for the web dashboard,
//! building a chart model for the image renderer, validating parameter
//! files, and printing the remote queries a station would issue.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use oyster_dashboard::{
    config::StationConfig,
    error::PipelineError,
    fetch::{BasicClient, DEFAULT_BASE_URL, ErddapClient},
    output::{append_record, print_json, write_json_atomic},
    pipeline::Pipeline,
    stats::RunStats,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Upper bound on a single tabular query.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "oyster_dashboard")]
#[command(about = "Builds oyster dashboard data from coastal monitoring stations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, process, and write `<station>.json` for each parameter file
    Export {
        /// Station parameter files
        #[arg(short, long = "params", value_name = "FILE", required = true, num_args = 1..)]
        params: Vec<PathBuf>,

        /// Directory to write station JSON files into
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Optional CSV file to append one run record per station to
        #[arg(long)]
        run_log: Option<PathBuf>,
    },
    /// Build the chart model for one station and write it as JSON
    Chart {
        /// Station parameter file
        #[arg(short, long = "params", value_name = "FILE")]
        params: PathBuf,

        /// File to write the chart model to; defaults to the station's
        /// `web-url-fname` with a `.json` extension
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Check parameter files without contacting the data service
    Validate {
        /// Station parameter files
        #[arg(short, long = "params", value_name = "FILE", required = true, num_args = 1..)]
        params: Vec<PathBuf>,
    },
    /// Print the data and QC query URLs for a station
    Url {
        /// Station parameter file
        #[arg(short, long = "params", value_name = "FILE")]
        params: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/oyster_dashboard.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("oyster_dashboard.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            params,
            out_dir,
            run_log,
        } => {
            let pipeline = build_pipeline()?;
            export_all(&pipeline, &params, &out_dir, run_log.as_deref())?;
        }
        Commands::Chart { params, out } => {
            let config = StationConfig::load(&params)?;
            let pipeline = build_pipeline()?;
            let chart = pipeline.chart(&config);
            let out = out.unwrap_or_else(|| config.chart_file_name());
            write_json_atomic(&chart, &out)?;
            info!(
                path = %out.display(),
                panels = chart.panels.len(),
                unavailable = chart.is_unavailable(),
                "Chart model written"
            );
        }
        Commands::Validate { params } => {
            let mut invalid = 0;
            for path in &params {
                match StationConfig::load(path) {
                    Ok(config) => info!(
                        path = %path.display(),
                        station_id = config.station_id(),
                        variables = ?config.short_names(),
                        units = ?config.units(),
                        qc = config.qc_enabled(),
                        "Parameter file is valid"
                    ),
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "Parameter file is invalid");
                        invalid += 1;
                    }
                }
            }
            if invalid > 0 {
                bail!("{invalid} of {} parameter files are invalid", params.len());
            }
        }
        Commands::Url { params } => {
            let config = StationConfig::load(&params)?;
            let erddap = ErddapClient::new(BasicClient::new()).with_base_url(base_url());
            println!("{}", erddap.data_url(&config));
            if let Some(qc_url) = erddap.qc_url(&config) {
                println!("{qc_url}");
            }
        }
    }

    Ok(())
}

/// Tabular service root, overridable with `ERDDAP_BASE_URL`.
fn base_url() -> String {
    std::env::var("ERDDAP_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

fn build_pipeline() -> Result<Pipeline<BasicClient>> {
    let client = BasicClient::with_timeout(REQUEST_TIMEOUT)?;
    let base_url = base_url();
    info!(base_url = %base_url, "Using tabular data service");
    Ok(Pipeline::new(ErddapClient::new(client).with_base_url(base_url)))
}

/// Exports every station in turn. A failing station is logged and recorded
/// but never stops the others.
#[tracing::instrument(skip_all, fields(stations = params.len(), out_dir = %out_dir.display()))]
fn export_all(
    pipeline: &Pipeline<BasicClient>,
    params: &[PathBuf],
    out_dir: &Path,
    run_log: Option<&Path>,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;
    let mut failed = 0;

    for path in params {
        let station_span = tracing::info_span!("station", params = %path.display());
        let _enter = station_span.enter();

        let stats = match StationConfig::load(path) {
            Ok(config) => {
                let (result, stats) = pipeline.export_station(&config, out_dir);
                match result {
                    Ok(written) => info!(path = %written.display(), "Station exported"),
                    Err(e) => {
                        error!(error = %e, kind = e.kind(), "Station export failed");
                        failed += 1;
                    }
                }
                stats
            }
            Err(e) => {
                let e = PipelineError::from(e);
                error!(error = %e, "Parameter file rejected");
                failed += 1;
                RunStats::from_error(e.kind(), &e.to_string())
            }
        };

        print_json(&stats)?;
        if let Some(run_log) = run_log {
            if let Err(e) = append_record(run_log, &stats) {
                warn!(path = %run_log.display(), error = %e, "Failed to append run record");
            }
        }
    }

    info!(total = params.len(), failed, "Finished exporting stations");
    if failed > 0 {
        bail!("{failed} of {} stations failed", params.len());
    }
    Ok(())
}
