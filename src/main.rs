//! portstat Binary Entry Point
//!
//! Runs one SNMP collection pass and exits. Periodic execution is left to
//! cron or a systemd timer. Core functionality is provided by the `portstat`
//! library crate.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use portstat::{
    collector::{CollectorError, Orchestrator, RunOptions},
    config::{AppConfig, ConfigError, parse_duration},
    snmp::UdpConnector,
    storage::{CollectionRun, StorageBuilder},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration file used when `--config` is not given.
const DEFAULT_CONFIG_PATH: &str = "configs/portstat.yaml";

/// Long flags that take a value.
const VALUE_FLAGS: &[&str] = &[
    "device",
    "config",
    "db-url",
    "community",
    "workers",
    "device-timeout",
    "log-file",
];

/// Long flags without a value.
const SWITCH_FLAGS: &[&str] = &["force", "verbose", "dry-run", "help", "version"];

/// portstat - SNMP interface error and speed collector
#[derive(Parser, Debug)]
#[command(
    name = "portstat",
    version,
    about = "SNMP interface error and speed collector",
    long_about = None,
    after_help = "Examples:\n  portstat --verbose\n  portstat --device=123 --force\n  portstat --dry-run"
)]
struct Cli {
    /// Collect data for specific device only
    #[arg(long, value_name = "ID")]
    device: Option<String>,

    /// Force collection even if recent data exists
    #[arg(long)]
    force: bool,

    /// Echo progress to stdout
    #[arg(long)]
    verbose: bool,

    /// Show what would be done without executing
    #[arg(long)]
    dry_run: bool,

    /// Path to configuration file
    #[arg(short, long, env = "PORTSTAT_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL (overrides config file)
    #[arg(long, env = "PORTSTAT_DB_URL")]
    db_url: Option<String>,

    /// SNMP community (overrides config file)
    #[arg(long, env = "PORTSTAT_COMMUNITY", hide_env_values = true)]
    community: Option<String>,

    /// Devices processed concurrently (overrides config file)
    #[arg(long)]
    workers: Option<usize>,

    /// Per-device deadline, e.g. `90s` (overrides config file)
    #[arg(long, value_parser = parse_duration)]
    device_timeout: Option<Duration>,

    /// Log file (overrides config file)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            device: self.device.clone(),
            force: self.force,
            verbose: self.verbose,
            dry_run: self.dry_run,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let (args, ignored) = filter_known_args(std::env::args());

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(2));
        }
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("portstat: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Flushes buffered log lines on drop.
    let _guard = match init_tracing(&config.logging.file, cli.verbose || cli.dry_run) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("portstat: failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    for arg in &ignored {
        tracing::warn!(argument = %arg, "Ignoring unknown argument");
    }

    if cli.dry_run {
        tracing::info!("DRY RUN MODE - No actual data will be collected");
    }

    tracing::debug!(
        database = %config.database.url,
        workers = config.collection.workers,
        freshness_window = ?config.collection.freshness_window,
        device_timeout = ?config.collection.device_timeout,
        "Configuration loaded"
    );

    let handles = match StorageBuilder::new(&config.database.url)
        .max_connections(config.database.max_connections)
        .build()
        .await
    {
        Ok(handles) => handles,
        Err(e) => {
            let err = CollectorError::DatabaseUnavailable(e);
            tracing::error!(error = %err, "Scheduler error");
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = Orchestrator::new(&handles, Arc::new(UdpConnector), config.session_policy())
        .with_workers(config.collection.workers)
        .with_device_timeout(config.collection.device_timeout)
        .with_freshness_window(config.collection.freshness_window);

    let result = orchestrator.run_once(cli.run_options()).await;
    if let Some(run) = completed_run(&result) {
        print!("{}", format_summary(run));
    }

    let code = match &result {
        Ok(_) => ExitCode::SUCCESS,
        Err(CollectorError::RunNotRecorded { source, .. }) => {
            tracing::error!(error = %source, "Failed to log collection run");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Scheduler error");
            ExitCode::FAILURE
        }
    };

    handles.shutdown().await;
    code
}

/// Drop arguments that are not known flags or their values.
///
/// Returns the arguments to parse and the ones that were dropped.
fn filter_known_args<I>(args: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut kept: Vec<String> = args.next().into_iter().collect();
    let mut ignored = Vec::new();
    let mut expect_value = false;

    for arg in args {
        if expect_value {
            expect_value = false;
            kept.push(arg);
            continue;
        }

        let (known, takes_value) = match arg.strip_prefix("--") {
            Some(flag) => {
                let (name, inline_value) = match flag.split_once('=') {
                    Some((name, _)) => (name, true),
                    None => (flag, false),
                };
                if VALUE_FLAGS.contains(&name) {
                    (true, !inline_value)
                } else {
                    (SWITCH_FLAGS.contains(&name), false)
                }
            }
            None => match arg.as_str() {
                "-c" => (true, true),
                "-h" | "-V" => (true, false),
                _ => (false, false),
            },
        };

        if known {
            expect_value = takes_value;
            kept.push(arg);
        } else {
            ignored.push(arg);
        }
    }

    (kept, ignored)
}

/// Load the configuration file and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(DEFAULT_CONFIG_PATH)?,
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(url) = &cli.db_url {
        config.database.url = url.clone();
    }
    if let Some(community) = &cli.community {
        config.snmp.community = community.clone();
    }
    if let Some(workers) = cli.workers {
        config.collection.workers = workers;
    }
    if let Some(timeout) = cli.device_timeout {
        config.collection.device_timeout = timeout;
    }
    if let Some(file) = &cli.log_file {
        config.logging.file = file.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Log to the append-only file, echoing to stdout at `info` or `error`.
fn init_tracing(
    log_file: &Path,
    echo: bool,
) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let log_dir = log_file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let log_filename = log_file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("invalid log file path: {}", log_file.display()))?;

    std::fs::create_dir_all(log_dir)?;
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(log_filename)
        .build(log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stdout_level = if echo {
        LevelFilter::INFO
    } else {
        LevelFilter::ERROR
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,portstat=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_filter(stdout_level),
        )
        .try_init()?;

    Ok(guard)
}

/// The run to summarize: any run whose devices were processed, recorded or not.
fn completed_run(result: &Result<CollectionRun, CollectorError>) -> Option<&CollectionRun> {
    match result {
        Ok(run) => Some(run),
        Err(CollectorError::RunNotRecorded { run, .. }) => Some(run.as_ref()),
        Err(_) => None,
    }
}

fn format_summary(run: &CollectionRun) -> String {
    format!(
        "\n=== COLLECTION SUMMARY ===\n\
         Duration: {:.2} seconds\n\
         Devices processed: {}\n\
         Ports updated: {}\n\
         Statistics collected: {}\n\
         Errors encountered: {}\n\
         =========================\n",
        run.duration_secs,
        run.devices_processed,
        run.ports_updated,
        run.statistics_collected,
        run.errors,
    )
}
