//! Labmon CLI - drive simulated instruments from the command line
//!
//! Registers the configured devices, runs one operation against a device
//! and prints the result in the requested format.

use anyhow::Context;
use clap::{Parser, Subcommand};
use labmon_core::cli::{format_history, format_report, format_sample, format_samples, print_exit_codes};
use labmon_core::{
    AppConfig, BroadcastHub, CliResult, DeviceRegistry, DeviceSession, Error, ExitCodes, FileLog,
    LogSink, MemoryLog, Monitor, OutputFormat, Sample,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Labmon CLI
#[derive(Parser, Debug)]
#[command(
    name = "labmon",
    version,
    about = "Simulated instrument sessions, sampling and stability checks",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, env = "LABMON_CONFIG")]
    config: Option<PathBuf>,

    /// Device identifier
    #[arg(short, long, default_value = "dev1")]
    device: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Device(DeviceCommand),

    /// Print the effective configuration
    Config,

    /// List exit codes
    ExitCodes,
}

/// Operations on the device selected with `--device`
#[derive(Subcommand, Debug)]
enum DeviceCommand {
    /// Print the instrument identity
    Identity,

    /// Read the current value
    Read,

    /// Set the value
    Set {
        /// New value
        #[arg(allow_hyphen_values = true)]
        value: f64,
    },

    /// Sample for a fixed duration
    Sample {
        /// Duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Interval in milliseconds
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Check whether readings are stable
    Stability {
        /// Number of reads
        #[arg(short, long)]
        window: Option<usize>,

        /// Interval in milliseconds
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Stream live samples as they are published
    Watch {
        /// Duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Show recorded history
    History {
        /// Maximum number of records
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn init_tracing(config: &AppConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load().context("loading default configuration")?,
    };
    Ok(config)
}

/// History file from the configuration; in memory only when no platform
/// directory exists
fn open_history(config: &AppConfig) -> Result<Arc<dyn LogSink>, Error> {
    match config.history_file() {
        Ok(path) => Ok(Arc::new(FileLog::open(&path, config.logging.history_format)?)),
        Err(e) => {
            warn!(error = %e, "no history directory, keeping history in memory");
            Ok(Arc::new(MemoryLog::new(config.logging.max_records)))
        }
    }
}

/// Cancel `token` on Ctrl-C
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, stopping");
            token.cancel();
        }
    });
}

async fn register_devices(config: &AppConfig) -> Result<DeviceRegistry, Error> {
    let registry = DeviceRegistry::new();
    for profile in config.device_profiles() {
        let session = DeviceSession::simulated(&profile.id, &profile.simulator_config(&config.simulator));
        registry.add(&profile.id, session).await?;
    }
    Ok(registry)
}

async fn run(cli: &Cli, command: &DeviceCommand, config: AppConfig) -> Result<CliResult, Error> {
    let registry = register_devices(&config).await?;
    let result = execute(cli, command, &config, &registry).await;
    registry.shutdown().await;
    result
}

async fn execute(
    cli: &Cli,
    command: &DeviceCommand,
    config: &AppConfig,
    registry: &DeviceRegistry,
) -> Result<CliResult, Error> {
    let session = registry.get(&cli.device).await?;
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());
    let mut settings = config.monitor.clone();

    match command {
        DeviceCommand::Identity => {
            println!("{}", session.get_identity().await?);
        }
        DeviceCommand::Read => {
            let value = session.get_temperature().await?;
            println!("{}", format_sample(&Sample::now(value), cli.format));
        }
        DeviceCommand::Set { value } => {
            if !value.is_finite() {
                return Err(Error::InvalidArgument(format!("not a finite value: {value}")));
            }
            if !session.set_temperature(*value).await? {
                return Ok(CliResult::error(ExitCodes::INVALID_ARGS, "instrument rejected value"));
            }
            return Ok(CliResult::success_with_message("OK"));
        }
        DeviceCommand::Sample { duration, interval } => {
            if let Some(secs) = duration {
                settings.duration_secs = *secs;
            }
            if let Some(ms) = interval {
                settings.interval_ms = *ms;
            }
            let monitor = Monitor::new(&cli.device, session)
                .with_config(settings)
                .with_log(open_history(config)?);
            let samples = monitor.sample_default(&cancel).await;
            println!("{}", format_samples(&samples, cli.format));
            if cancel.is_cancelled() {
                return Ok(CliResult::error(ExitCodes::CANCELLED, "sampling cancelled"));
            }
        }
        DeviceCommand::Stability { window, interval } => {
            if let Some(window) = window {
                settings.stability_window = *window;
            }
            if let Some(ms) = interval {
                settings.interval_ms = *ms;
            }
            let monitor = Monitor::new(&cli.device, session)
                .with_config(settings)
                .with_log(open_history(config)?);
            let report = monitor.check_stability_default(&cancel).await;
            println!("{}", format_report(&report, cli.format));
            if !report.stable {
                return Ok(CliResult::error(ExitCodes::NOT_STABLE, "readings not stable"));
            }
        }
        DeviceCommand::Watch { duration } => {
            if let Some(secs) = duration {
                settings.duration_secs = *secs;
            }
            let hub = Arc::new(BroadcastHub::new());
            let mut subscription = hub.subscribe_channel(&cli.device, 64);
            let subscriber = subscription.id;
            let printer = tokio::spawn(async move {
                while let Some(sample) = subscription.recv().await {
                    println!("{}", sample.to_message());
                }
            });

            let monitor = Monitor::new(&cli.device, session)
                .with_config(settings)
                .with_hub(hub.clone())
                .with_log(open_history(config)?);
            monitor.sample_default(&cancel).await;

            hub.unsubscribe(&cli.device, subscriber);
            if let Err(e) = printer.await {
                warn!(error = %e, "printer task failed");
            }
        }
        DeviceCommand::History { limit } => {
            let records = open_history(config)?.query_history(&cli.device, *limit)?;
            println!("{}", format_history(&records, cli.format));
        }
    }

    Ok(CliResult::success())
}

fn show_config(config: &AppConfig) -> CliResult {
    match config.to_toml() {
        Ok(text) => {
            print!("{text}");
            CliResult::success()
        }
        Err(e) => CliResult::from(Error::from(e)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let command = match &cli.command {
        Commands::ExitCodes => {
            print_exit_codes();
            return ExitCode::SUCCESS;
        }
        Commands::Config => None,
        Commands::Device(command) => Some(command),
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(ExitCodes::CONFIG_ERROR);
        }
    };
    init_tracing(&config, cli.verbose);

    let result = match command {
        Some(command) => run(&cli, command, config)
            .await
            .unwrap_or_else(CliResult::from),
        None => show_config(&config),
    };

    if let Some(message) = result.message() {
        if result.is_success() {
            println!("{message}");
        } else {
            eprintln!("Error: {message}");
        }
    }
    result.to_exit_code()
}
