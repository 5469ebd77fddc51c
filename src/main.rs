//! Gas monitor service entry point

use clap::{Parser, Subcommand};
use gasmon::config::MonitorConfig;
use gasmon::observability::{LogFormat, init_default_logging, init_logging, metrics::metrics};
use gasmon::service::GasMonitor;
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{Level, error, info};

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["gasmon.toml", "config/gasmon.toml"];

/// LPG gas concentration monitor with messaging alerts
#[derive(Parser)]
#[command(name = "gasmon")]
#[command(about = "Monitors LPG readings over MQTT and sends alerts to a messaging gateway")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace); ignored when LOG_LEVEL is set
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor until SIGINT/SIGTERM
    Run,
    /// Validate the configuration
    Config {
        /// Print the parsed configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_observability(cli.verbose);

    info!("Starting gasmon v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_monitor(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn init_observability(verbose: u8) {
    if verbose == 0 || std::env::var("LOG_LEVEL").is_ok() {
        init_default_logging();
        return;
    }

    let level = if verbose > 1 { Level::TRACE } else { Level::DEBUG };
    let format = LogFormat::parse(&std::env::var("LOG_FORMAT").unwrap_or_default());
    init_logging(level, format, false);
}

fn load_configuration(
    config_path: Option<&PathBuf>,
) -> Result<MonitorConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(MonitorConfig::load_from_file(path)?);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(MonitorConfig::load_from_file(&path)?);
        }
    }

    Err(format!(
        "No configuration file found. Provide one with -c/--config or create {}",
        DEFAULT_CONFIG_PATHS.join(" or ")
    )
    .into())
}

async fn run_monitor(config: MonitorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let collector = metrics();
    collector.set_monitor_state("initializing");

    let mut monitor = GasMonitor::from_config(config)?;
    monitor.start().await?;

    if let Some(addr) = monitor.status_addr() {
        info!("Status endpoints available at http://{}", addr);
    }

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    info!("Monitoring gas readings...");

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
        _ = monitor.wait_for_permanent_disconnect() => {
            error!("MQTT connection permanently lost, shutting down...");
        }
    }

    if let Err(e) = monitor.shutdown().await {
        error!("Error during shutdown: {}", e);
        collector.set_monitor_state("error");
        return Err(e.into());
    }

    Ok(())
}

fn handle_config_command(
    config: &MonitorConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
