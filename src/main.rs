//! mqconn - Main Entry Point
//!
//! Loads the broker configuration, keeps a managed connection open until the
//! process is asked to stop, and cleanly joins the connection workers.

use clap::{Parser, Subcommand};
use mqconn::config::MqConfig;
use mqconn::observability::init_default_logging;
use mqconn::transport::MqttTransport;
use mqconn::{ConnResult, ConnectionManager};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Self-healing broker connection manager
#[derive(Parser)]
#[command(name = "mqconn")]
#[command(about = "Maintain a managed connection to a message broker")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to MQ_* environment variables)
    #[arg(short, long, value_name = "FILE", env = "MQ_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and keep the connection managed until interrupted
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration (password redacted)
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting mqconn v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(path: Option<&std::path::Path>) -> ConnResult<MqConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            MqConfig::load_from_file(path)?
        }
        None => MqConfig::from_env()?,
    };
    Ok(config)
}

async fn run(config: MqConfig) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone())?;

    let manager = ConnectionManager::new(config, MqttTransport::new());
    manager.manage_connection_async(&cancel)?;

    // Open one session up front so a bad broker or credentials show up immediately
    match manager.get_session(&cancel).await {
        Ok(session) => info!(
            session_id = %session.id(),
            connection_id = %session.connection_id(),
            "MQ session opened"
        ),
        Err(e) if cancel.is_cancelled() => info!("Interrupted before connecting: {}", e),
        Err(e) => {
            cancel.cancel();
            manager.wait_stopped().await;
            return Err(e.into());
        }
    }

    // Redial whenever the live connection drops
    loop {
        let connection = match manager.get_connection(&cancel).await {
            Ok(connection) => connection,
            Err(_) if cancel.is_cancelled() => break,
            Err(e) => {
                error!("MQ connection unavailable: {}", e);
                let pause = manager.config().connect_delay().max(Duration::from_secs(1));
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => continue,
                }
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = connection.closed() => {
                info!(connection_id = %connection.id(), "MQ connection lost; reconnecting");
                manager.reconnect(&cancel).await;
            }
        }
    }

    info!("Application shutdown initiated");
    if let Ok(connection) = manager.current_state().into_result() {
        let _ = connection.disconnect().await;
    }
    manager.wait_stopped().await;
    Ok(())
}

/// Cancel the token on SIGINT or SIGTERM
fn cancel_on_signal(cancel: CancellationToken) -> Result<(), std::io::Error> {
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
        cancel.cancel();
    });
    Ok(())
}

fn handle_config_command(config: &MqConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config.redacted())?);
    }

    info!("Configuration validation complete");
    Ok(())
}
