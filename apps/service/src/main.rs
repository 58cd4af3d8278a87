use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sitewatch::{MetricsRecorder, ShutdownTrigger, shutdown};
use tokio::signal;
use tracing::{debug, error, info, warn};

mod adapters;
mod config;
mod error;
mod metrics;
mod modes;
mod routes;
mod server;

use config::Config;
use metrics::PrometheusMetrics;

#[derive(Debug, Parser)]
#[command(version, about = "HTTP uptime checker and alerter")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "SITEWATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Probe targets on schedule and publish results to Redis
    Checker,
    /// Consume results from Redis and send alerts
    Alert,
    /// Run checker and alerter in one process without external services
    Standalone,
    /// Print the effective configuration and exit
    PrintConfig,
}

/// Flip the shutdown signal on Ctrl-C or SIGTERM
async fn wait_for_signal(trigger: ShutdownTrigger) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
    trigger.trigger();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref()).context("failed to load configuration")?;

    if let Command::PrintConfig = cli.command {
        println!("{config}");
        return Ok(());
    }
    debug!("{config}");

    let prometheus = PrometheusMetrics::new().context("failed to register metrics")?;
    let recorder: Arc<dyn MetricsRecorder> = Arc::new(prometheus.clone());

    let (trigger, shutdown) = shutdown::channel();
    let endpoint = if config.server.enabled {
        let server = server::bind(&config.server.bind, prometheus)
            .context("failed to start operational endpoint")?;
        Some(tokio::spawn(server::serve(server, shutdown.clone())))
    } else {
        None
    };
    tokio::spawn(wait_for_signal(trigger));

    let outcome = match cli.command {
        Command::Checker => modes::run_checker(&config, recorder, shutdown).await,
        Command::Alert => modes::run_alert(&config, recorder, shutdown).await,
        Command::Standalone => modes::run_standalone(&config, recorder, shutdown).await,
        Command::PrintConfig => Ok(()),
    };

    if let Some(endpoint) = endpoint {
        // the endpoint only stops on the shutdown signal
        if outcome.is_err() {
            endpoint.abort();
        } else if let Ok(Err(e)) = endpoint.await {
            error!(error = %e, "Operational endpoint failed");
        }
    }

    outcome?;
    info!("Shutdown complete");
    Ok(())
}
