use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pmoconfig::Config;
use pmogpio::RppalEdgeSource;
use pmompd::MpdClient;
use pmoradio::{
    RadioController, RadioError, RadioSettings, Station, Supervisor, SupervisorSettings,
};
use tokio::signal;
use tracing::{error, info, warn};

mod logging;

/// GPIO push-button radio driving a Music Player Daemon
#[derive(Parser, Debug)]
#[command(name = "pmoradio")]
#[command(about = "Front-panel buttons of a radio, wired to GPIO, driving MPD")]
#[command(version)]
struct Args {
    /// Configuration file (YAML, or JSON with a .json extension)
    #[arg(short, long, env = "PMORADIO_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, overrides the configured level (e.g. "debug")
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_config(args.config.as_deref())
        .context("Failed to load the configuration")?;
    logging::init_tracing(&config.get_logging(), args.log_level.as_deref());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config.path(),
        "Starting PMORadio"
    );

    // ========== MPD ==========
    let host = config.get_mpd_host();
    let port = config.get_mpd_port();
    let timeout = Duration::from_secs(config.get_mpd_timeout_secs().max(1));
    let player = MpdClient::connect(&host, port, timeout)
        .map_err(RadioError::from)
        .with_context(|| format!("Cannot reach MPD at {}:{}", host, port))?;
    info!(
        host = player.host(),
        port = player.port(),
        version = player.mpd_version(),
        "Using MPD"
    );

    // ========== GPIO ==========
    let edges = RppalEdgeSource::new()
        .map_err(RadioError::from)
        .context("Cannot access the GPIO (missing privileges?)")?;

    let stations: Vec<Station> = config
        .get_stations()
        .into_iter()
        .map(Station::from)
        .collect();

    let controller = RadioController::new(
        Arc::new(edges),
        Arc::new(player),
        stations,
        RadioSettings::from_config(&config),
    )
    .context("Failed to set up the radio buttons")?;

    let supervisor = Supervisor::new(
        Arc::new(controller),
        SupervisorSettings::from_config(&config),
    );
    let (heartbeats, failures) = supervisor.run(shutdown_signal()).await;

    if failures.is_empty() {
        info!(heartbeats, "PMORadio stopped");
    } else {
        warn!(
            heartbeats,
            failures = failures.len(),
            "PMORadio stopped, some resources were not released cleanly"
        );
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
