use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pmoconfig::Config;
use pmompd::{PlaybackControl, PlayerInfo, describe_pairs};
use tokio::task;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::controller::RadioController;
use crate::errors::RadioError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub heartbeat: Duration,
    /// Query the player on every heartbeat.
    pub status_polling: bool,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(300),
            status_polling: true,
        }
    }
}

impl SupervisorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            heartbeat: Duration::from_secs(config.get_heartbeat_secs().max(1)),
            status_polling: config.get_status_polling(),
        }
    }
}

/// Keeps the process alive around a running [`RadioController`].
///
/// The heartbeat only reads from the player; it never changes the radio.
pub struct Supervisor {
    controller: Arc<RadioController>,
    settings: SupervisorSettings,
}

impl Supervisor {
    pub fn new(controller: Arc<RadioController>, settings: SupervisorSettings) -> Self {
        Self {
            controller,
            settings,
        }
    }

    pub fn controller(&self) -> &Arc<RadioController> {
        &self.controller
    }

    /// Runs until `shutdown` resolves, then tears the radio down once.
    ///
    /// Returns the number of heartbeats and the teardown failures.
    pub async fn run<F>(self, shutdown: F) -> (u64, Vec<RadioError>)
    where
        F: Future<Output = ()>,
    {
        let player = self.controller.player();
        info!(version = player.version(), "MPD version");

        tokio::pin!(shutdown);
        // Une requête d'état bloquée ne doit pas retarder l'arrêt
        let mut stopping = tokio::select! {
            _ = &mut shutdown => true,
            _ = log_status(Arc::clone(&player)) => false,
        };

        let mut ticker = time::interval(self.settings.heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Le premier tick est immédiat
        ticker.tick().await;

        info!(
            heartbeat_secs = self.settings.heartbeat.as_secs_f64(),
            "Radio running"
        );

        let mut heartbeats = 0u64;
        while !stopping {
            tokio::select! {
                _ = &mut shutdown => stopping = true,
                _ = ticker.tick() => {
                    heartbeats += 1;
                    info!(state = %self.controller.state(), "still alive...");
                    if self.settings.status_polling {
                        stopping = tokio::select! {
                            _ = &mut shutdown => true,
                            _ = log_status(Arc::clone(&player)) => false,
                        };
                    }
                }
            }
        }

        info!("Shutdown requested");
        let controller = Arc::clone(&self.controller);
        let failures = match task::spawn_blocking(move || controller.teardown()).await {
            Ok(failures) => failures,
            Err(err) => vec![RadioError::teardown_error("teardown task", err)],
        };

        if failures.is_empty() {
            info!("Radio stopped");
        } else {
            warn!(failures = failures.len(), "Radio stopped with errors");
        }
        (heartbeats, failures)
    }
}

/// Logs a status snapshot; the blocking query runs off the runtime threads.
///
/// Dropping the future abandons the result, the query itself finishes in
/// the background.
async fn log_status(player: Arc<dyn PlaybackControl>) {
    match task::spawn_blocking(move || player.info()).await {
        Ok(Ok(info)) => report(&info),
        Ok(Err(err)) => warn!("Cannot read MPD status: {}", RadioError::from(err)),
        Err(err) => warn!("MPD status task failed: {}", err),
    }
}

fn report(info: &PlayerInfo) {
    info!(
        state = %info.status.state,
        volume = ?info.status.volume,
        elapsed = ?info.status.elapsed,
        current = info.current_title().unwrap_or("-"),
        "MPD status"
    );
    debug!("status: {}", describe_pairs(&info.status.raw));
    debug!("stats: {}", describe_pairs(&info.stats));
    debug!("current song: {}", describe_pairs(&info.current_song));
}
