use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::capabilities::{PlaybackControl, PlayerInfo, PlayerStatus};
use crate::errors::MpdError;
use crate::protocol::{Session, format_command};

pub const DEFAULT_MPD_PORT: u16 = 6600;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Ready,
    TornDown,
}

/// Client for a Music Player Daemon.
///
/// Each operation opens its own connection, runs, and closes it again, so
/// no session can go stale between two button presses. A mutex serialises
/// the operations: at most one command is in flight.
#[derive(Debug)]
pub struct MpdClient {
    host: String,
    port: u16,
    timeout: Duration,
    version: String,
    state: Mutex<ClientState>,
}

impl MpdClient {
    /// Checks that the daemon answers and records its protocol version.
    ///
    /// Fails with [`MpdError::ServiceUnreachable`]; no retry is attempted.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, MpdError> {
        let session = Session::open(host, port, timeout)?;
        let version = session.version().to_string();
        session.close();

        info!(host, port, version = %version, "MPD reachable");
        Ok(Self {
            host: host.to_string(),
            port,
            timeout,
            version,
            state: Mutex::new(ClientState::Ready),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn mpd_version(&self) -> &str {
        &self.version
    }

    pub fn is_torn_down(&self) -> bool {
        *self.state() == ClientState::TornDown
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `op` on a fresh session while holding the client lock.
    fn with_session<T>(
        &self,
        op: &str,
        f: impl FnOnce(&mut Session) -> Result<T, MpdError>,
    ) -> Result<T, MpdError> {
        let state = self.state();
        if *state == ClientState::TornDown {
            return Err(MpdError::SessionClosed);
        }

        let mut session = Session::open(&self.host, self.port, self.timeout)?;
        let result = f(&mut session);
        session.close();
        drop(state);

        if let Err(err) = &result {
            debug!(operation = op, "MPD operation failed: {}", err);
        }
        result
    }
}

fn stop_commands() -> Vec<String> {
    vec!["stop".to_string(), "clear".to_string()]
}

impl PlaybackControl for MpdClient {
    fn stop(&self) -> Result<(), MpdError> {
        debug!("stop playback and clear the queue");
        self.with_session("stop", |session| session.command_list(&stop_commands()))
    }

    fn play(&self, uri: &str) -> Result<(), MpdError> {
        debug!(uri, "play");
        let mut commands = stop_commands();
        commands.push(format_command("add", &[uri])?);
        commands.push("play".to_string());
        self.with_session("play", |session| session.command_list(&commands))
    }

    fn pause(&self, paused: bool) -> Result<(), MpdError> {
        debug!(paused, "pause");
        let flag = if paused { "1" } else { "0" };
        self.with_session("pause", |session| {
            session.command("pause", &[flag]).map(|_| ())
        })
    }

    fn info(&self) -> Result<PlayerInfo, MpdError> {
        self.with_session("info", |session| {
            let status = session.command("status", &[])?;
            let stats = session.command("stats", &[])?;
            let current_song = session.command("currentsong", &[])?;
            Ok(PlayerInfo {
                status: PlayerStatus::from_pairs(status),
                stats,
                current_song,
            })
        })
    }

    fn teardown(&self) -> Result<(), MpdError> {
        let mut state = self.state();
        if *state == ClientState::TornDown {
            debug!("MPD client already torn down");
            return Ok(());
        }
        // Unusable from now on, whatever happens below
        *state = ClientState::TornDown;

        debug!("teardown");
        let mut session = Session::open(&self.host, self.port, self.timeout)?;
        let result = session.command_list(&stop_commands());
        session.close();

        if let Err(err) = &result {
            warn!("MPD teardown could not stop playback: {}", err);
        }
        result
    }

    fn version(&self) -> &str {
        &self.version
    }
}
