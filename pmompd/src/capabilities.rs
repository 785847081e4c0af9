use std::fmt;

use crate::errors::MpdError;
use crate::protocol::{Pairs, find};

/// High-level playback state reported by the daemon.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    #[default]
    Stopped,
    /// Anything else the daemon may answer.
    Unknown(String),
}

impl PlaybackState {
    /// Maps the `state` field of the `status` response.
    pub fn from_mpd_state(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "play" => PlaybackState::Playing,
            "pause" => PlaybackState::Paused,
            "stop" => PlaybackState::Stopped,
            _ => PlaybackState::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PlaybackState::Playing => "PLAYING",
            PlaybackState::Paused => "PAUSED",
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::Unknown(s) => s.as_str(),
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `status` response. `raw` keeps every field for logging.
#[derive(Clone, Debug, Default)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub volume: Option<u8>,
    pub playlist_length: Option<u32>,
    pub song: Option<u32>,
    pub elapsed: Option<f64>,
    pub raw: Pairs,
}

impl PlayerStatus {
    pub fn from_pairs(pairs: Pairs) -> Self {
        let state = find(&pairs, "state")
            .map(PlaybackState::from_mpd_state)
            .unwrap_or_default();
        // MPD reports volume -1 when no mixer is available
        let volume = find(&pairs, "volume").and_then(|v| v.parse::<u8>().ok());
        let playlist_length = find(&pairs, "playlistlength").and_then(|v| v.parse().ok());
        let song = find(&pairs, "song").and_then(|v| v.parse().ok());
        let elapsed = find(&pairs, "elapsed").and_then(|v| v.parse().ok());

        Self {
            state,
            volume,
            playlist_length,
            song,
            elapsed,
            raw: pairs,
        }
    }
}

/// Diagnostic snapshot: `status`, `stats` and `currentsong`.
///
/// Only ever logged, never used to take a decision.
#[derive(Clone, Debug, Default)]
pub struct PlayerInfo {
    pub status: PlayerStatus,
    pub stats: Pairs,
    pub current_song: Pairs,
}

impl PlayerInfo {
    pub fn current_title(&self) -> Option<&str> {
        find(&self.current_song, "title")
            .or_else(|| find(&self.current_song, "name"))
            .or_else(|| find(&self.current_song, "file"))
    }
}

/// Renders response pairs as `key=value, key=value`.
pub fn describe_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Playback operations the radio needs from the music service.
///
/// Every operation leaves the service in a consistent state: the
/// implementation serialises them, so at most one is in flight.
pub trait PlaybackControl: Send + Sync {
    /// Halts playback and clears the queue. A no-op when nothing plays.
    fn stop(&self) -> Result<(), MpdError>;

    /// Replaces the queue with `uri` and starts playing it.
    fn play(&self, uri: &str) -> Result<(), MpdError>;

    /// Sets the paused flag explicitly (not a server-side toggle).
    fn pause(&self, paused: bool) -> Result<(), MpdError>;

    /// Read-only snapshot for the logs.
    fn info(&self) -> Result<PlayerInfo, MpdError>;

    /// Stops, clears and releases the session. Idempotent; every other
    /// operation fails with [`MpdError::SessionClosed`] afterwards.
    fn teardown(&self) -> Result<(), MpdError>;

    /// Protocol version announced by the service.
    fn version(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Pairs {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn status_is_parsed() {
        let status = PlayerStatus::from_pairs(pairs(&[
            ("volume", "80"),
            ("state", "play"),
            ("playlistlength", "1"),
            ("song", "0"),
            ("elapsed", "12.5"),
        ]));
        assert_eq!(status.state, PlaybackState::Playing);
        assert_eq!(status.volume, Some(80));
        assert_eq!(status.playlist_length, Some(1));
        assert_eq!(status.song, Some(0));
        assert_eq!(status.elapsed, Some(12.5));
        assert_eq!(status.raw.len(), 5);
    }

    #[test]
    fn missing_mixer_gives_no_volume() {
        let status = PlayerStatus::from_pairs(pairs(&[("volume", "-1"), ("state", "stop")]));
        assert_eq!(status.volume, None);
        assert_eq!(status.state, PlaybackState::Stopped);
    }

    #[test]
    fn unknown_state_is_kept() {
        assert_eq!(
            PlaybackState::from_mpd_state("buffering"),
            PlaybackState::Unknown("buffering".into())
        );
    }

    #[test]
    fn current_title_falls_back_to_name_then_file() {
        let mut info = PlayerInfo::default();
        assert_eq!(info.current_title(), None);
        info.current_song = pairs(&[("file", "jazz.mp3"), ("Name", "Jazz FM")]);
        assert_eq!(info.current_title(), Some("Jazz FM"));
    }

    #[test]
    fn pairs_are_described_in_order() {
        assert_eq!(
            describe_pairs(&pairs(&[("state", "stop"), ("volume", "10")])),
            "state=stop, volume=10"
        );
    }
}
