use std::fmt;
use std::str::FromStr;

use pmogpio::Edge;

use crate::errors::RadioError;
use crate::station::Station;

/// What the radio believes it is doing.
///
/// Derived from the last command issued; never read back from the
/// playback service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RadioState {
    #[default]
    Idle,
    Playing(Station),
    Paused(Station),
}

impl RadioState {
    pub fn station(&self) -> Option<&Station> {
        match self {
            RadioState::Idle => None,
            RadioState::Playing(station) | RadioState::Paused(station) => Some(station),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, RadioState::Playing(_))
    }
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioState::Idle => f.write_str("idle"),
            RadioState::Playing(station) => write!(f, "playing {}", station.name),
            RadioState::Paused(station) => write!(f, "paused {}", station.name),
        }
    }
}

/// Behaviour of the off switch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OffSwitchMode {
    /// Falling edge: stop playback and clear the queue.
    #[default]
    Stop,
    /// Both edges: flip the paused flag.
    PauseToggle,
}

impl OffSwitchMode {
    /// Edge the off channel is subscribed on.
    pub fn edge(&self) -> Edge {
        match self {
            OffSwitchMode::Stop => Edge::Falling,
            OffSwitchMode::PauseToggle => Edge::Both,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OffSwitchMode::Stop => "stop",
            OffSwitchMode::PauseToggle => "pause_toggle",
        }
    }
}

impl FromStr for OffSwitchMode {
    type Err = RadioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stop" => Ok(OffSwitchMode::Stop),
            "pause_toggle" | "pause" | "toggle" => Ok(OffSwitchMode::PauseToggle),
            _ => Err(RadioError::InvalidOffSwitchMode(s.to_string())),
        }
    }
}

impl fmt::Display for OffSwitchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_switch_mode_parsing() {
        assert_eq!("stop".parse::<OffSwitchMode>().unwrap(), OffSwitchMode::Stop);
        assert_eq!(
            "Pause-Toggle".parse::<OffSwitchMode>().unwrap(),
            OffSwitchMode::PauseToggle
        );
        assert!(matches!(
            "explode".parse::<OffSwitchMode>(),
            Err(RadioError::InvalidOffSwitchMode(_))
        ));
    }

    #[test]
    fn off_switch_edges() {
        assert_eq!(OffSwitchMode::Stop.edge(), Edge::Falling);
        assert_eq!(OffSwitchMode::PauseToggle.edge(), Edge::Both);
    }

    #[test]
    fn state_exposes_its_station() {
        let jazz = Station::new("Jazz", "jazz.mp3");
        assert_eq!(RadioState::Idle.station(), None);
        assert_eq!(RadioState::Paused(jazz.clone()).station(), Some(&jazz));
        assert!(RadioState::Playing(jazz.clone()).is_playing());
        assert_eq!(RadioState::Playing(jazz).to_string(), "playing Jazz");
    }
}
