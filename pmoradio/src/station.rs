use std::fmt;

use pmoconfig::StationConfig;
use tracing::{info, warn};

/// BCM channels of the station buttons, from left to right.
pub const STATION_CHANNELS: [u8; 4] = [5, 6, 13, 19];

/// BCM channel of the off switch.
pub const OFF_CHANNEL: u8 = 17;

/// A preset: what one station button plays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Station {
    pub name: String,
    pub uri: String,
}

impl Station {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
        }
    }
}

impl From<StationConfig> for Station {
    fn from(config: StationConfig) -> Self {
        Self {
            name: config.name,
            uri: config.uri,
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.name, self.uri)
    }
}

/// Channel → station bindings. Built once, read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct StationTable {
    entries: Vec<(u8, Station)>,
}

impl StationTable {
    /// Binds the stations to [`STATION_CHANNELS`] in configuration order.
    ///
    /// Stations beyond the fourth are returned as dropped; this is not an
    /// error, only a warning.
    pub fn build(stations: Vec<Station>) -> (Self, Vec<Station>) {
        let max = STATION_CHANNELS.len();
        if stations.len() > max {
            warn!(
                configured = stations.len(),
                "More than {} stations defined, only the first {} are set up",
                max,
                max
            );
        } else if stations.len() < max {
            warn!(
                configured = stations.len(),
                "Less than {} stations defined, buttons are bound from left to right",
                max
            );
        }

        let mut stations = stations.into_iter();
        let entries: Vec<(u8, Station)> = STATION_CHANNELS
            .iter()
            .copied()
            .zip(stations.by_ref())
            .collect();
        let dropped: Vec<Station> = stations.collect();

        for (channel, station) in &entries {
            info!(channel, station = %station.name, "Station bound");
        }
        for station in &dropped {
            warn!(station = %station.name, "Station dropped, no button left for it");
        }

        (Self { entries }, dropped)
    }

    pub fn get(&self, channel: u8) -> Option<&Station> {
        self.entries
            .iter()
            .find(|(ch, _)| *ch == channel)
            .map(|(_, station)| station)
    }

    pub fn channels(&self) -> impl Iterator<Item = u8> + '_ {
        self.entries.iter().map(|(channel, _)| *channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &Station)> {
        self.entries.iter().map(|(channel, station)| (*channel, station))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
