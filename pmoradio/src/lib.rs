//! # pmoradio
//!
//! Front-panel controls of a radio: four station buttons and an off switch
//! wired to GPIO inputs, driving a Music Player Daemon.
//!
//! - [`RadioController`] binds the configured stations to the buttons and
//!   turns each debounced edge into a playback command.
//! - [`Supervisor`] keeps the process alive with a heartbeat and tears the
//!   radio down once when asked to stop.
//!
//! ```no_run
//! use std::sync::Arc;
//! use pmogpio::SimulatedEdgeSource;
//! use pmompd::{MpdClient, DEFAULT_MPD_PORT, DEFAULT_TIMEOUT};
//! use pmoradio::{RadioController, RadioSettings, Station};
//!
//! let player = Arc::new(MpdClient::connect("localhost", DEFAULT_MPD_PORT, DEFAULT_TIMEOUT)?);
//! let edges = Arc::new(SimulatedEdgeSource::new());
//! let radio = RadioController::new(
//!     edges,
//!     player,
//!     vec![Station::new("Jazz", "jazz.mp3"), Station::new("News", "news.mp3")],
//!     RadioSettings::default(),
//! )?;
//! radio.teardown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod controller;
pub mod errors;
pub mod state;
pub mod station;
pub mod supervisor;

pub use controller::{RadioController, RadioSettings};
pub use errors::RadioError;
pub use state::{OffSwitchMode, RadioState};
pub use station::{OFF_CHANNEL, STATION_CHANNELS, Station, StationTable};
pub use supervisor::{Supervisor, SupervisorSettings};
