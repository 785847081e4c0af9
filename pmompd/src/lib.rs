//! # pmompd
//!
//! Minimal Music Player Daemon client for PMORadio: replace the queue with
//! one URI and play it, stop, pause, and read a status snapshot.
//!
//! The [`PlaybackControl`] trait is what the radio controller talks to;
//! [`MpdClient`] implements it over the MPD text protocol.
//!
//! ```no_run
//! use pmompd::{MpdClient, PlaybackControl, DEFAULT_TIMEOUT};
//!
//! let client = MpdClient::connect("localhost", 6600, DEFAULT_TIMEOUT)?;
//! println!("MPD {}", client.mpd_version());
//! client.play("http://radio.example.org/jazz.mp3")?;
//! client.stop()?;
//! client.teardown()?;
//! # Ok::<(), pmompd::MpdError>(())
//! ```

pub mod capabilities;
pub mod client;
pub mod errors;
pub mod protocol;

pub use capabilities::{
    PlaybackControl, PlaybackState, PlayerInfo, PlayerStatus, describe_pairs,
};
pub use client::{DEFAULT_MPD_PORT, DEFAULT_TIMEOUT, MpdClient};
pub use errors::MpdError;
