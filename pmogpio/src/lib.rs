//! # pmogpio
//!
//! Edge-triggered push buttons for PMORadio.
//!
//! An [`EdgeSource`] turns electrical transitions on input lines into
//! [`EdgeEvent`] messages sent on a `crossbeam_channel`, one per debounced
//! transition:
//!
//! ```
//! use std::time::Duration;
//! use pmogpio::{Edge, EdgeSource, Pull, SimulatedEdgeSource};
//!
//! let source = SimulatedEdgeSource::new();
//! let (tx, rx) = crossbeam_channel::unbounded();
//!
//! source.configure(5, Pull::Down)?;
//! source.subscribe(5, Edge::Rising, Duration::from_millis(300), tx)?;
//!
//! source.trigger(5, Edge::Rising);
//! source.trigger(5, Edge::Rising); // bounce
//!
//! assert_eq!(rx.try_iter().count(), 1);
//! # Ok::<(), pmogpio::GpioError>(())
//! ```
//!
//! With the `rpi` feature, [`RppalEdgeSource`] drives the real pins of a
//! Raspberry Pi (BCM numbering).

mod debounce;
mod source;

pub mod errors;
pub mod model;
pub mod simulated;

#[cfg(feature = "rpi")]
pub mod rppal_source;

pub use debounce::Debouncer;
pub use errors::GpioError;
pub use model::{Edge, EdgeEvent, Pull, SubscriptionHandle};
pub use simulated::SimulatedEdgeSource;
pub use source::EdgeSource;

#[cfg(feature = "rpi")]
pub use rppal_source::RppalEdgeSource;
