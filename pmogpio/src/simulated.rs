//! Software edge source.
//!
//! Behaves like the hardware backend (configuration precondition, edge
//! matching, debouncing, idempotent release) but transitions are injected
//! by the caller. Used by the test suites and for development away from
//! the board.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, info};

use crate::errors::GpioError;
use crate::model::{Edge, EdgeEvent, Pull, SubscriptionHandle};
use crate::source::{EdgeSource, SubscriptionTable};

pub struct SimulatedEdgeSource {
    hardware_available: bool,
    configured: Mutex<HashMap<u8, Pull>>,
    table: SubscriptionTable,
    released: AtomicBool,
    cleanups: AtomicUsize,
}

impl Default for SimulatedEdgeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEdgeSource {
    pub fn new() -> Self {
        Self {
            hardware_available: true,
            configured: Mutex::new(HashMap::new()),
            table: SubscriptionTable::new(),
            released: AtomicBool::new(false),
            cleanups: AtomicUsize::new(0),
        }
    }

    /// A source whose `configure` fails like a board without GPIO access.
    pub fn unavailable() -> Self {
        Self {
            hardware_available: false,
            ..Self::new()
        }
    }

    fn configured(&self) -> MutexGuard<'_, HashMap<u8, Pull>> {
        self.configured.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulates a physical transition on `channel` observed at `at`.
    ///
    /// Returns true if it produced an event.
    pub fn inject(&self, channel: u8, edge: Edge, at: Instant) -> bool {
        if edge == Edge::Both {
            debug!(channel, "A physical transition is either rising or falling");
            return false;
        }
        if !self.configured().contains_key(&channel) {
            debug!(channel, "Transition on an unconfigured channel ignored");
            return false;
        }
        self.table.dispatch(channel, edge, at)
    }

    /// Simulates a transition happening now.
    pub fn trigger(&self, channel: u8, edge: Edge) -> bool {
        self.inject(channel, edge, Instant::now())
    }

    pub fn is_configured(&self, channel: u8) -> bool {
        self.configured().contains_key(&channel)
    }

    pub fn pull(&self, channel: u8) -> Option<Pull> {
        self.configured().get(&channel).copied()
    }

    pub fn is_subscribed(&self, channel: u8) -> bool {
        self.table.contains(channel)
    }

    pub fn subscription_count(&self) -> usize {
        self.table.len()
    }

    /// Number of times the lines were actually released.
    pub fn cleanup_count(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

impl EdgeSource for SimulatedEdgeSource {
    fn configure(&self, channel: u8, pull: Pull) -> Result<(), GpioError> {
        if !self.hardware_available {
            return Err(GpioError::hardware_unavailable(
                "simulated GPIO facility configured as unavailable",
            ));
        }
        self.configured().insert(channel, pull);
        self.released.store(false, Ordering::SeqCst);
        debug!(channel, pull = ?pull, "Simulated channel configured as input");
        Ok(())
    }

    fn subscribe(
        &self,
        channel: u8,
        edge: Edge,
        debounce: Duration,
        sink: Sender<EdgeEvent>,
    ) -> Result<SubscriptionHandle, GpioError> {
        if !self.is_configured(channel) {
            return Err(GpioError::ChannelNotConfigured(channel));
        }
        self.table.insert(channel, edge, debounce, sink)
    }

    fn unsubscribe_all(&self) -> Result<(), GpioError> {
        let removed = self.table.clear();
        if removed > 0 {
            debug!(removed, "Simulated edge subscriptions removed");
        }
        Ok(())
    }

    fn cleanup(&self) -> Result<(), GpioError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.table.clear();
        self.configured().clear();
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        info!("Simulated GPIO released");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "simulated"
    }
}
