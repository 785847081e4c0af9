use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, trace};

use crate::debounce::Debouncer;
use crate::errors::GpioError;
use crate::model::{Edge, EdgeEvent, Pull, SubscriptionHandle};

/// Edge-triggered input lines.
///
/// Events are delivered by message passing: each qualifying transition
/// (after debouncing) is sent as an [`EdgeEvent`] on the `sink` given at
/// subscription time. Delivery happens on the backend's own thread, never on
/// the caller's stack.
pub trait EdgeSource: Send + Sync {
    /// Declares `channel` as an input with the given idle level. Must be
    /// called before [`subscribe`](EdgeSource::subscribe).
    fn configure(&self, channel: u8, pull: Pull) -> Result<(), GpioError>;

    /// Registers `sink` for transitions matching `edge` on `channel`.
    ///
    /// At most one event per `debounce` window is sent for the channel.
    fn subscribe(
        &self,
        channel: u8,
        edge: Edge,
        debounce: Duration,
        sink: Sender<EdgeEvent>,
    ) -> Result<SubscriptionHandle, GpioError>;

    /// Stops all event delivery. Idempotent.
    fn unsubscribe_all(&self) -> Result<(), GpioError>;

    /// Releases every configured line. Idempotent.
    fn cleanup(&self) -> Result<(), GpioError>;

    /// Short label for logs.
    fn backend_name(&self) -> &'static str;
}

struct Subscription {
    id: u64,
    edge: Edge,
    debouncer: Debouncer,
    sink: Sender<EdgeEvent>,
}

/// Subscription bookkeeping shared by the backends.
///
/// Backends only report raw transitions through [`dispatch`](Self::dispatch);
/// edge filtering, debouncing and delivery live here.
#[derive(Default)]
pub(crate) struct SubscriptionTable {
    entries: Mutex<HashMap<u8, Subscription>>,
    next_id: AtomicU64,
}

impl SubscriptionTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u8, Subscription>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(
        &self,
        channel: u8,
        edge: Edge,
        debounce: Duration,
        sink: Sender<EdgeEvent>,
    ) -> Result<SubscriptionHandle, GpioError> {
        let mut entries = self.entries();
        if entries.contains_key(&channel) {
            return Err(GpioError::AlreadySubscribed(channel));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        entries.insert(
            channel,
            Subscription {
                id,
                edge,
                debouncer: Debouncer::new(debounce),
                sink,
            },
        );

        Ok(SubscriptionHandle { id, channel, edge })
    }

    pub(crate) fn remove(&self, channel: u8) {
        self.entries().remove(&channel);
    }

    /// Handles one raw transition. Returns true if an event was delivered.
    pub(crate) fn dispatch(&self, channel: u8, observed: Edge, at: Instant) -> bool {
        let mut entries = self.entries();
        let Some(subscription) = entries.get_mut(&channel) else {
            trace!(channel, edge = %observed, "No subscription, transition ignored");
            return false;
        };

        if !subscription.edge.matches(observed) {
            trace!(channel, edge = %observed, "Edge does not match subscription");
            return false;
        }

        if !subscription.debouncer.accept(at) {
            debug!(
                channel,
                edge = %observed,
                window_ms = subscription.debouncer.window().as_millis() as u64,
                "Bounce suppressed"
            );
            return false;
        }

        let event = EdgeEvent {
            channel,
            edge: observed,
            at,
        };
        match subscription.sink.send(event) {
            Ok(()) => {
                debug!(channel, edge = %observed, subscription = subscription.id, "Edge event dispatched");
                true
            }
            Err(_) => {
                debug!(channel, "Edge event receiver dropped");
                false
            }
        }
    }

    /// Drops every subscription (and its sender). Returns how many there were.
    pub(crate) fn clear(&self) -> usize {
        let mut entries = self.entries();
        let count = entries.len();
        entries.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }

    pub(crate) fn contains(&self, channel: u8) -> bool {
        self.entries().contains_key(&channel)
    }
}
