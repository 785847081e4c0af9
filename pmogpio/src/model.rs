use std::fmt;
use std::time::Instant;

/// Edge direction, both for what a subscription listens to and for what was
/// observed on the line (an observed edge is never `Both`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    /// True if an observed transition qualifies for a subscription on `self`.
    pub fn matches(self, observed: Edge) -> bool {
        match self {
            Edge::Both => observed != Edge::Both,
            wanted => wanted == observed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idle level of an input line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Pull {
    Up,
    #[default]
    Down,
    Off,
}

/// One logical (debounced) transition on a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeEvent {
    /// BCM channel number.
    pub channel: u8,
    pub edge: Edge,
    pub at: Instant,
}

/// Returned by [`EdgeSource::subscribe`](crate::EdgeSource::subscribe).
///
/// Subscriptions are released as a whole by `unsubscribe_all`; the handle
/// identifies what was registered, for logging and bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub(crate) id: u64,
    pub(crate) channel: u8,
    pub(crate) edge: Edge,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn edge(&self) -> Edge {
        self.edge
    }
}
