//! # Backpressure modes for subscriber queues.
//!
//! [`BackpressureMode`] decides what a subscriber queue keeps while nobody is
//! there to receive.
//!
//! - [`BackpressureMode::All`] every item is buffered (unbounded) and delivered in arrival order.
//! - [`BackpressureMode::Latest`] one slot; a newer item replaces the buffered one and
//!   preempts an in-flight delivery.
//!
//! ## Choosing the right mode
//! ```text
//! Commands / one-off effects (must not be lost)   → BackpressureMode::All
//! State snapshots, "refresh", "show current"      → BackpressureMode::Latest
//! ```

/// Retention policy for items that have not been delivered yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BackpressureMode {
    /// Unbounded buffer, strict arrival order, no preemption.
    All,
    /// Capacity 1, drop-oldest, newer item preempts the one in flight (default).
    #[default]
    Latest,
}

impl BackpressureMode {
    /// Maximum number of buffered (not yet taken) items, `None` for unbounded.
    #[inline]
    pub fn capacity(self) -> Option<usize> {
        match self {
            BackpressureMode::All => None,
            BackpressureMode::Latest => Some(1),
        }
    }

    /// True if a newer item interrupts the item currently in flight.
    #[inline]
    pub fn preempts(self) -> bool {
        matches!(self, BackpressureMode::Latest)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            BackpressureMode::All => "all",
            BackpressureMode::Latest => "latest",
        }
    }
}
