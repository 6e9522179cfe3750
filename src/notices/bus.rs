//! # Notice bus for broadcasting runtime notices.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking publishing from every queue loop, topic and survey of a hub.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                   Listeners:
//!   queue loop 1 ──┐
//!   queue loop 2 ──┼──────► Bus ───┬──► observer listener ────► ObserverSet
//!   Poll::ask    ──┤  (broadcast)  └──► Hub::subscribe() receivers
//!   Topic        ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent notices for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: notices are lost if there are no receivers at send time.

use tokio::sync::broadcast;

use super::notice::Notice;

/// Broadcast channel for runtime notices.
///
/// Cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Notice>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Notice>(capacity);
        Self { tx }
    }

    /// Publishes a notice to all current receivers.
    ///
    /// If there are no receivers, the notice is dropped.
    pub fn publish(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }

    /// Creates a new receiver that will observe subsequent notices.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}
