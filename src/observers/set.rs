//! # Non-blocking notice fan-out to observers.
//!
//! ```text
//! emit(notice)
//!     ├──► [queue 1] ──► worker 1 ──► observer1.on_notice()
//!     │    (bounded)         └──────► panic → ObserverPanicked
//!     └──► [queue N] ──► worker N ──► observerN.on_notice()
//! ```
//!
//! ## Rules
//! - `emit()` never waits (`try_send`); a full queue drops the notice for that observer
//!   only and publishes `ObserverOverflow` (never for an overflow notice itself).
//! - Per-observer FIFO; no ordering across observers.
//! - A panicking observer is reported and keeps receiving notices.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::Observe;
use crate::delivery::queue::panic_message;
use crate::notices::{Bus, Notice};

struct ObserverChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Notice>>,
}

/// Fan-out of notices to observer workers.
pub struct ObserverSet {
    channels: Vec<ObserverChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl ObserverSet {
    /// Spawns one worker per observer.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(observers.len());
        let mut workers = Vec::with_capacity(observers.len());

        for observer in observers {
            let name = observer.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Notice>>(observer.queue_capacity().max(1));
            let worker_bus = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(notice) = rx.recv().await {
                    let fut = observer.on_notice(notice.as_ref());
                    if let Err(payload) = AssertUnwindSafe(fut).catch_unwind().await {
                        let info = panic_message(payload.as_ref());
                        warn!(observer = name, %info, "observer panicked");
                        worker_bus.publish(Notice::observer_panicked(name, info));
                    }
                }
            });
            channels.push(ObserverChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Number of observers.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True if there is no observer.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Hands `notice` to every observer queue.
    pub fn emit(&self, notice: Notice) {
        let notice = Arc::new(notice);
        let is_overflow = notice.is_observer_overflow();

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&notice)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow {
                warn!(observer = channel.name, reason, "observer queue overflow");
                self.bus
                    .publish(Notice::observer_overflow(channel.name, reason));
            }
        }
    }

    /// Closes every queue and waits for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.channels);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
