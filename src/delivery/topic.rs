//! # Topic: fan-out table of subscriber queues.
//!
//! A [`Topic`] maps each live retained identity to its [`SubscriberQueue`].
//! The table is touched under one mutex; delivery never holds it.
//!
//! ```text
//! post(item) ──► lock ─► snapshot [q1, q2, q3] ─► unlock ─► q.offer(item.clone()) for each
//!
//! queue_for(identity) ──► existing queue, or spawn + register on_invalidated
//! identity.invalidate() ──► remove_on_invalidated(id) ──► queue.dispose()
//! ```
//!
//! ## Rules
//! - Exactly one queue per (topic, live identity).
//! - An existing queue is reused whatever mode the new binding asks for.
//! - Invalidation callbacks hold a weak reference; a dropped topic disposes its queues.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use super::queue::{DiscardHook, QueueScope, SubscriberQueue};
use crate::host::{CallbackId, IdentityId, RetainedIdentity};
use crate::notices::Bus;
use crate::policies::BackpressureMode;

/// Global counter for topic ids.
static TOPIC_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identifier of one event or survey topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicId(u64);

impl TopicId {
    /// Wraps a raw id (useful in tests and log correlation).
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn next() -> Self {
        Self(TOPIC_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "topic#{}", self.0)
    }
}

struct Entry<I> {
    queue: Arc<SubscriberQueue<I>>,
    identity: RetainedIdentity,
    callback: Option<CallbackId>,
}

struct TopicInner<I> {
    id: TopicId,
    bus: Bus,
    discard: Option<DiscardHook<I>>,
    queues: Mutex<HashMap<IdentityId, Entry<I>>>,
}

/// Shared handle to a topic's queue table.
pub(crate) struct Topic<I> {
    inner: Arc<TopicInner<I>>,
}

impl<I> Clone for Topic<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I> Topic<I>
where
    I: Clone + Send + 'static,
{
    pub(crate) fn new(bus: Bus, discard: Option<DiscardHook<I>>) -> Self {
        Self {
            inner: Arc::new(TopicInner {
                id: TopicId::next(),
                bus,
                discard,
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn id(&self) -> TopicId {
        self.inner.id
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Copies the current queues; the lock is released before returning.
    pub(crate) fn snapshot(&self) -> Vec<Arc<SubscriberQueue<I>>> {
        self.inner
            .queues
            .lock()
            .values()
            .map(|e| Arc::clone(&e.queue))
            .collect()
    }

    /// Offers `item` to every queue present now. Returns how many got it.
    pub(crate) fn offer_all(&self, item: I) -> usize {
        let queues = self.snapshot();
        for queue in &queues {
            queue.offer(item.clone());
        }
        queues.len()
    }

    /// Number of live queues.
    pub(crate) fn len(&self) -> usize {
        self.inner.queues.lock().len()
    }

    /// Returns the queue for `identity`, creating it on first use.
    ///
    /// `None` if the identity is (or just became) invalidated.
    pub(crate) fn queue_for(
        &self,
        identity: &RetainedIdentity,
        mode: BackpressureMode,
    ) -> Option<Arc<SubscriberQueue<I>>> {
        if identity.is_invalidated() {
            return None;
        }
        let key = identity.id();
        let queue = {
            let mut queues = self.inner.queues.lock();
            if let Some(entry) = queues.get(&key) {
                if entry.queue.mode() != mode {
                    trace!(
                        topic = %self.inner.id,
                        identity = %key,
                        kept = entry.queue.mode().as_label(),
                        "reusing queue with its original mode"
                    );
                }
                return Some(Arc::clone(&entry.queue));
            }
            let scope = QueueScope {
                topic: self.inner.id,
                identity: key,
                bus: self.inner.bus.clone(),
            };
            let queue = Arc::new(SubscriberQueue::spawn(
                mode,
                scope,
                self.inner.discard.clone(),
            ));
            queues.insert(
                key,
                Entry {
                    queue: Arc::clone(&queue),
                    identity: identity.clone(),
                    callback: None,
                },
            );
            queue
        };

        // registered outside the table lock: it may fire right away
        let weak: Weak<TopicInner<I>> = Arc::downgrade(&self.inner);
        let callback = identity.on_invalidated(move |id| {
            if let Some(inner) = weak.upgrade() {
                Topic { inner }.remove_on_invalidated(id);
            }
        });
        if let Some(entry) = self.inner.queues.lock().get_mut(&key) {
            entry.callback = callback;
        }

        if queue.is_disposed() {
            None
        } else {
            Some(queue)
        }
    }

    /// Removes and disposes the queue of an invalidated identity.
    pub(crate) fn remove_on_invalidated(&self, identity: IdentityId) -> bool {
        let removed = self.inner.queues.lock().remove(&identity);
        match removed {
            Some(entry) => {
                trace!(topic = %self.inner.id, %identity, "identity invalidated, dropping queue");
                entry.queue.dispose();
                true
            }
            None => false,
        }
    }
}

impl<I> Drop for TopicInner<I> {
    fn drop(&mut self) {
        for (_, entry) in self.queues.get_mut().drain() {
            if let Some(callback) = entry.callback {
                entry.identity.remove_callback(callback);
            }
            entry.queue.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic() -> Topic<u32> {
        Topic::new(Bus::new(64), None)
    }

    #[tokio::test]
    async fn one_queue_per_identity() {
        let topic = topic();
        let identity = RetainedIdentity::new();

        let a = topic
            .queue_for(&identity, BackpressureMode::All)
            .expect("queue");
        let b = topic
            .queue_for(&identity, BackpressureMode::Latest)
            .expect("queue");

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.mode(), BackpressureMode::All);
        assert_eq!(topic.len(), 1);
    }

    #[tokio::test]
    async fn invalidation_removes_and_disposes_the_queue() {
        let topic = topic();
        let keep = RetainedIdentity::new();
        let gone = RetainedIdentity::new();

        topic.queue_for(&keep, BackpressureMode::All).expect("queue");
        let queue = topic.queue_for(&gone, BackpressureMode::All).expect("queue");
        assert_eq!(topic.len(), 2);

        gone.invalidate();
        assert!(queue.is_disposed());
        assert_eq!(topic.len(), 1);
        assert!(!topic.remove_on_invalidated(gone.id()));
    }

    #[tokio::test]
    async fn invalidated_identity_gets_no_queue() {
        let topic = topic();
        let identity = RetainedIdentity::new();
        identity.invalidate();

        assert!(topic.queue_for(&identity, BackpressureMode::All).is_none());
        assert_eq!(topic.len(), 0);
    }

    #[tokio::test]
    async fn offer_all_reaches_every_snapshotted_queue() {
        let topic = topic();
        let a = topic
            .queue_for(&RetainedIdentity::new(), BackpressureMode::All)
            .expect("queue");
        let b = topic
            .queue_for(&RetainedIdentity::new(), BackpressureMode::All)
            .expect("queue");

        assert_eq!(topic.offer_all(9), 2);
        assert_eq!(a.buffered() + b.buffered(), 2);
    }

    #[tokio::test]
    async fn dropping_the_topic_unregisters_callbacks() {
        let identity = RetainedIdentity::new();
        let queue = {
            let topic = topic();
            topic.queue_for(&identity, BackpressureMode::All).expect("queue")
        };
        assert!(queue.is_disposed());
        assert!(identity.invalidate());
    }
}
