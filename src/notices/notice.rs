//! # Runtime notices emitted by queues, topics and surveys.
//!
//! The [`NoticeKind`] enum classifies notices across four categories:
//! - **Queue lifecycle**: a subscriber queue was created or disposed
//! - **Item flow**: an item was delivered, dropped, redirected or torn down
//! - **Receiver slot**: a receiver was attached, detached or panicked
//! - **Surveys / observers**: a question was broadcast or closed, observer trouble
//!
//! The [`Notice`] struct carries the metadata: topic, retained identity,
//! a human-readable reason and a count where one applies.
//!
//! ## Ordering guarantees
//! Each notice has a globally unique sequence number (`seq`) that increases monotonically.
//! Notices from one queue are published in the order its consumer loop made progress.
//!
//! ## Example
//! ```rust
//! use handoff::{Notice, NoticeKind, TopicId};
//!
//! let n = Notice::new(NoticeKind::ItemSuperseded)
//!     .with_topic(TopicId::from_raw(3))
//!     .with_reason("latest");
//!
//! assert_eq!(n.kind, NoticeKind::ItemSuperseded);
//! assert_eq!(n.topic, Some(TopicId::from_raw(3)));
//! assert_eq!(n.reason.as_deref(), Some("latest"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::delivery::TopicId;
use crate::host::IdentityId;

/// Global sequence counter for notice ordering.
static NOTICE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    // === Queue lifecycle ===
    /// A subscriber queue was created for a retained identity.
    ///
    /// Sets: `topic`, `identity`, `reason` (backpressure label)
    QueueCreated,

    /// A subscriber queue was disposed (its retained identity was invalidated).
    ///
    /// Sets: `topic`, `identity`
    QueueDisposed,

    // === Item flow ===
    /// A receiver finished handling an item.
    ///
    /// Sets: `topic`, `identity`
    ItemDelivered,

    /// An undelivered item was dropped because a newer one arrived (`Latest`).
    ///
    /// Sets: `topic`, `identity`
    ItemSuperseded,

    /// An undelivered item was dropped because its queue was disposed.
    ///
    /// Sets: `topic`, `identity`
    ItemDisposed,

    /// The receiver slot changed while an item was in flight; the item is retried.
    ///
    /// Sets: `topic`, `identity`
    DeliveryRedirected,

    /// The receiver's consumer instance was destroyed mid-delivery; the item waits
    /// for the next receiver.
    ///
    /// Sets: `topic`, `identity`
    DeliveryTornDown,

    /// The receiver's consumer instance was destroyed and the receiver settled the
    /// item itself (survey `Cancel` policy).
    ///
    /// Sets: `topic`, `identity`
    DeliveryAbandoned,

    // === Receiver slot ===
    /// A receiver was attached to a queue.
    ///
    /// Sets: `topic`, `identity`
    ReceiverAttached,

    /// The receiver slot was cleared (unbind or teardown).
    ///
    /// Sets: `topic`, `identity`
    ReceiverDetached,

    /// A receiver panicked; the item counts as delivered.
    ///
    /// Sets: `topic`, `identity`, `reason` (panic info)
    ReceiverPanicked,

    // === Surveys ===
    /// A question was broadcast to a snapshot of responders.
    ///
    /// Sets: `topic`, `count` (responders)
    SurveyAsked,

    /// All expected answers/errors were recorded and the answer sequence closed.
    ///
    /// Sets: `topic`, `count` (responders)
    SurveyClosed,

    // === Observers ===
    /// An observer panicked while handling a notice.
    ///
    /// Sets: `observer`, `reason` (panic info)
    ObserverPanicked,

    /// An observer dropped a notice (queue full or worker closed).
    ///
    /// Sets: `observer`, `reason` ("full" / "closed")
    ObserverOverflow,
}

/// Runtime notice with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`NoticeKind`]
#[derive(Clone, Debug)]
pub struct Notice {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Notice classification.
    pub kind: NoticeKind,

    /// Topic the notice relates to.
    pub topic: Option<TopicId>,
    /// Retained identity of the subscriber queue.
    pub identity: Option<IdentityId>,
    /// Observer name (observer notices only).
    pub observer: Option<Arc<str>>,
    /// Human-readable reason (panic info, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Responder count (survey notices only).
    pub count: Option<usize>,
}

impl Notice {
    /// Creates a new notice of the given kind with current timestamp and next sequence number.
    pub fn new(kind: NoticeKind) -> Self {
        Self {
            seq: NOTICE_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            topic: None,
            identity: None,
            observer: None,
            reason: None,
            count: None,
        }
    }

    /// Attaches a topic.
    #[inline]
    pub fn with_topic(mut self, topic: TopicId) -> Self {
        self.topic = Some(topic);
        self
    }

    /// Attaches a retained identity.
    #[inline]
    pub fn with_identity(mut self, identity: IdentityId) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a responder count.
    #[inline]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Creates an observer overflow notice.
    #[inline]
    pub fn observer_overflow(observer: &'static str, reason: &'static str) -> Self {
        let mut n = Notice::new(NoticeKind::ObserverOverflow).with_reason(reason);
        n.observer = Some(observer.into());
        n
    }

    /// Creates an observer panic notice.
    #[inline]
    pub fn observer_panicked(observer: &'static str, info: String) -> Self {
        let mut n = Notice::new(NoticeKind::ObserverPanicked).with_reason(info);
        n.observer = Some(observer.into());
        n
    }

    /// True for notices about a full observer queue.
    #[inline]
    pub fn is_observer_overflow(&self) -> bool {
        matches!(self.kind, NoticeKind::ObserverOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Notice::new(NoticeKind::QueueCreated);
        let b = Notice::new(NoticeKind::QueueDisposed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn observer_helpers_fill_fields() {
        let n = Notice::observer_overflow("audit", "full");
        assert!(n.is_observer_overflow());
        assert_eq!(n.observer.as_deref(), Some("audit"));
        assert_eq!(n.reason.as_deref(), Some("full"));
    }
}
