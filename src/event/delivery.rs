//! Producer side of an event topic.

use tracing::trace;

use crate::delivery::TopicId;
use crate::delivery::topic::Topic;
use crate::notices::Bus;

/// Posts events to every subscriber queue of one topic.
///
/// Obtained from a [`PublicEvent`](crate::PublicEvent) or, for owned events,
/// through [`Hub::delivery`](crate::Hub::delivery).
pub struct Delivery<T> {
    topic: Topic<T>,
}

impl<T> Clone for Delivery<T> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic.clone(),
        }
    }
}

impl<T> Delivery<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(bus: Bus) -> Self {
        Self {
            topic: Topic::new(bus, None),
        }
    }

    /// Offers `event` to every subscriber queue that exists right now.
    ///
    /// Never blocks. With no subscriber the event is gone.
    pub fn post(&self, event: T) {
        let reached = self.topic.offer_all(event);
        trace!(topic = %self.topic.id(), reached, "event posted");
    }

    /// Same as [`post`](Self::post).
    pub fn dispatch(&self, event: T) {
        self.post(event);
    }

    /// Topic this delivery posts to.
    pub fn topic_id(&self) -> TopicId {
        self.topic.id()
    }

    /// Number of live subscriber queues (one per retained identity).
    pub fn subscriber_count(&self) -> usize {
        self.topic.len()
    }

    pub(crate) fn topic(&self) -> &Topic<T> {
        &self.topic
    }
}
