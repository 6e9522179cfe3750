//! # Event handles: binding handlers to consumer instances.
//!
//! ```text
//! Hub::event() ──► Event<T> ──handle(consumer, f)──► LifecycleBinder ──► SubscriberQueue
//!                     │                                 (per instance)     (per identity)
//!                     └── Hub::post(&event, v) ──► Delivery::post ──► every queue
//! ```
//!
//! One binding per consumer instance: handling again from the same instance
//! unbinds the previous handler before the new one attaches.
//!
//! A handler only runs while its instance is started. If the instance is
//! destroyed while waiting or mid-handler, the event stays in the queue for
//! the next instance with the same retained identity.

use std::collections::HashMap;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;

use super::delivery::Delivery;
use crate::core::HubId;
use crate::delivery::TopicId;
use crate::delivery::binder::LifecycleBinder;
use crate::delivery::queue::{Handoff, Receiver, Ticket};
use crate::host::{Consumer, InstanceId, Lifecycle};
use crate::notices::Bus;
use crate::policies::BackpressureMode;

type Bindings<T> = Arc<Mutex<HashMap<InstanceId, LifecycleBinder<T>>>>;

/// Event topic owned by one [`Hub`](crate::Hub).
///
/// Consumers bind with [`handle`](Self::handle); only the owning hub can post.
pub struct Event<T> {
    owner: HubId,
    delivery: Delivery<T>,
    mode: BackpressureMode,
    bindings: Bindings<T>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner,
            delivery: self.delivery.clone(),
            mode: self.mode,
            bindings: Arc::clone(&self.bindings),
        }
    }
}

impl<T> Event<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(owner: HubId, bus: Bus, mode: BackpressureMode) -> Self {
        Self {
            owner,
            delivery: Delivery::new(bus),
            mode,
            bindings: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Topic of this event.
    pub fn topic_id(&self) -> TopicId {
        self.delivery.topic_id()
    }

    /// Binds `handler` to `consumer` with the hub's default backpressure mode.
    pub fn handle<F, Fut>(&self, consumer: &Consumer, handler: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handle_with(consumer, self.mode, handler);
    }

    /// Binds `handler` to `consumer`, replacing any handler that instance bound before.
    ///
    /// `mode` applies only if this creates the identity's queue; an existing
    /// queue keeps its mode.
    pub fn handle_with<F, Fut>(&self, consumer: &Consumer, mode: BackpressureMode, handler: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = consumer.instance_id();
        let receiver = handler_receiver(consumer.lifecycle(), handler);
        let weak = Arc::downgrade(&self.bindings);
        let binder = LifecycleBinder::new(
            self.delivery.topic().clone(),
            consumer.identity().clone(),
            mode,
            receiver,
            move |id| {
                if let Some(bindings) = weak.upgrade() {
                    let mut bindings = bindings.lock();
                    if bindings.get(&key).map(LifecycleBinder::id) == Some(id) {
                        bindings.remove(&key);
                    }
                }
            },
        );

        let previous = self.bindings.lock().insert(key, binder.clone());
        if let Some(previous) = previous {
            previous.unbind();
        }
        binder.bind_to(consumer.lifecycle());
    }

    /// Removes the binding of `consumer`, if any. Buffered events stay queued.
    pub fn unbind(&self, consumer: &Consumer) -> bool {
        let removed = self.bindings.lock().remove(&consumer.instance_id());
        match removed {
            Some(binder) => {
                binder.unbind();
                true
            }
            None => false,
        }
    }

    /// Number of consumer instances currently holding a binding.
    pub fn binding_count(&self) -> usize {
        self.bindings.lock().len()
    }

    pub(crate) fn owner(&self) -> HubId {
        self.owner
    }

    pub(crate) fn delivery(&self) -> &Delivery<T> {
        &self.delivery
    }
}

/// Event that anyone holding the handle may post to.
pub struct PublicEvent<T> {
    event: Event<T>,
}

impl<T> Clone for PublicEvent<T> {
    fn clone(&self) -> Self {
        Self {
            event: self.event.clone(),
        }
    }
}

impl<T> PublicEvent<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(event: Event<T>) -> Self {
        Self { event }
    }

    /// See [`Delivery::post`].
    pub fn post(&self, event: T) {
        self.event.delivery.post(event);
    }

    /// See [`Delivery::dispatch`].
    pub fn dispatch(&self, event: T) {
        self.event.delivery.dispatch(event);
    }

    /// Producer handle for this event.
    pub fn delivery(&self) -> Delivery<T> {
        self.event.delivery.clone()
    }
}

impl<T> Deref for PublicEvent<T> {
    type Target = Event<T>;

    fn deref(&self) -> &Event<T> {
        &self.event
    }
}

/// Wraps a handler: wait until started, run, report teardown.
fn handler_receiver<T, F, Fut>(lifecycle: &Lifecycle, handler: F) -> Receiver<T>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let phases = lifecycle.watch();
    let handler = Arc::new(handler);
    Receiver::new(move |event: T, _ticket: Ticket| {
        let mut phases = phases.clone();
        let handler = Arc::clone(&handler);
        async move {
            if phases.until_started().await.is_err() {
                return Handoff::TornDown;
            }
            tokio::select! {
                biased;
                () = (*handler)(event) => Handoff::Delivered,
                () = phases.until_destroyed() => Handoff::TornDown,
            }
        }
        .boxed()
    })
}
