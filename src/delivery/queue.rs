//! # SubscriberQueue: per-(topic, retained identity) buffer and consumer loop.
//!
//! One queue exists per live retained identity of a topic. Producers `offer`
//! into it from any thread; a single consumer loop (one tokio task, the queue's
//! delivery thread) hands items one at a time to whatever receiver is attached.
//!
//! ## Architecture
//! ```text
//! offer(item) ──► [buffer + Notify] ──┐          (item stream)
//!                                     ▼
//!                             consumer loop ─────► receiver(item, ticket)
//!                                     ▲                  │
//! set_receiver(r) ──► [watch slot] ───┘                  ▼
//!                    (receiver stream)     Delivered | TornDown | Abandoned
//! ```
//!
//! The in-flight receiver future is raced against:
//! - the receiver slot: a different receiver drops it and retries with the new one;
//! - newer items (`Latest` only): the stale item is dropped, the newest is retried,
//!   unless the receiver committed its [`Ticket`];
//! - disposal: the item is discarded.
//!
//! ## Rules
//! - At most one receiver invocation in flight per queue.
//! - `All` delivers in arrival order, one completed before the next starts.
//! - `Latest` buffers one item; an offer replaces it.
//! - Delivery always uses the receiver attached *now*, not the one present at offer time.
//! - `TornDown` clears the slot (if it still holds that receiver) and redelivers the item.
//! - Items leaving without delivery go through the discard hook (`Superseded` / `Disposed`).

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::delivery::TopicId;
use crate::host::IdentityId;
use crate::notices::{Bus, Notice, NoticeKind};
use crate::policies::BackpressureMode;

/// Global counter for receiver ids.
static RECEIVER_SEQ: AtomicU64 = AtomicU64::new(1);

/// How a receiver invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handoff {
    /// The item was consumed.
    Delivered,
    /// The owning consumer instance tore down before consuming the item.
    TornDown,
    /// The owning consumer instance tore down and the receiver settled the item itself.
    Abandoned,
}

/// Why an item left the queue without being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Discard {
    /// A newer item replaced it (`Latest`).
    Superseded,
    /// The queue was disposed.
    Disposed,
}

/// Called for every item that leaves the queue undelivered.
pub(crate) type DiscardHook<I> = Arc<dyn Fn(I, Discard) + Send + Sync>;

type ReceiverFn<I> = dyn Fn(I, Ticket) -> BoxFuture<'static, Handoff> + Send + Sync;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ReceiverId(u64);

/// Receiver callback plus the identity used for compare-and-clear.
pub(crate) struct Receiver<I> {
    id: ReceiverId,
    f: Arc<ReceiverFn<I>>,
}

impl<I> Receiver<I> {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: Fn(I, Ticket) -> BoxFuture<'static, Handoff> + Send + Sync + 'static,
    {
        Self {
            id: ReceiverId(RECEIVER_SEQ.fetch_add(1, Ordering::Relaxed)),
            f: Arc::new(f),
        }
    }

    pub(crate) fn id(&self) -> ReceiverId {
        self.id
    }
}

impl<I> Clone for Receiver<I> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            f: Arc::clone(&self.f),
        }
    }
}

/// Per-invocation token. A committed invocation is no longer preempted by newer items.
#[derive(Clone, Default)]
pub(crate) struct Ticket {
    committed: Arc<AtomicBool>,
}

impl Ticket {
    pub(crate) fn commit(&self) {
        self.committed.store(true, Ordering::Release);
    }

    pub(crate) fn is_committed(&self) -> bool {
        self.committed.load(Ordering::Acquire)
    }
}

/// Where a queue sits, for notices and logs.
#[derive(Clone, Debug)]
pub(crate) struct QueueScope {
    pub(crate) topic: TopicId,
    pub(crate) identity: IdentityId,
    pub(crate) bus: Bus,
}

struct Shared<I> {
    mode: BackpressureMode,
    scope: QueueScope,
    buffer: Mutex<VecDeque<I>>,
    notify: Notify,
    receiver: watch::Sender<Option<Receiver<I>>>,
    disposed: CancellationToken,
    discard: Option<DiscardHook<I>>,
}

enum Attempt {
    Done,
    Retry,
    Disposed,
}

/// Buffered queue with a single consumer loop.
pub(crate) struct SubscriberQueue<I> {
    shared: Arc<Shared<I>>,
}

impl<I> SubscriberQueue<I>
where
    I: Clone + Send + 'static,
{
    /// Creates the queue and spawns its consumer loop.
    pub(crate) fn spawn(
        mode: BackpressureMode,
        scope: QueueScope,
        discard: Option<DiscardHook<I>>,
    ) -> Self {
        let (receiver, _rx) = watch::channel(None);
        let shared = Arc::new(Shared {
            mode,
            scope,
            buffer: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            receiver,
            disposed: CancellationToken::new(),
            discard,
        });
        shared.publish(NoticeKind::QueueCreated, Some(mode.as_label()));
        debug!(
            topic = %shared.scope.topic,
            identity = %shared.scope.identity,
            mode = mode.as_label(),
            "subscriber queue created"
        );

        tokio::spawn(Arc::clone(&shared).run());
        Self { shared }
    }
}

impl<I> SubscriberQueue<I> {
    pub(crate) fn mode(&self) -> BackpressureMode {
        self.shared.mode
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.shared.disposed.is_cancelled()
    }

    /// Number of items waiting to be taken by the consumer loop.
    pub(crate) fn buffered(&self) -> usize {
        self.shared.buffer.lock().len()
    }

    /// Buffers an item according to the backpressure mode. Never blocks.
    pub(crate) fn offer(&self, item: I) {
        let shared = &self.shared;
        let stale = {
            let mut buffer = shared.buffer.lock();
            if shared.disposed.is_cancelled() {
                drop(buffer);
                shared.discard(item, Discard::Disposed);
                return;
            }
            let stale = match shared.mode.capacity() {
                Some(cap) if buffer.len() >= cap => buffer.pop_front(),
                _ => None,
            };
            buffer.push_back(item);
            stale
        };
        shared.notify.notify_one();

        if let Some(stale) = stale {
            shared.discard(stale, Discard::Superseded);
        }
    }

    /// Replaces the receiver slot (`None` detaches).
    pub(crate) fn set_receiver(&self, receiver: Option<Receiver<I>>) {
        if self.is_disposed() {
            return;
        }
        let kind = if receiver.is_some() {
            NoticeKind::ReceiverAttached
        } else {
            NoticeKind::ReceiverDetached
        };
        self.shared.receiver.send_replace(receiver);
        self.shared.publish(kind, None);
        trace!(
            topic = %self.shared.scope.topic,
            identity = %self.shared.scope.identity,
            buffered = self.buffered(),
            "receiver slot replaced"
        );
    }

    /// Clears the slot only if it still holds `id`.
    pub(crate) fn clear_receiver_if(&self, id: ReceiverId) -> bool {
        self.shared.clear_receiver_if(id)
    }

    /// Stops the consumer loop for good and discards everything undelivered.
    pub(crate) fn dispose(&self) {
        let shared = &self.shared;
        let drained: Vec<I> = {
            let mut buffer = shared.buffer.lock();
            if shared.disposed.is_cancelled() {
                return;
            }
            shared.disposed.cancel();
            buffer.drain(..).collect()
        };
        shared.receiver.send_replace(None);

        for item in drained {
            shared.discard(item, Discard::Disposed);
        }
        shared.publish(NoticeKind::QueueDisposed, None);
        debug!(
            topic = %shared.scope.topic,
            identity = %shared.scope.identity,
            "subscriber queue disposed"
        );
    }
}

impl<I> Shared<I>
where
    I: Clone + Send + 'static,
{
    async fn run(self: Arc<Self>) {
        let mut receivers = self.receiver.subscribe();
        while let Some(item) = self.next_item().await {
            self.deliver(item, &mut receivers).await;
        }
    }

    async fn next_item(&self) -> Option<I> {
        loop {
            if self.disposed.is_cancelled() {
                return None;
            }
            let next = self.buffer.lock().pop_front();
            if next.is_some() {
                return next;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = self.disposed.cancelled() => return None,
            }
        }
    }

    /// Drives one item until it is delivered, abandoned or discarded.
    async fn deliver(&self, mut item: I, receivers: &mut watch::Receiver<Option<Receiver<I>>>) {
        loop {
            let receiver = loop {
                let current = receivers.borrow_and_update().clone();
                if let Some(receiver) = current {
                    break receiver;
                }
                tokio::select! {
                    _ = self.disposed.cancelled() => {
                        self.discard(item, Discard::Disposed);
                        return;
                    }
                    changed = receivers.changed() => {
                        if changed.is_err() {
                            self.discard(item, Discard::Disposed);
                            return;
                        }
                    }
                    _ = self.notify.notified(), if self.mode.preempts() => {
                        if let Some(newer) = self.take_newer() {
                            let stale = std::mem::replace(&mut item, newer);
                            self.discard(stale, Discard::Superseded);
                        }
                    }
                }
            };

            match self.attempt(&receiver, &mut item, receivers).await {
                Attempt::Done => return,
                Attempt::Retry => continue,
                Attempt::Disposed => {
                    self.discard(item, Discard::Disposed);
                    return;
                }
            }
        }
    }

    /// One receiver invocation, raced against slot changes, newer items and disposal.
    async fn attempt(
        &self,
        receiver: &Receiver<I>,
        item: &mut I,
        receivers: &mut watch::Receiver<Option<Receiver<I>>>,
    ) -> Attempt {
        let ticket = Ticket::default();
        let handoff = AssertUnwindSafe((receiver.f)(item.clone(), ticket.clone())).catch_unwind();
        tokio::pin!(handoff);

        loop {
            tokio::select! {
                biased;
                _ = self.disposed.cancelled() => return Attempt::Disposed,
                outcome = &mut handoff => return self.settle(receiver, outcome),
                changed = receivers.changed() => {
                    if changed.is_err() {
                        return Attempt::Disposed;
                    }
                    let current = receivers.borrow_and_update().as_ref().map(Receiver::id);
                    if current != Some(receiver.id) {
                        self.publish(NoticeKind::DeliveryRedirected, None);
                        return Attempt::Retry;
                    }
                }
                _ = self.notify.notified(), if self.mode.preempts() => {
                    if ticket.is_committed() {
                        // newer item stays buffered until this invocation completes
                        continue;
                    }
                    if let Some(newer) = self.take_newer() {
                        let stale = std::mem::replace(item, newer);
                        self.discard(stale, Discard::Superseded);
                        return Attempt::Retry;
                    }
                }
            }
        }
    }
}

impl<I> Shared<I> {
    fn settle(
        &self,
        receiver: &Receiver<I>,
        outcome: Result<Handoff, Box<dyn Any + Send>>,
    ) -> Attempt {
        match outcome {
            Ok(Handoff::Delivered) => {
                self.publish(NoticeKind::ItemDelivered, None);
                Attempt::Done
            }
            Ok(Handoff::TornDown) => {
                self.clear_receiver_if(receiver.id);
                self.publish(NoticeKind::DeliveryTornDown, None);
                Attempt::Retry
            }
            Ok(Handoff::Abandoned) => {
                self.clear_receiver_if(receiver.id);
                self.publish(NoticeKind::DeliveryAbandoned, None);
                Attempt::Done
            }
            Err(payload) => {
                let info = panic_message(payload.as_ref());
                warn!(
                    topic = %self.scope.topic,
                    identity = %self.scope.identity,
                    %info,
                    "receiver panicked"
                );
                self.publish(NoticeKind::ReceiverPanicked, Some(&info));
                Attempt::Done
            }
        }
    }

    fn take_newer(&self) -> Option<I> {
        self.buffer.lock().pop_front()
    }

    fn clear_receiver_if(&self, id: ReceiverId) -> bool {
        let cleared = self.receiver.send_if_modified(|slot| {
            if slot.as_ref().map(Receiver::id) == Some(id) {
                *slot = None;
                true
            } else {
                false
            }
        });
        if cleared {
            self.publish(NoticeKind::ReceiverDetached, None);
        }
        cleared
    }

    fn discard(&self, item: I, reason: Discard) {
        let kind = match reason {
            Discard::Superseded => NoticeKind::ItemSuperseded,
            Discard::Disposed => NoticeKind::ItemDisposed,
        };
        self.publish(kind, None);
        if let Some(hook) = &self.discard {
            hook(item, reason);
        }
    }

    fn publish(&self, kind: NoticeKind, reason: Option<&str>) {
        let mut notice = Notice::new(kind)
            .with_topic(self.scope.topic)
            .with_identity(self.scope.identity);
        if let Some(reason) = reason {
            notice = notice.with_reason(reason);
        }
        self.scope.bus.publish(notice);
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
