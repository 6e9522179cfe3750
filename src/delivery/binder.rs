//! # LifecycleBinder: attaches one consumer instance's receiver to its queue.
//!
//! ```text
//!            ready (Created/Started)              Destroyed / lifecycle dropped / unbind()
//!   Idle ───────────────────────────► Bound ────────────────────────────────────► Unbound
//!    │                                                                              ▲
//!    └──────────────────────────── unbind() / Destroyed ────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Bind happens at most once; `Unbound` is terminal and `unbind` is idempotent.
//! - Unbind clears the queue's receiver only if it still holds this binder's receiver,
//!   so a newer binding is never detached by an older one.
//! - The queue itself survives unbind; only identity invalidation disposes it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::queue::{Receiver, SubscriberQueue};
use super::topic::Topic;
use crate::host::{Lifecycle, Phase, RetainedIdentity};
use crate::policies::BackpressureMode;

/// Global counter for binder ids.
static BINDER_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BinderId(u64);

type UnbindHook = Box<dyn Fn(BinderId) + Send + Sync>;

enum BindState<I> {
    Idle,
    Bound(Arc<SubscriberQueue<I>>),
    Unbound,
}

struct BinderInner<I> {
    id: BinderId,
    topic: Topic<I>,
    identity: RetainedIdentity,
    mode: BackpressureMode,
    receiver: Receiver<I>,
    state: Mutex<BindState<I>>,
    stop: CancellationToken,
    on_unbind: UnbindHook,
}

/// One binding of (topic, consumer instance).
pub(crate) struct LifecycleBinder<I> {
    inner: Arc<BinderInner<I>>,
}

impl<I> Clone for LifecycleBinder<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I> LifecycleBinder<I>
where
    I: Clone + Send + 'static,
{
    /// `on_unbind` runs once, after the binding is torn down.
    pub(crate) fn new<F>(
        topic: Topic<I>,
        identity: RetainedIdentity,
        mode: BackpressureMode,
        receiver: Receiver<I>,
        on_unbind: F,
    ) -> Self
    where
        F: Fn(BinderId) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(BinderInner {
                id: BinderId(BINDER_SEQ.fetch_add(1, Ordering::Relaxed)),
                topic,
                identity,
                mode,
                receiver,
                state: Mutex::new(BindState::Idle),
                stop: CancellationToken::new(),
                on_unbind: Box::new(on_unbind),
            }),
        }
    }

    pub(crate) fn id(&self) -> BinderId {
        self.inner.id
    }

    #[cfg(test)]
    pub(crate) fn is_bound(&self) -> bool {
        matches!(*self.inner.state.lock(), BindState::Bound(_))
    }

    /// Follows `lifecycle`: binds once it is ready, unbinds when it is destroyed.
    pub(crate) fn bind_to(&self, lifecycle: &Lifecycle) {
        let mut phases = lifecycle.watch();
        match phases.current() {
            Phase::Destroyed => {
                self.inner.unbind();
                return;
            }
            phase if phase.is_ready() => self.inner.bind(),
            _ => {}
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = inner.stop.cancelled() => break,
                    phase = phases.changed() => match phase {
                        None | Some(Phase::Destroyed) => {
                            inner.unbind();
                            break;
                        }
                        Some(phase) if phase.is_ready() => inner.bind(),
                        Some(_) => {}
                    },
                }
            }
        });
    }

    /// Detaches the receiver and stops following the lifecycle. Idempotent.
    pub(crate) fn unbind(&self) {
        self.inner.unbind();
    }
}

impl<I> BinderInner<I>
where
    I: Clone + Send + 'static,
{
    fn bind(&self) {
        let mut state = self.state.lock();
        if !matches!(*state, BindState::Idle) {
            return;
        }
        if let Some(queue) = self.topic.queue_for(&self.identity, self.mode) {
            queue.set_receiver(Some(self.receiver.clone()));
            *state = BindState::Bound(queue);
        }
    }

    fn unbind(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), BindState::Unbound);
        match previous {
            BindState::Unbound => return,
            BindState::Bound(queue) => {
                queue.clear_receiver_if(self.receiver.id());
            }
            BindState::Idle => {}
        }
        self.stop.cancel();
        (self.on_unbind)(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures::FutureExt;

    use crate::delivery::queue::Handoff;
    use crate::notices::Bus;

    fn receiver(log: &Arc<Mutex<Vec<u32>>>) -> Receiver<u32> {
        let log = Arc::clone(log);
        Receiver::new(move |item, _ticket| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(item);
                Handoff::Delivered
            }
            .boxed()
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn binds_when_ready_and_unbinds_on_destroy() {
        let topic = Topic::new(Bus::new(64), None);
        let identity = RetainedIdentity::new();
        let lifecycle = Lifecycle::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let binder = LifecycleBinder::new(
            topic.clone(),
            identity.clone(),
            BackpressureMode::All,
            receiver(&log),
            |_| {},
        );
        binder.bind_to(&lifecycle);
        assert!(!binder.is_bound());

        lifecycle.create();
        settle().await;
        assert!(binder.is_bound());
        assert_eq!(topic.len(), 1);

        lifecycle.destroy();
        settle().await;
        assert!(!binder.is_bound());
        assert_eq!(topic.len(), 1, "queue outlives the binding");
    }

    #[tokio::test]
    async fn binds_immediately_on_ready_lifecycle() {
        let topic = Topic::new(Bus::new(64), None);
        let lifecycle = Lifecycle::new();
        lifecycle.start();

        let binder = LifecycleBinder::new(
            topic,
            RetainedIdentity::new(),
            BackpressureMode::All,
            receiver(&Arc::new(Mutex::new(Vec::new()))),
            |_| {},
        );
        binder.bind_to(&lifecycle);
        assert!(binder.is_bound());
    }

    #[tokio::test]
    async fn unbind_is_idempotent_and_runs_hook_once() {
        let topic = Topic::new(Bus::new(64), None);
        let lifecycle = Lifecycle::new();
        lifecycle.create();
        let calls = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&calls);
        let binder = LifecycleBinder::new(
            topic,
            RetainedIdentity::new(),
            BackpressureMode::All,
            receiver(&Arc::new(Mutex::new(Vec::new()))),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        binder.bind_to(&lifecycle);
        binder.unbind();
        binder.unbind();
        lifecycle.destroy();
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!binder.is_bound());
    }

    #[tokio::test]
    async fn unbinds_when_every_lifecycle_handle_is_dropped() {
        let topic = Topic::new(Bus::new(64), None);
        let lifecycle = Lifecycle::new();
        lifecycle.start();
        let calls = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&calls);
        let binder = LifecycleBinder::new(
            topic,
            RetainedIdentity::new(),
            BackpressureMode::All,
            receiver(&Arc::new(Mutex::new(Vec::new()))),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        binder.bind_to(&lifecycle);
        assert!(binder.is_bound());

        drop(lifecycle);
        settle().await;
        assert!(!binder.is_bound());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_unbind_keeps_the_newer_receiver() {
        let topic = Topic::new(Bus::new(64), None);
        let identity = RetainedIdentity::new();
        let old_lc = Lifecycle::new();
        let new_lc = Lifecycle::new();
        old_lc.create();
        new_lc.start();
        let old_log = Arc::new(Mutex::new(Vec::new()));
        let new_log = Arc::new(Mutex::new(Vec::new()));

        let old = LifecycleBinder::new(
            topic.clone(),
            identity.clone(),
            BackpressureMode::All,
            receiver(&old_log),
            |_| {},
        );
        old.bind_to(&old_lc);
        let new = LifecycleBinder::new(
            topic.clone(),
            identity.clone(),
            BackpressureMode::All,
            receiver(&new_log),
            |_| {},
        );
        new.bind_to(&new_lc);

        old_lc.destroy();
        settle().await;
        topic.offer_all(4);
        settle().await;

        assert!(old_log.lock().is_empty());
        assert_eq!(*new_log.lock(), vec![4]);
    }
}
