//! # Consumer-instance lifecycle (readiness source).
//!
//! A [`Lifecycle`] is the host-driven state of one short-lived consumer
//! instance. The engine only reads it:
//!
//! ```text
//!                 create()            start()
//!   Initialized ───────────► Created ─────────► Started
//!        │                     ▲ │    stop()      │
//!        │                     │ └────────────────┤
//!        │                     └──────────────────┘
//!        └────────────── destroy() (from any phase) ─────► Destroyed (terminal)
//! ```
//!
//! - **Created / Started** ("became ready"): bindings attach their receiver.
//! - **Started** ("became active"): receivers run their handler.
//! - **Destroyed** ("torn down"): bindings detach; in-flight handlers are interrupted.
//!
//! Dropping every `Lifecycle` handle counts as `Destroyed` for everyone watching.
//!
//! A [`Consumer`] pairs one lifecycle with the [`RetainedIdentity`] that survives
//! its recreation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use super::identity::RetainedIdentity;

/// Global counter for instance ids.
static INSTANCE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identifier of one consumer instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// Lifecycle phase of a consumer instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, not ready yet.
    Initialized,
    /// Ready: bindings attach, handlers wait.
    Created,
    /// Active: handlers run.
    Started,
    /// Gone; terminal.
    Destroyed,
}

impl Phase {
    /// True for `Created` and `Started`.
    #[inline]
    pub fn is_ready(self) -> bool {
        matches!(self, Phase::Created | Phase::Started)
    }
}

/// Host-driven lifecycle of one consumer instance.
///
/// Cheap to clone; clones drive the same instance.
#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<LifecycleInner>,
}

struct LifecycleInner {
    id: InstanceId,
    tx: watch::Sender<Phase>,
}

impl Lifecycle {
    /// Creates a lifecycle in [`Phase::Initialized`].
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Phase::Initialized);
        Self {
            inner: Arc::new(LifecycleInner {
                id: InstanceId(INSTANCE_SEQ.fetch_add(1, Ordering::Relaxed)),
                tx,
            }),
        }
    }

    /// Returns the instance id.
    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        *self.inner.tx.borrow()
    }

    /// `Initialized → Created`.
    pub fn create(&self) -> bool {
        self.transition(|p| p == Phase::Initialized, Phase::Created)
    }

    /// `Initialized | Created → Started`.
    pub fn start(&self) -> bool {
        self.transition(
            |p| matches!(p, Phase::Initialized | Phase::Created),
            Phase::Started,
        )
    }

    /// `Started → Created`.
    pub fn stop(&self) -> bool {
        self.transition(|p| p == Phase::Started, Phase::Created)
    }

    /// Any phase `→ Destroyed`. Returns `false` if already destroyed.
    pub fn destroy(&self) -> bool {
        self.transition(|p| p != Phase::Destroyed, Phase::Destroyed)
    }

    pub(crate) fn watch(&self) -> PhaseWatch {
        PhaseWatch {
            rx: self.inner.tx.subscribe(),
        }
    }

    fn transition(&self, allowed: impl Fn(Phase) -> bool, next: Phase) -> bool {
        self.inner.tx.send_if_modified(|phase| {
            if allowed(*phase) {
                *phase = next;
                true
            } else {
                false
            }
        })
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("id", &self.inner.id)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Marker: the watched instance was destroyed (or every handle dropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TornDown;

/// Engine-side view of a lifecycle. Does not keep the instance alive.
#[derive(Clone)]
pub(crate) struct PhaseWatch {
    rx: watch::Receiver<Phase>,
}

impl PhaseWatch {
    /// Current phase; `Destroyed` once the host dropped every handle.
    pub(crate) fn current(&self) -> Phase {
        if self.rx.has_changed().is_err() {
            return Phase::Destroyed;
        }
        *self.rx.borrow()
    }

    /// Next observed phase, `None` once the host dropped every handle.
    pub(crate) async fn changed(&mut self) -> Option<Phase> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// Waits until the instance is active.
    pub(crate) async fn until_started(&mut self) -> Result<(), TornDown> {
        let started = match self
            .rx
            .wait_for(|p| matches!(p, Phase::Started | Phase::Destroyed))
            .await
        {
            Ok(phase) => *phase == Phase::Started,
            Err(_closed) => false,
        };
        if started { Ok(()) } else { Err(TornDown) }
    }

    /// Resolves once the instance is destroyed.
    pub(crate) async fn until_destroyed(&mut self) {
        let _ = self.rx.wait_for(|p| *p == Phase::Destroyed).await;
    }
}

/// One consumer instance together with its retained identity.
#[derive(Clone, Debug)]
pub struct Consumer {
    lifecycle: Lifecycle,
    identity: RetainedIdentity,
}

impl Consumer {
    /// Creates a consumer with a fresh lifecycle in [`Phase::Initialized`].
    pub fn new(identity: RetainedIdentity) -> Self {
        Self::with_lifecycle(Lifecycle::new(), identity)
    }

    /// Pairs an existing lifecycle with an identity.
    pub fn with_lifecycle(lifecycle: Lifecycle, identity: RetainedIdentity) -> Self {
        Self {
            lifecycle,
            identity,
        }
    }

    /// Lifecycle of this instance.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Identity shared across recreation.
    pub fn identity(&self) -> &RetainedIdentity {
        &self.identity
    }

    /// Id of this instance.
    pub fn instance_id(&self) -> InstanceId {
        self.lifecycle.id()
    }

    /// Destroys this instance and returns a new one with the same identity.
    pub fn recreate(&self) -> Consumer {
        self.lifecycle.destroy();
        Consumer::new(self.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_phase_graph() {
        let lc = Lifecycle::new();
        assert!(!lc.stop());
        assert!(lc.create());
        assert!(!lc.create());
        assert!(lc.start());
        assert!(lc.stop());
        assert_eq!(lc.phase(), Phase::Created);
        assert!(lc.destroy());
        assert!(!lc.destroy());
        assert!(!lc.start());
        assert_eq!(lc.phase(), Phase::Destroyed);
    }

    #[tokio::test]
    async fn until_started_fails_on_destroy() {
        let lc = Lifecycle::new();
        let mut watch = lc.watch();
        lc.create();

        let waiter = tokio::spawn(async move { watch.until_started().await });
        tokio::task::yield_now().await;
        lc.destroy();

        assert_eq!(waiter.await.expect("join"), Err(TornDown));
    }

    #[tokio::test]
    async fn dropped_lifecycle_counts_as_destroyed() {
        let lc = Lifecycle::new();
        let mut watch = lc.watch();
        drop(lc);

        assert_eq!(watch.current(), Phase::Destroyed);
        assert_eq!(watch.until_started().await, Err(TornDown));
        watch.until_destroyed().await;
    }

    #[test]
    fn recreate_keeps_identity() {
        let consumer = Consumer::new(RetainedIdentity::new());
        consumer.lifecycle().start();

        let next = consumer.recreate();
        assert_eq!(consumer.lifecycle().phase(), Phase::Destroyed);
        assert_eq!(next.lifecycle().phase(), Phase::Initialized);
        assert_eq!(next.identity(), consumer.identity());
        assert_ne!(next.instance_id(), consumer.instance_id());
    }
}
