//! # Retained identities and their registry.
//!
//! A [`RetainedIdentity`] outlives the destroy/recreate cycles of the consumer
//! instances that share it, so per-identity queue state (and undelivered items)
//! survives those cycles. It is invalidated **exactly once**, when the logical
//! subscriber is gone for good; every topic listening on it then disposes the
//! matching subscriber queue.
//!
//! ## Architecture
//! ```text
//! IdentityRegistry (key → RetainedIdentity)
//!      │ get_or_create("screen/main")        ┌──► Topic A: remove + dispose queue
//!      ▼                                     │
//! RetainedIdentity ── invalidate() ──► callbacks (once) ──► Topic B: remove + dispose queue
//! ```
//!
//! ## Rules
//! - Callbacks fire once, outside the identity's lock.
//! - Registering on an invalidated identity fires the callback immediately.
//! - After `IdentityRegistry::invalidate(key)` the next `get_or_create(key)` mints a new identity.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Global counter for identity ids.
static IDENTITY_SEQ: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of a [`RetainedIdentity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityId(u64);

impl IdentityId {
    /// Raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "identity#{}", self.0)
    }
}

/// Handle returned by [`RetainedIdentity::on_invalidated`], used to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

type InvalidationCallback = Box<dyn FnOnce(IdentityId) + Send>;

struct Callbacks {
    invalidated: bool,
    next: u64,
    entries: Vec<(CallbackId, InvalidationCallback)>,
}

struct Inner {
    id: IdentityId,
    callbacks: Mutex<Callbacks>,
}

/// Token whose lifetime spans consumer-instance recreation.
///
/// Cheap to clone; clones refer to the same identity.
#[derive(Clone)]
pub struct RetainedIdentity {
    inner: Arc<Inner>,
}

impl RetainedIdentity {
    /// Creates a fresh, live identity.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: IdentityId(IDENTITY_SEQ.fetch_add(1, Ordering::Relaxed)),
                callbacks: Mutex::new(Callbacks {
                    invalidated: false,
                    next: 0,
                    entries: Vec::new(),
                }),
            }),
        }
    }

    /// Returns the identity's id.
    pub fn id(&self) -> IdentityId {
        self.inner.id
    }

    /// True once [`invalidate`](Self::invalidate) has run.
    pub fn is_invalidated(&self) -> bool {
        self.inner.callbacks.lock().invalidated
    }

    /// Registers a callback fired once when the identity is invalidated.
    ///
    /// If the identity is already dead the callback runs immediately and `None` is returned.
    pub fn on_invalidated<F>(&self, callback: F) -> Option<CallbackId>
    where
        F: FnOnce(IdentityId) + Send + 'static,
    {
        let mut callbacks = self.inner.callbacks.lock();
        if callbacks.invalidated {
            drop(callbacks);
            callback(self.inner.id);
            return None;
        }
        let id = CallbackId(callbacks.next);
        callbacks.next += 1;
        callbacks.entries.push((id, Box::new(callback)));
        Some(id)
    }

    /// Unregisters a callback. Returns `false` if it already fired or was removed.
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.inner.callbacks.lock();
        let before = callbacks.entries.len();
        callbacks.entries.retain(|(cid, _)| *cid != id);
        callbacks.entries.len() != before
    }

    /// Marks the identity as permanently gone and fires its callbacks.
    ///
    /// Returns `true` on the first call, `false` afterwards.
    pub fn invalidate(&self) -> bool {
        let fired = {
            let mut callbacks = self.inner.callbacks.lock();
            if callbacks.invalidated {
                return false;
            }
            callbacks.invalidated = true;
            std::mem::take(&mut callbacks.entries)
        };
        for (_, callback) in fired {
            callback(self.inner.id);
        }
        true
    }
}

impl Default for RetainedIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for RetainedIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for RetainedIdentity {}

impl fmt::Debug for RetainedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetainedIdentity")
            .field("id", &self.inner.id)
            .field("invalidated", &self.is_invalidated())
            .finish()
    }
}

/// Maps consumer-group keys to their live retained identity.
#[derive(Default)]
pub struct IdentityRegistry {
    identities: Mutex<HashMap<String, RetainedIdentity>>,
}

impl IdentityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live identity for `key`, creating one if needed.
    pub fn get_or_create(&self, key: &str) -> RetainedIdentity {
        self.identities
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Returns the live identity for `key`, if any.
    pub fn get(&self, key: &str) -> Option<RetainedIdentity> {
        self.identities.lock().get(key).cloned()
    }

    /// Removes and invalidates the identity for `key`.
    ///
    /// Returns `false` if no identity was registered.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.identities.lock().remove(key);
        match removed {
            Some(identity) => identity.invalidate(),
            None => false,
        }
    }

    /// Number of live identities.
    pub fn len(&self) -> usize {
        self.identities.lock().len()
    }

    /// True if no identity is live.
    pub fn is_empty(&self) -> bool {
        self.identities.lock().is_empty()
    }
}
