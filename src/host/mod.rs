//! Host collaborators consumed by the engine.
//!
//! The engine does not own lifecycles or identities; it reads them:
//! - [`RetainedIdentity`] / [`IdentityRegistry`] survive recreation, invalidated once;
//! - [`Lifecycle`] / [`Phase`] per consumer instance (ready, active, torn down);
//! - [`Consumer`] bundles an instance with its identity for binding calls.

mod identity;
mod lifecycle;

pub use identity::{CallbackId, IdentityId, IdentityRegistry, RetainedIdentity};
pub use lifecycle::{Consumer, InstanceId, Lifecycle, Phase};
