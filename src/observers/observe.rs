//! # Observer trait
//!
//! `Observe` is the extension point for watching a hub's runtime notices
//! (queue lifecycle, deliveries, drops, surveys). Each observer is driven by a
//! dedicated worker fed by a bounded queue owned by the
//! [`ObserverSet`](crate::observers::ObserverSet).
//!
//! ## Contract
//! - Implementations may be slow; they never block queue loops or other observers.
//! - Each observer declares its queue capacity via [`Observe::queue_capacity`].
//!   On overflow, notices for that observer are dropped.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use handoff::{Notice, NoticeKind, Observe};
//!
//! struct Drops;
//!
//! #[async_trait]
//! impl Observe for Drops {
//!     async fn on_notice(&self, notice: &Notice) {
//!         if notice.kind == NoticeKind::ItemSuperseded {
//!             // count it
//!         }
//!     }
//!     fn name(&self) -> &'static str { "drops" }
//! }
//! ```

use async_trait::async_trait;

use crate::notices::Notice;

/// Contract for notice observers.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Handles one notice.
    async fn on_notice(&self, notice: &Notice);

    /// Name used in overflow/panic notices and logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this observer's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
