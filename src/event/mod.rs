//! Events: fire-and-forget items delivered to every subscribed consumer.
//!
//! - [`Event`]: owned by a [`Hub`](crate::Hub); consumers `handle` it, the hub posts;
//! - [`PublicEvent`]: same, but anyone may post;
//! - [`Delivery`]: the producer half (`post` / `dispatch`).

mod delivery;
mod handle;

pub use delivery::Delivery;
pub use handle::{Event, PublicEvent};
