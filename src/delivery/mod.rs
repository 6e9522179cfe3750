//! Delivery engine core.
//!
//! - [`queue`]: per-(topic, identity) buffer, consumer loop and receiver handoff;
//! - [`topic`]: identity → queue table with snapshot fan-out;
//! - [`binder`]: attaches a consumer instance's receiver while it is alive.

pub(crate) mod binder;
pub(crate) mod queue;
pub(crate) mod topic;

pub use topic::TopicId;
