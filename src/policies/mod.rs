//! Delivery and recreate policies.
//!
//! This module groups the knobs a consumer chooses when it binds to a topic.
//!
//! ## Contents
//! - [`BackpressureMode`] what a queue keeps while no receiver is active (all / latest)
//! - [`RecreatePolicy`]   what happens to a question interrupted by teardown (rerun / cancel)
//!
//! ## Quick wiring
//! ```text
//! Event::handle_with(consumer, mode, handler)
//!      └─► delivery::SubscriberQueue uses mode for buffering and preemption
//! Survey::respond_with(consumer, mode, policy, responder)
//!      └─► responder receiver uses policy when the instance is destroyed
//! ```
//!
//! ## Defaults
//! - `BackpressureMode::Latest`
//! - `RecreatePolicy::Rerun`

mod backpressure;
mod recreate;

pub use backpressure::BackpressureMode;
pub use recreate::RecreatePolicy;
