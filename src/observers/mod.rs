//! Observers of runtime notices.
//!
//! - [`Observe`]: the trait to implement;
//! - [`ObserverSet`]: per-observer bounded queues and workers;
//! - `LogWriter`: built-in observer that logs through `tracing` (feature `logging`).

#[cfg(feature = "logging")]
mod log;
mod observe;
mod set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use observe::Observe;
pub use set::ObserverSet;
