//! # Hub configuration.
//!
//! [`Config`] holds the defaults a [`Hub`](crate::Hub) hands to the handles it creates.
//! Handles can still override mode and policy per binding
//! (`handle_with`, `respond_with`).

use crate::policies::{BackpressureMode, RecreatePolicy};

/// Settings for one hub.
///
/// ## Field semantics
/// - `backpressure`: mode of queues created by `handle` / `respond`
/// - `recreate`: policy of responders bound by `respond`
/// - `bus_capacity`: notice bus ring buffer size (min 1; clamped by Bus)
///
/// All fields are public; the struct is plain data.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default backpressure mode for new subscriber queues.
    pub backpressure: BackpressureMode,

    /// Default recreate policy for survey responders.
    pub recreate: RecreatePolicy,

    /// Capacity of the notice bus broadcast channel.
    ///
    /// Listeners lagging behind by more than `bus_capacity` notices skip the oldest ones.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Sets the default backpressure mode.
    pub fn with_backpressure(mut self, mode: BackpressureMode) -> Self {
        self.backpressure = mode;
        self
    }

    /// Sets the default recreate policy.
    pub fn with_recreate(mut self, policy: RecreatePolicy) -> Self {
        self.recreate = policy;
        self
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `backpressure = Latest`
    /// - `recreate = Rerun`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            backpressure: BackpressureMode::default(),
            recreate: RecreatePolicy::default(),
            bus_capacity: 1024,
        }
    }
}
