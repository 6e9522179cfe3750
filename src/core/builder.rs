use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::{Config, Hub};
use crate::notices::Bus;
use crate::observers::{Observe, ObserverSet};

/// Builder for a [`Hub`] with optional observers.
pub struct HubBuilder {
    cfg: Config,
    observers: Vec<Arc<dyn Observe>>,
}

impl HubBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            observers: Vec::new(),
        }
    }

    /// Sets notice observers.
    ///
    /// Observers receive runtime notices through dedicated workers with bounded queues.
    pub fn with_observers(mut self, observers: Vec<Arc<dyn Observe>>) -> Self {
        self.observers = observers;
        self
    }

    /// Builds the hub.
    ///
    /// With observers, a listener task forwards the bus into the [`ObserverSet`];
    /// this needs a running tokio runtime.
    pub fn build(self) -> Hub {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let listener = CancellationToken::new();

        if !self.observers.is_empty() {
            let set = ObserverSet::new(self.observers, bus.clone());
            let mut rx = bus.subscribe();
            let token = listener.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        received = rx.recv() => match received {
                            Ok(notice) => set.emit(notice),
                            Err(RecvError::Lagged(_)) => continue,
                            Err(RecvError::Closed) => break,
                        },
                    }
                }
                set.shutdown().await;
            });
        }

        Hub::from_parts(self.cfg, bus, listener)
    }
}
