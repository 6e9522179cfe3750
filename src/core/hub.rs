//! # Hub: the producer-side owner of events and surveys.
//!
//! A hub creates handles and is the only one allowed to post or ask through
//! the non-public ones. Consumers bind to handles directly.
//!
//! ```text
//!            ┌──────────── Hub (owner) ─────────────┐
//!            │  event()  ──► Event<T>   ◄── handle() ── consumers
//!            │  survey() ──► Survey<Q,A> ◄── respond() ─ consumers
//!            │  post(&event, v) / ask(&survey, q)    │
//!            │        └─ other hub's handle ─► Error::ForeignHandle
//!            └──────────────── Bus ─────────────────┘
//!                               └──► subscribe() / observers
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::{Config, HubBuilder};
use crate::error::Error;
use crate::event::{Delivery, Event, PublicEvent};
use crate::notices::{Bus, Notice};
use crate::survey::{Answers, Poll, PublicSurvey, Survey};

/// Global counter for hub ids.
static HUB_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identifier of one hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HubId(u64);

impl HubId {
    pub(crate) fn next() -> Self {
        Self(HUB_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hub#{}", self.0)
    }
}

/// Owner context for events and surveys.
pub struct Hub {
    id: HubId,
    cfg: Config,
    bus: Bus,
    listener: CancellationToken,
}

impl Hub {
    /// Creates a hub with the default configuration and no observers.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a hub with `cfg` and no observers.
    pub fn with_config(cfg: Config) -> Self {
        HubBuilder::new(cfg).build()
    }

    /// Starts a builder.
    pub fn builder(cfg: Config) -> HubBuilder {
        HubBuilder::new(cfg)
    }

    pub(crate) fn from_parts(cfg: Config, bus: Bus, listener: CancellationToken) -> Self {
        Self {
            id: HubId::next(),
            cfg,
            bus,
            listener,
        }
    }

    /// Identity checked against event and survey owners.
    pub fn id(&self) -> HubId {
        self.id
    }

    /// Defaults applied to handles created by this hub.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Raw notice stream of this hub.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.bus.subscribe()
    }

    /// New event only this hub can post to.
    pub fn event<T>(&self) -> Event<T>
    where
        T: Clone + Send + 'static,
    {
        Event::new(self.id, self.bus.clone(), self.cfg.backpressure)
    }

    /// New event anyone holding the handle can post to.
    pub fn public_event<T>(&self) -> PublicEvent<T>
    where
        T: Clone + Send + 'static,
    {
        PublicEvent::new(self.event())
    }

    /// New survey only this hub can ask.
    pub fn survey<Q, A>(&self) -> Survey<Q, A>
    where
        Q: Clone + Send + Sync + 'static,
        A: Send + 'static,
    {
        Survey::new(
            self.id,
            self.bus.clone(),
            self.cfg.backpressure,
            self.cfg.recreate,
        )
    }

    /// New survey anyone holding the handle can ask.
    pub fn public_survey<Q, A>(&self) -> PublicSurvey<Q, A>
    where
        Q: Clone + Send + Sync + 'static,
        A: Send + 'static,
    {
        PublicSurvey::new(self.survey())
    }

    /// Posts `value` to every subscriber of `event`.
    ///
    /// # Errors
    /// [`Error::ForeignHandle`] if `event` was created by another hub.
    pub fn post<T>(&self, event: &Event<T>, value: T) -> Result<(), Error>
    where
        T: Clone + Send + 'static,
    {
        self.delivery(event)?.post(value);
        Ok(())
    }

    /// Producer handle of an owned event, for repeated posting.
    ///
    /// # Errors
    /// [`Error::ForeignHandle`] if `event` was created by another hub.
    pub fn delivery<T>(&self, event: &Event<T>) -> Result<Delivery<T>, Error>
    where
        T: Clone + Send + 'static,
    {
        if event.owner() != self.id {
            return Err(Error::ForeignHandle {
                topic: event.topic_id(),
            });
        }
        Ok(event.delivery().clone())
    }

    /// Asks every responder of `survey`; see [`Poll::ask`].
    ///
    /// # Errors
    /// [`Error::ForeignHandle`] if `survey` was created by another hub.
    pub fn ask<Q, A>(&self, survey: &Survey<Q, A>, question: Q) -> Result<Answers<Q, A>, Error>
    where
        Q: Clone + Send + Sync + 'static,
        A: Send + 'static,
    {
        Ok(self.poll(survey)?.ask(question))
    }

    /// Producer handle of an owned survey.
    ///
    /// # Errors
    /// [`Error::ForeignHandle`] if `survey` was created by another hub.
    pub fn poll<Q, A>(&self, survey: &Survey<Q, A>) -> Result<Poll<Q, A>, Error>
    where
        Q: Clone + Send + Sync + 'static,
        A: Send + 'static,
    {
        if survey.owner() != self.id {
            return Err(Error::ForeignHandle {
                topic: survey.topic_id(),
            });
        }
        Ok(survey.poll().clone())
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("id", &self.id)
            .field("config", &self.cfg)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn foreign_handles_are_rejected() {
        let a = Hub::new();
        let b = Hub::new();
        let event = a.event::<u32>();
        let survey = a.survey::<String, String>();

        assert!(a.post(&event, 1).is_ok());
        assert_eq!(
            b.post(&event, 1),
            Err(Error::ForeignHandle {
                topic: event.topic_id()
            })
        );
        assert!(a.ask(&survey, "q".into()).is_ok());
        assert!(matches!(
            b.ask(&survey, "q".into()),
            Err(Error::ForeignHandle { .. })
        ));
    }

    #[tokio::test]
    async fn handles_use_config_defaults() {
        let hub =
            Hub::with_config(Config::default().with_backpressure(crate::BackpressureMode::All));
        assert_eq!(hub.config().backpressure, crate::BackpressureMode::All);
        let _ = hub.public_event::<u8>();
    }
}
