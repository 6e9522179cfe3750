//! # handoff
//!
//! **Handoff** delivers events and broadcast surveys from a long-lived producer
//! to short-lived, intermittently active consumers.
//!
//! A consumer instance (a screen, a session, a widget) comes and goes; the
//! logical subscriber behind it keeps a *retained identity* across those
//! recreations. Every (topic, retained identity) pair owns one buffered queue,
//! so an event posted while no instance is active waits for the next one, and a
//! question asked mid-recreation can be rerun on the new instance.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Hub ── post(&event, v) ──► Delivery ──snapshot──┬──► SubscriberQueue (identity A) ──► handler (instance A2)
//!    │                                              └──► SubscriberQueue (identity B) ──► (no receiver: buffered)
//!    │
//!    └── ask(&survey, q) ──► Answers (lazy) ──first poll──► Questionnaire(n) ──► each responder queue
//!                                 ▲                                                   │
//!                                 └──────────── answer / error per responder ─────────┘
//!
//!   Lifecycle (per instance) ──► LifecycleBinder ──► set / clear the queue's receiver
//!   RetainedIdentity::invalidate() ──► queues of that identity disposed
//! ```
//!
//! ### One queue's consumer loop
//! ```text
//! loop {
//!   ├─► take next item (All: FIFO; Latest: newest only)
//!   ├─► wait for a receiver
//!   ├─► run receiver(item), racing:
//!   │       ├─ receiver replaced        ─► drop attempt, retry with the new one
//!   │       ├─ newer item (Latest)      ─► drop attempt and stale item, retry newest
//!   │       ├─ disposed                 ─► discard
//!   │       └─ finished:
//!   │            ├─ Delivered  ─► next item
//!   │            ├─ TornDown   ─► clear slot, same item waits for the next receiver
//!   │            └─ Abandoned  ─► clear slot, next item
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **Events**        | Post once, every subscribed identity gets it when active.     | [`Event`], [`PublicEvent`], [`Delivery`]   |
//! | **Surveys**       | Ask all responders, stream one answer per responder.          | [`Survey`], [`PublicSurvey`], [`Answers`]  |
//! | **Policies**      | Buffering while inactive, teardown of in-flight questions.    | [`BackpressureMode`], [`RecreatePolicy`]   |
//! | **Host**          | Lifecycles and retained identities the engine follows.        | [`Lifecycle`], [`IdentityRegistry`]        |
//! | **Observability** | Runtime notices on a broadcast bus, pluggable observers.      | [`Notice`], [`Observe`], [`ObserverSet`]   |
//! | **Errors**        | Illegal usage and survey error entries.                       | [`Error`], [`SurveyError`]                 |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] observer that logs notices through `tracing`.
//!
//! ## Example
//! ```rust
//! use futures::StreamExt;
//! use handoff::{Consumer, Hub, IdentityRegistry};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = Hub::new();
//!     let identities = IdentityRegistry::new();
//!
//!     let greeting = hub.event::<String>();
//!     let status = hub.survey::<(), &'static str>();
//!
//!     let screen = Consumer::new(identities.get_or_create("main"));
//!     screen.lifecycle().start();
//!     greeting.handle(&screen, |text| async move { println!("{text}") });
//!     status.respond(&screen, |()| async { Ok("idle") });
//!
//!     hub.post(&greeting, "hello".to_string())?;
//!
//!     let answers: Vec<_> = hub.ask(&status, ())?.collect().await;
//!     assert_eq!(answers, vec![Ok("idle")]);
//!     Ok(())
//! }
//! ```
mod core;
mod delivery;
mod error;
mod event;
mod host;
mod notices;
mod observers;
mod policies;
mod survey;

// ---- Public re-exports ----

pub use self::core::{Config, Hub, HubBuilder, HubId};
pub use delivery::TopicId;
pub use error::{Error, SurveyError};
pub use event::{Delivery, Event, PublicEvent};
pub use host::{
    CallbackId, Consumer, IdentityId, IdentityRegistry, InstanceId, Lifecycle, Phase,
    RetainedIdentity,
};
pub use notices::{Bus, Notice, NoticeKind};
pub use observers::{Observe, ObserverSet};
pub use policies::{BackpressureMode, RecreatePolicy};
pub use survey::{Answers, Poll, PublicSurvey, Survey};

// Optional: expose a built-in logging observer.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogWriter;
