//! Runtime notices: types and broadcast bus.
//!
//! This module groups the notice **data model** and the **bus** used to
//! publish runtime notices from subscriber queues, topics and surveys.
//!
//! ## Contents
//! - [`NoticeKind`], [`Notice`] classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `SubscriberQueue` loops, `Topic`, `Poll::ask`, `ObserverSet` workers.
//! - **Consumers**: the hub's observer listener (fans out to `ObserverSet`) and
//!   any receiver obtained from `Hub::subscribe()`.

mod bus;
mod notice;

pub use bus::Bus;
pub use notice::{Notice, NoticeKind};
