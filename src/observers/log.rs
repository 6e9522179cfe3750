//! # LogWriter: notices rendered through `tracing`.
//!
//! Item-level notices go to `trace`, slot and queue lifecycle to `debug`,
//! panics and overflow to `warn`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG handoff::observers::log: queue created topic=topic#1 identity=identity#1 mode=latest
//! TRACE handoff::observers::log: item superseded topic=topic#1 identity=identity#1
//! DEBUG handoff::observers::log: survey closed topic=topic#2 responders=2
//! WARN  handoff::observers::log: receiver panicked topic=topic#1 identity=identity#3 info=boom
//! ```

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use super::Observe;
use crate::notices::{Notice, NoticeKind};

/// Observer that logs every notice.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Observe for LogWriter {
    async fn on_notice(&self, n: &Notice) {
        let topic = n.topic.map(|t| t.to_string()).unwrap_or_default();
        let identity = n.identity.map(|i| i.to_string()).unwrap_or_default();
        let reason = n.reason.as_deref().unwrap_or("");

        match n.kind {
            NoticeKind::QueueCreated => {
                debug!(%topic, %identity, mode = reason, "queue created");
            }
            NoticeKind::QueueDisposed => {
                debug!(%topic, %identity, "queue disposed");
            }
            NoticeKind::ItemDelivered => trace!(%topic, %identity, "item delivered"),
            NoticeKind::ItemSuperseded => trace!(%topic, %identity, "item superseded"),
            NoticeKind::ItemDisposed => trace!(%topic, %identity, "item disposed"),
            NoticeKind::DeliveryRedirected => {
                trace!(%topic, %identity, "delivery redirected to a new receiver");
            }
            NoticeKind::DeliveryTornDown => {
                debug!(%topic, %identity, "receiver torn down, item kept");
            }
            NoticeKind::DeliveryAbandoned => {
                debug!(%topic, %identity, "receiver torn down, item abandoned");
            }
            NoticeKind::ReceiverAttached => debug!(%topic, %identity, "receiver attached"),
            NoticeKind::ReceiverDetached => debug!(%topic, %identity, "receiver detached"),
            NoticeKind::ReceiverPanicked => {
                warn!(%topic, %identity, info = reason, "receiver panicked");
            }
            NoticeKind::SurveyAsked => {
                debug!(%topic, responders = n.count.unwrap_or(0), "survey asked");
            }
            NoticeKind::SurveyClosed => {
                debug!(%topic, responders = n.count.unwrap_or(0), "survey closed");
            }
            NoticeKind::ObserverPanicked => {
                warn!(
                    observer = n.observer.as_deref().unwrap_or("unknown"),
                    info = reason,
                    "observer panicked"
                );
            }
            NoticeKind::ObserverOverflow => {
                warn!(
                    observer = n.observer.as_deref().unwrap_or("unknown"),
                    reason,
                    "observer overflow"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
