//! # Questionnaire: one broadcast question and its outstanding count.
//!
//! Created by the first poll of an [`Answers`](crate::Answers) stream with
//! `expected` = number of queues snapshotted at that moment. Each of those
//! queues settles it exactly once: an answer, an error or a discard.
//!
//! ```text
//! answer(a) / error(e) ──► lock ─► remaining -= 1 ─► send ─► remaining == 0 ? close
//! ```
//!
//! Settlements beyond `expected` are ignored, so the output closes exactly once.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::delivery::TopicId;
use crate::error::SurveyError;
use crate::notices::{Bus, Notice, NoticeKind};

pub(crate) type AnswerTx<A> = mpsc::UnboundedSender<Result<A, SurveyError>>;
pub(crate) type AnswerRx<A> = mpsc::UnboundedReceiver<Result<A, SurveyError>>;

struct Outstanding<A> {
    remaining: usize,
    tx: Option<AnswerTx<A>>,
}

struct Inner<Q, A> {
    question: Q,
    expected: usize,
    topic: TopicId,
    bus: Bus,
    outstanding: Mutex<Outstanding<A>>,
}

/// Shared in-flight state of one question.
pub(crate) struct Questionnaire<Q, A> {
    inner: Arc<Inner<Q, A>>,
}

impl<Q, A> Clone for Questionnaire<Q, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Q, A> Questionnaire<Q, A> {
    pub(crate) fn new(
        question: Q,
        expected: usize,
        topic: TopicId,
        bus: Bus,
    ) -> (Self, AnswerRx<A>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let outstanding = Outstanding {
            remaining: expected,
            tx: (expected > 0).then_some(tx),
        };
        let q = Self {
            inner: Arc::new(Inner {
                question,
                expected,
                topic,
                bus,
                outstanding: Mutex::new(outstanding),
            }),
        };
        (q, rx)
    }

    pub(crate) fn question(&self) -> &Q {
        &self.inner.question
    }

    pub(crate) fn expected(&self) -> usize {
        self.inner.expected
    }

    pub(crate) fn remaining(&self) -> usize {
        self.inner.outstanding.lock().remaining
    }

    /// True once nobody is listening: the asker dropped the stream or it already closed.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.inner
            .outstanding
            .lock()
            .tx
            .as_ref()
            .is_none_or(|tx| tx.is_closed())
    }

    pub(crate) fn answer(&self, answer: A) -> bool {
        self.settle(Ok(answer))
    }

    pub(crate) fn error(&self, error: SurveyError) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, entry: Result<A, SurveyError>) -> bool {
        let closed = {
            let mut outstanding = self.inner.outstanding.lock();
            if outstanding.remaining == 0 {
                return false;
            }
            outstanding.remaining -= 1;
            if let Some(tx) = &outstanding.tx {
                let _ = tx.send(entry);
            }
            if outstanding.remaining == 0 {
                outstanding.tx = None;
                true
            } else {
                false
            }
        };
        if closed {
            self.inner.bus.publish(
                Notice::new(NoticeKind::SurveyClosed)
                    .with_topic(self.inner.topic)
                    .with_count(self.inner.expected),
            );
        }
        true
    }
}

impl<Q, A> fmt::Debug for Questionnaire<Q, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Questionnaire")
            .field("topic", &self.inner.topic)
            .field("expected", &self.expected())
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questionnaire(expected: usize) -> (Questionnaire<&'static str, u32>, AnswerRx<u32>) {
        Questionnaire::new("q", expected, TopicId::from_raw(1), Bus::new(16))
    }

    #[tokio::test]
    async fn closes_after_expected_settlements() {
        let (q, mut rx) = questionnaire(2);
        assert!(q.answer(1));
        assert!(q.error(SurveyError::Cancelled));
        assert!(!q.answer(3));

        assert_eq!(rx.recv().await, Some(Ok(1)));
        assert_eq!(rx.recv().await, Some(Err(SurveyError::Cancelled)));
        assert_eq!(rx.recv().await, None);
        assert_eq!(q.remaining(), 0);
    }

    #[tokio::test]
    async fn dropped_stream_marks_it_abandoned() {
        let (q, rx) = questionnaire(1);
        assert!(!q.is_abandoned());
        drop(rx);
        assert!(q.is_abandoned());
        assert!(q.answer(1));
    }

    #[test]
    fn empty_questionnaire_is_closed_from_the_start() {
        let (q, _rx) = questionnaire(0);
        assert!(q.is_abandoned());
        assert!(!q.answer(1));
        assert_eq!(q.expected(), 0);
        assert_eq!(*q.question(), "q");
    }
}
