//! # Poll: broadcast a question, collect one result per responder.
//!
//! ```text
//! ask(q) ──► Answers::Pending                        (nothing happens yet)
//!               │ first poll_next
//!               ▼
//!          snapshot queues ──► none? ──► closed, empty
//!               │
//!               ▼
//!          Questionnaire(expected = n) ──offer──► queue 1 .. queue n
//!               │
//!               ▼
//!          Answers::Collecting ◄── answer / error from each responder (arrival order)
//!               │ n entries
//!               ▼
//!             closed
//! ```
//!
//! ## Rules
//! - The responder set is fixed at the first poll, not at `ask`.
//! - The stream yields exactly n entries, then ends; it cannot be restarted.
//! - A responder that never runs keeps the stream open.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{self, Context};

use futures::Stream;
use tracing::trace;

use super::questionnaire::{AnswerRx, Questionnaire};
use crate::delivery::TopicId;
use crate::delivery::queue::{Discard, DiscardHook};
use crate::delivery::topic::Topic;
use crate::error::SurveyError;
use crate::notices::{Bus, Notice, NoticeKind};

/// Producer side of a survey topic.
pub struct Poll<Q, A> {
    topic: Topic<Questionnaire<Q, A>>,
}

impl<Q, A> Clone for Poll<Q, A> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic.clone(),
        }
    }
}

impl<Q, A> Poll<Q, A>
where
    Q: Send + Sync + 'static,
    A: Send + 'static,
{
    pub(crate) fn new(bus: Bus) -> Self {
        let discard: DiscardHook<Questionnaire<Q, A>> =
            Arc::new(|q: Questionnaire<Q, A>, reason: Discard| {
                let error = match reason {
                    Discard::Superseded => SurveyError::Superseded,
                    Discard::Disposed => SurveyError::Disposed,
                };
                q.error(error);
            });
        Self {
            topic: Topic::new(bus, Some(discard)),
        }
    }

    /// Returns a lazy stream of answers; the question goes out on its first poll.
    pub fn ask(&self, question: Q) -> Answers<Q, A> {
        Answers {
            state: State::Pending {
                topic: self.topic.clone(),
                question,
            },
        }
    }

    /// Topic this poll asks on.
    pub fn topic_id(&self) -> TopicId {
        self.topic.id()
    }

    /// Number of live responder queues (one per retained identity).
    pub fn responder_count(&self) -> usize {
        self.topic.len()
    }

    pub(crate) fn topic(&self) -> &Topic<Questionnaire<Q, A>> {
        &self.topic
    }
}

enum State<Q, A> {
    Pending {
        topic: Topic<Questionnaire<Q, A>>,
        question: Q,
    },
    Collecting(AnswerRx<A>),
    Done,
}

/// Answers to one question, in arrival order.
///
/// Yields `Ok(answer)` or `Err(SurveyError)` once per responder that was
/// bound when the stream was first polled, then ends. Dropping it early tells
/// responders that have not started yet to skip the question.
#[must_use = "the question is only asked once the stream is polled"]
pub struct Answers<Q, A> {
    state: State<Q, A>,
}

// never pin-projected
impl<Q, A> Unpin for Answers<Q, A> {}

impl<Q, A> Answers<Q, A>
where
    Q: Send + Sync + 'static,
    A: Send + 'static,
{
    fn start(topic: Topic<Questionnaire<Q, A>>, question: Q) -> State<Q, A> {
        let queues = topic.snapshot();
        topic.bus().publish(
            Notice::new(NoticeKind::SurveyAsked)
                .with_topic(topic.id())
                .with_count(queues.len()),
        );
        trace!(topic = %topic.id(), responders = queues.len(), "survey asked");

        if queues.is_empty() {
            topic.bus().publish(
                Notice::new(NoticeKind::SurveyClosed)
                    .with_topic(topic.id())
                    .with_count(0),
            );
            return State::Done;
        }

        let (questionnaire, rx) =
            Questionnaire::new(question, queues.len(), topic.id(), topic.bus().clone());
        for queue in &queues {
            queue.offer(questionnaire.clone());
        }
        State::Collecting(rx)
    }
}

impl<Q, A> Stream for Answers<Q, A>
where
    Q: Send + Sync + 'static,
    A: Send + 'static,
{
    type Item = Result<A, SurveyError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, State::Done) {
                State::Pending { topic, question } => {
                    this.state = Self::start(topic, question);
                }
                State::Collecting(mut rx) => {
                    return match rx.poll_recv(cx) {
                        task::Poll::Ready(Some(entry)) => {
                            this.state = State::Collecting(rx);
                            task::Poll::Ready(Some(entry))
                        }
                        task::Poll::Ready(None) => task::Poll::Ready(None),
                        task::Poll::Pending => {
                            this.state = State::Collecting(rx);
                            task::Poll::Pending
                        }
                    };
                }
                State::Done => return task::Poll::Ready(None),
            }
        }
    }
}
