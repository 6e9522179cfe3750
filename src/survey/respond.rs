//! # Survey handles: binding responders to consumer instances.
//!
//! A responder runs once per question, while its instance is started, and its
//! result becomes one entry of the asker's [`Answers`] stream.
//!
//! ## Teardown mid-question
//! ```text
//!                    instance destroyed before the responder finished
//!                                         │
//!                 ┌───────────────────────┴───────────────────────┐
//!            RecreatePolicy::Rerun                        RecreatePolicy::Cancel
//!   slot cleared, question stays queued         entry = Err(SurveyError::Cancelled)
//!   for the recreated instance's responder        question leaves the queue
//! ```
//!
//! A responder that already returned (answer or its own error) is never
//! subject to the policy. Replacing a responder mid-question reruns it on the
//! replacement regardless of policy.

use std::collections::HashMap;
use std::future::Future;
use std::ops::Deref;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;

use super::poll::{Answers, Poll};
use super::questionnaire::Questionnaire;
use crate::core::HubId;
use crate::delivery::TopicId;
use crate::delivery::binder::LifecycleBinder;
use crate::delivery::queue::{Handoff, Receiver, Ticket, panic_message};
use crate::error::SurveyError;
use crate::host::{Consumer, InstanceId, Lifecycle};
use crate::notices::Bus;
use crate::policies::{BackpressureMode, RecreatePolicy};

type Bindings<Q, A> = Arc<Mutex<HashMap<InstanceId, LifecycleBinder<Questionnaire<Q, A>>>>>;

/// Survey topic owned by one [`Hub`](crate::Hub).
///
/// Consumers bind with [`respond`](Self::respond); only the owning hub can ask.
pub struct Survey<Q, A> {
    owner: HubId,
    poll: Poll<Q, A>,
    mode: BackpressureMode,
    policy: RecreatePolicy,
    bindings: Bindings<Q, A>,
}

impl<Q, A> Clone for Survey<Q, A> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner,
            poll: self.poll.clone(),
            mode: self.mode,
            policy: self.policy,
            bindings: Arc::clone(&self.bindings),
        }
    }
}

impl<Q, A> Survey<Q, A>
where
    Q: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    pub(crate) fn new(
        owner: HubId,
        bus: Bus,
        mode: BackpressureMode,
        policy: RecreatePolicy,
    ) -> Self {
        Self {
            owner,
            poll: Poll::new(bus),
            mode,
            policy,
            bindings: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Topic of this survey.
    pub fn topic_id(&self) -> TopicId {
        self.poll.topic_id()
    }

    /// Binds `responder` to `consumer` with the hub's default mode and recreate policy.
    pub fn respond<F, Fut>(&self, consumer: &Consumer, responder: F)
    where
        F: Fn(Q) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A, SurveyError>> + Send + 'static,
    {
        self.respond_with(consumer, self.mode, self.policy, responder);
    }

    /// Binds `responder` to `consumer`, replacing any responder that instance bound before.
    pub fn respond_with<F, Fut>(
        &self,
        consumer: &Consumer,
        mode: BackpressureMode,
        policy: RecreatePolicy,
        responder: F,
    ) where
        F: Fn(Q) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A, SurveyError>> + Send + 'static,
    {
        let key = consumer.instance_id();
        let receiver = responder_receiver(consumer.lifecycle(), policy, responder);
        let weak = Arc::downgrade(&self.bindings);
        let binder = LifecycleBinder::new(
            self.poll.topic().clone(),
            consumer.identity().clone(),
            mode,
            receiver,
            move |id| {
                if let Some(bindings) = weak.upgrade() {
                    let mut bindings = bindings.lock();
                    if bindings.get(&key).map(LifecycleBinder::id) == Some(id) {
                        bindings.remove(&key);
                    }
                }
            },
        );

        let previous = self.bindings.lock().insert(key, binder.clone());
        if let Some(previous) = previous {
            previous.unbind();
        }
        binder.bind_to(consumer.lifecycle());
    }

    /// Removes the binding of `consumer`, if any. Queued questions stay queued.
    pub fn unbind(&self, consumer: &Consumer) -> bool {
        let removed = self.bindings.lock().remove(&consumer.instance_id());
        match removed {
            Some(binder) => {
                binder.unbind();
                true
            }
            None => false,
        }
    }

    /// Number of consumer instances currently holding a binding.
    pub fn binding_count(&self) -> usize {
        self.bindings.lock().len()
    }

    pub(crate) fn owner(&self) -> HubId {
        self.owner
    }

    pub(crate) fn poll(&self) -> &Poll<Q, A> {
        &self.poll
    }
}

/// Survey that anyone holding the handle may ask.
pub struct PublicSurvey<Q, A> {
    survey: Survey<Q, A>,
}

impl<Q, A> Clone for PublicSurvey<Q, A> {
    fn clone(&self) -> Self {
        Self {
            survey: self.survey.clone(),
        }
    }
}

impl<Q, A> PublicSurvey<Q, A>
where
    Q: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    pub(crate) fn new(survey: Survey<Q, A>) -> Self {
        Self { survey }
    }

    /// See [`Poll::ask`].
    pub fn ask(&self, question: Q) -> Answers<Q, A> {
        self.survey.poll.ask(question)
    }

    /// Producer handle for this survey.
    pub fn poll(&self) -> Poll<Q, A> {
        self.survey.poll.clone()
    }
}

impl<Q, A> Deref for PublicSurvey<Q, A> {
    type Target = Survey<Q, A>;

    fn deref(&self) -> &Survey<Q, A> {
        &self.survey
    }
}

fn torn_down<Q, A>(questionnaire: &Questionnaire<Q, A>, policy: RecreatePolicy) -> Handoff {
    match policy {
        RecreatePolicy::Rerun => Handoff::TornDown,
        RecreatePolicy::Cancel => {
            questionnaire.error(SurveyError::Cancelled);
            Handoff::Abandoned
        }
    }
}

/// Wraps a responder: wait until started, commit, answer, apply `policy` on teardown.
fn responder_receiver<Q, A, F, Fut>(
    lifecycle: &Lifecycle,
    policy: RecreatePolicy,
    responder: F,
) -> Receiver<Questionnaire<Q, A>>
where
    Q: Clone + Send + Sync + 'static,
    A: Send + 'static,
    F: Fn(Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<A, SurveyError>> + Send + 'static,
{
    let phases = lifecycle.watch();
    let responder = Arc::new(responder);
    Receiver::new(move |questionnaire: Questionnaire<Q, A>, ticket: Ticket| {
        let mut phases = phases.clone();
        let responder = Arc::clone(&responder);
        async move {
            if questionnaire.is_abandoned() {
                return Handoff::Delivered;
            }
            if phases.until_started().await.is_err() {
                return torn_down(&questionnaire, policy);
            }
            if questionnaire.is_abandoned() {
                return Handoff::Delivered;
            }

            ticket.commit();
            let question = questionnaire.question().clone();
            let answer =
                AssertUnwindSafe(async move { (*responder)(question).await }).catch_unwind();
            tokio::select! {
                biased;
                outcome = answer => {
                    match outcome {
                        Ok(Ok(answer)) => questionnaire.answer(answer),
                        Ok(Err(error)) => questionnaire.error(error),
                        Err(payload) => questionnaire.error(SurveyError::Panicked {
                            info: panic_message(payload.as_ref()),
                        }),
                    };
                    Handoff::Delivered
                }
                () = phases.until_destroyed() => torn_down(&questionnaire, policy),
            }
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures::StreamExt;

    use crate::host::RetainedIdentity;

    fn survey(policy: RecreatePolicy) -> Survey<String, String> {
        Survey::new(HubId::next(), Bus::new(64), BackpressureMode::All, policy)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn responders_answer_in_arrival_order() {
        let survey = survey(RecreatePolicy::Rerun);
        let a = Consumer::new(RetainedIdentity::new());
        let b = Consumer::new(RetainedIdentity::new());
        a.lifecycle().start();
        b.lifecycle().start();
        survey.respond(&a, |q: String| async move { Ok(format!("{q}:A")) });
        survey.respond(&b, |q: String| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(format!("{q}:B"))
        });

        let answers: Vec<_> = survey.poll().ask("X".to_string()).collect().await;
        assert_eq!(
            answers,
            vec![Ok("X:A".to_string()), Ok("X:B".to_string())]
        );
    }

    #[tokio::test]
    async fn responder_error_and_panic_become_entries() {
        let survey = survey(RecreatePolicy::Rerun);
        let a = Consumer::new(RetainedIdentity::new());
        let b = Consumer::new(RetainedIdentity::new());
        a.lifecycle().start();
        b.lifecycle().start();
        survey.respond(&a, |_q: String| async { Err::<String, _>(SurveyError::fail("nope")) });
        survey.respond(&b, |q: String| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if q == "X" {
                panic!("bad responder");
            }
            Ok(q)
        });

        let answers: Vec<_> = survey.poll().ask("X".to_string()).collect().await;
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0], Err(SurveyError::fail("nope")));
        assert_eq!(
            answers[1],
            Err(SurveyError::Panicked {
                info: "bad responder".to_string()
            })
        );
    }

    #[tokio::test]
    async fn cancel_policy_reports_teardown() {
        let survey = survey(RecreatePolicy::Cancel);
        let consumer = Consumer::new(RetainedIdentity::new());
        consumer.lifecycle().create();
        survey.respond(&consumer, |q: String| async move { Ok(q) });
        settle().await;

        let mut answers = survey.poll().ask("X".to_string());
        let _ = futures::poll!(answers.next());
        settle().await;
        consumer.lifecycle().destroy();

        assert_eq!(answers.next().await, Some(Err(SurveyError::Cancelled)));
        assert_eq!(answers.next().await, None);
    }

    #[tokio::test]
    async fn rerun_policy_asks_the_recreated_instance() {
        let survey = survey(RecreatePolicy::Rerun);
        let first = Consumer::new(RetainedIdentity::new());
        first.lifecycle().create();
        survey.respond(&first, |_q: String| async { Ok("old".to_string()) });
        settle().await;

        let mut answers = survey.poll().ask("X".to_string());
        let _ = futures::poll!(answers.next());
        settle().await;

        let second = first.recreate();
        survey.respond(&second, |_q: String| async { Ok("new".to_string()) });
        second.lifecycle().start();

        assert_eq!(answers.next().await, Some(Ok("new".to_string())));
        assert_eq!(answers.next().await, None);
    }
}
