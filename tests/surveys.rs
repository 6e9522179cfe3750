use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use handoff::{
    BackpressureMode, Config, Consumer, Error, Hub, IdentityRegistry, RecreatePolicy, SurveyError,
};

async fn quiet() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

async fn eventually(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn hub(policy: RecreatePolicy) -> Hub {
    Hub::with_config(
        Config::default()
            .with_backpressure(BackpressureMode::All)
            .with_recreate(policy),
    )
}

#[tokio::test]
async fn two_responders_two_answers_then_close() -> anyhow::Result<()> {
    let hub = hub(RecreatePolicy::Rerun);
    let survey = hub.survey::<String, String>();
    let registry = IdentityRegistry::new();

    let mut consumers = Vec::new();
    for (key, answer) in [("a", "A"), ("b", "B")] {
        let consumer = Consumer::new(registry.get_or_create(key));
        consumer.lifecycle().start();
        survey.respond(&consumer, move |_q: String| async move {
            Ok(answer.to_string())
        });
        consumers.push(consumer);
    }

    let answers: HashSet<String> = hub
        .ask(&survey, "X".to_string())?
        .map(|a| a.expect("answer"))
        .collect()
        .await;
    assert_eq!(answers, HashSet::from(["A".to_string(), "B".to_string()]));
    Ok(())
}

#[tokio::test]
async fn no_responders_means_empty_answers() -> anyhow::Result<()> {
    let hub = hub(RecreatePolicy::Rerun);
    let survey = hub.survey::<String, String>();

    let answers: Vec<_> = hub.ask(&survey, "X".to_string())?.collect().await;
    assert!(answers.is_empty());
    Ok(())
}

#[tokio::test]
async fn responder_set_is_fixed_at_first_poll() -> anyhow::Result<()> {
    let hub = hub(RecreatePolicy::Rerun);
    let survey = hub.survey::<u32, u32>();
    let answers = hub.ask(&survey, 1)?;

    let consumer = Consumer::new(IdentityRegistry::new().get_or_create("late"));
    consumer.lifecycle().start();
    survey.respond(&consumer, |q: u32| async move { Ok(q * 10) });

    let answers: Vec<_> = answers.collect().await;
    assert_eq!(answers, vec![Ok(10)]);
    Ok(())
}

#[tokio::test]
async fn rerun_reissues_to_the_recreated_instance() -> anyhow::Result<()> {
    let hub = hub(RecreatePolicy::Rerun);
    let survey = hub.survey::<String, String>();
    let registry = IdentityRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = Consumer::new(registry.get_or_create("screen"));
    first.lifecycle().start();
    let counter = Arc::clone(&calls);
    survey.respond(&first, move |_q: String| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<Result<String, SurveyError>>()
    });

    let mut answers = hub.ask(&survey, "X".to_string())?;
    assert!(futures::poll!(answers.next()).is_pending());
    quiet().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let second = first.recreate();
    survey.respond(&second, |q: String| async move { Ok(format!("{q} again")) });
    second.lifecycle().start();

    assert_eq!(answers.next().await, Some(Ok("X again".to_string())));
    assert_eq!(answers.next().await, None);
    Ok(())
}

#[tokio::test]
async fn cancel_surfaces_an_error_and_does_not_rerun() -> anyhow::Result<()> {
    let hub = hub(RecreatePolicy::Cancel);
    let survey = hub.survey::<String, String>();
    let registry = IdentityRegistry::new();

    let first = Consumer::new(registry.get_or_create("screen"));
    first.lifecycle().start();
    survey.respond(&first, |_q: String| {
        std::future::pending::<Result<String, SurveyError>>()
    });

    let mut answers = hub.ask(&survey, "X".to_string())?;
    assert!(futures::poll!(answers.next()).is_pending());
    quiet().await;

    let second = first.recreate();
    let reruns = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reruns);
    survey.respond(&second, move |q: String| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(q) }
    });
    second.lifecycle().start();

    assert_eq!(answers.next().await, Some(Err(SurveyError::Cancelled)));
    assert_eq!(answers.next().await, None);
    quiet().await;
    assert_eq!(reruns.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn completed_answer_is_not_rerun_after_teardown() -> anyhow::Result<()> {
    let hub = hub(RecreatePolicy::Rerun);
    let survey = hub.survey::<u32, u32>();
    let registry = IdentityRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = Consumer::new(registry.get_or_create("screen"));
    first.lifecycle().start();
    let counter = Arc::clone(&calls);
    survey.respond(&first, move |q: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(q + 1) }
    });

    let answers: Vec<_> = hub.ask(&survey, 1)?.collect().await;
    assert_eq!(answers, vec![Ok(2)]);

    let second = first.recreate();
    let counter = Arc::clone(&calls);
    survey.respond(&second, move |q: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(q + 1) }
    });
    second.lifecycle().start();
    quiet().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn invalidated_identity_settles_as_disposed() -> anyhow::Result<()> {
    let hub = hub(RecreatePolicy::Rerun);
    let survey = hub.survey::<u32, u32>();
    let registry = IdentityRegistry::new();

    let consumer = Consumer::new(registry.get_or_create("screen"));
    consumer.lifecycle().create();
    survey.respond(&consumer, |q: u32| async move { Ok(q) });
    quiet().await;

    let mut answers = hub.ask(&survey, 5)?;
    assert!(futures::poll!(answers.next()).is_pending());
    registry.invalidate("screen");

    assert_eq!(answers.next().await, Some(Err(SurveyError::Disposed)));
    assert_eq!(answers.next().await, None);
    Ok(())
}

#[tokio::test]
async fn foreign_hub_cannot_ask() {
    let owner = hub(RecreatePolicy::Rerun);
    let other = hub(RecreatePolicy::Rerun);
    let survey = owner.survey::<u32, u32>();

    assert!(matches!(
        other.ask(&survey, 1),
        Err(Error::ForeignHandle { topic }) if topic == survey.topic_id()
    ));
}

#[tokio::test]
async fn public_survey_is_askable_by_anyone() {
    let hub = hub(RecreatePolicy::Rerun);
    let survey = hub.public_survey::<u32, u32>();
    let consumer = Consumer::new(IdentityRegistry::new().get_or_create("screen"));
    consumer.lifecycle().start();
    survey.respond(&consumer, |q: u32| async move { Ok(q + 1) });

    let answers: Vec<_> = survey.ask(41).collect().await;
    assert_eq!(answers, vec![Ok(42)]);
}

#[tokio::test]
async fn dropped_answers_skip_responders_that_have_not_started() -> anyhow::Result<()> {
    let hub = hub(RecreatePolicy::Rerun);
    let survey = hub.survey::<u32, u32>();
    let consumer = Consumer::new(IdentityRegistry::new().get_or_create("screen"));
    consumer.lifecycle().create();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    survey.respond(&consumer, move |q: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(q) }
    });

    let mut answers = hub.ask(&survey, 1)?;
    assert!(futures::poll!(answers.next()).is_pending());
    quiet().await;
    drop(answers);

    consumer.lifecycle().start();
    quiet().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(survey.binding_count(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_holds_when_the_replacement_starts_at_once() -> anyhow::Result<()> {
    for _ in 0..50 {
        let hub = hub(RecreatePolicy::Cancel);
        let survey = hub.survey::<u32, u32>();
        let registry = IdentityRegistry::new();

        let first = Consumer::new(registry.get_or_create("screen"));
        first.lifecycle().start();
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        survey.respond(&first, move |_q: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<Result<u32, SurveyError>>()
        });

        let mut answers = hub.ask(&survey, 1)?;
        assert!(futures::poll!(answers.next()).is_pending());
        eventually(|| started.load(Ordering::SeqCst) == 1).await;

        let second = first.recreate();
        let reruns = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reruns);
        survey.respond(&second, move |q: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(q) }
        });
        second.lifecycle().start();

        assert_eq!(answers.next().await, Some(Err(SurveyError::Cancelled)));
        assert_eq!(answers.next().await, None);
        quiet().await;
        assert_eq!(reruns.load(Ordering::SeqCst), 0);
    }
    Ok(())
}
