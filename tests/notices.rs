use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use handoff::{
    BackpressureMode, Config, Consumer, Hub, IdentityRegistry, Notice, NoticeKind, Observe,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;

async fn next_of(rx: &mut broadcast::Receiver<Notice>, kind: NoticeKind) -> Notice {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(n) if n.kind == kind => return n,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
            }
        }
    })
    .await
    .expect("notice in time")
}

#[tokio::test]
async fn queue_lifecycle_is_published() {
    let hub = Hub::with_config(Config::default().with_backpressure(BackpressureMode::Latest));
    let mut rx = hub.subscribe();
    let event = hub.event::<u32>();
    let registry = IdentityRegistry::new();
    let consumer = Consumer::new(registry.get_or_create("screen"));
    consumer.lifecycle().create();
    event.handle(&consumer, |_v: u32| async {});

    let created = next_of(&mut rx, NoticeKind::QueueCreated).await;
    assert_eq!(created.topic, Some(event.topic_id()));
    assert_eq!(created.identity, Some(consumer.identity().id()));
    assert_eq!(created.reason.as_deref(), Some("latest"));

    hub.post(&event, 1).expect("post");
    hub.post(&event, 2).expect("post");
    next_of(&mut rx, NoticeKind::ItemSuperseded).await;

    registry.invalidate("screen");
    next_of(&mut rx, NoticeKind::QueueDisposed).await;
}

#[tokio::test]
async fn surveys_publish_asked_and_closed() {
    let hub = Hub::new();
    let mut rx = hub.subscribe();
    let survey = hub.survey::<u32, u32>();

    let answers: Vec<_> = futures::StreamExt::collect(hub.ask(&survey, 1).expect("ask")).await;
    assert!(answers.is_empty());

    let asked = next_of(&mut rx, NoticeKind::SurveyAsked).await;
    assert_eq!(asked.count, Some(0));
    let closed = next_of(&mut rx, NoticeKind::SurveyClosed).await;
    assert_eq!(closed.topic, Some(survey.topic_id()));
}

#[derive(Clone, Default)]
struct Collect {
    kinds: Arc<Mutex<Vec<NoticeKind>>>,
}

#[async_trait]
impl Observe for Collect {
    async fn on_notice(&self, notice: &Notice) {
        self.kinds.lock().push(notice.kind);
    }
    fn name(&self) -> &'static str {
        "collect"
    }
}

#[tokio::test]
async fn observers_receive_hub_notices() {
    let collect = Collect::default();
    let hub = Hub::builder(Config::default())
        .with_observers(vec![Arc::new(collect.clone()) as Arc<dyn Observe>])
        .build();
    let event = hub.event::<u32>();
    let consumer = Consumer::new(IdentityRegistry::new().get_or_create("screen"));
    consumer.lifecycle().start();
    event.handle(&consumer, |_v: u32| async {});
    hub.post(&event, 1).expect("post");

    tokio::time::timeout(Duration::from_secs(2), async {
        while !collect.kinds.lock().contains(&NoticeKind::ItemDelivered) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("delivered notice observed");

    let kinds = collect.kinds.lock().clone();
    assert!(kinds.contains(&NoticeKind::QueueCreated));
    assert!(kinds.contains(&NoticeKind::ReceiverAttached));
}
