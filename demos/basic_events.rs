//! # Example: basic_events
//!
//! One screen, recreated while events keep coming.
//!
//! Shows how to:
//! - Create an owned [`Event`] on a [`Hub`] and post through the hub.
//! - Bind a handler to a [`Consumer`] and let its lifecycle drive delivery.
//! - Keep undelivered events across a destroy/recreate cycle (`All` mode).
//! - Watch the engine through the built-in `LogWriter` observer.
//!
//! ## Flow
//! ```text
//! hub.post(1) ──► queue(identity "main") ──► screen#1 handler
//! screen#1 destroyed (recreate)
//! hub.post(2), hub.post(3) ──► buffered
//! screen#2 started ──► handler gets 2, 3
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example basic_events --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use handoff::{
    BackpressureMode, Config, Consumer, Event, Hub, IdentityRegistry, LogWriter, Observe,
};
use tracing_subscriber::EnvFilter;

fn bind(event: &Event<u32>, screen: &Consumer, label: &'static str) {
    event.handle(screen, move |n| async move {
        println!("[{label}] got event {n}");
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = Config::default().with_backpressure(BackpressureMode::All);
    let hub = Hub::builder(cfg)
        .with_observers(vec![Arc::new(LogWriter::new()) as Arc<dyn Observe>])
        .build();
    let identities = IdentityRegistry::new();
    let counter = hub.event::<u32>();

    let screen = Consumer::new(identities.get_or_create("main"));
    screen.lifecycle().start();
    bind(&counter, &screen, "screen#1");

    hub.post(&counter, 1)?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("-- recreating screen --");
    let screen = screen.recreate();
    hub.post(&counter, 2)?;
    hub.post(&counter, 3)?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    bind(&counter, &screen, "screen#2");
    screen.lifecycle().start();
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("-- screen closed for good --");
    identities.invalidate("main");
    hub.post(&counter, 4)?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
