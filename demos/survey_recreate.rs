//! # Example: survey_recreate
//!
//! Asks two screens a question while one of them is being recreated.
//!
//! Shows how to:
//! - Bind responders with [`RecreatePolicy::Rerun`] and [`RecreatePolicy::Cancel`].
//! - Consume the lazy [`Answers`](handoff::Answers) stream.
//! - See a rerun on the recreated instance and a cancellation entry.
//!
//! ## Flow
//! ```text
//! ask("ready?") ──► "editor" (Rerun)  : slow responder, screen recreated mid-answer ─► new instance answers
//!               └─► "preview" (Cancel): slow responder, screen recreated mid-answer ─► Err(Cancelled)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example survey_recreate
//! ```

use std::time::Duration;

use futures::StreamExt;
use handoff::{BackpressureMode, Consumer, Hub, IdentityRegistry, RecreatePolicy, Survey};

fn respond(
    survey: &Survey<String, String>,
    screen: &Consumer,
    name: &'static str,
    policy: RecreatePolicy,
) {
    survey.respond_with(
        screen,
        BackpressureMode::All,
        policy,
        move |q: String| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(format!("{name}: {q} yes"))
        },
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let hub = Hub::new();
    let identities = IdentityRegistry::new();
    let ready = hub.survey::<String, String>();

    let editor = Consumer::new(identities.get_or_create("editor"));
    let preview = Consumer::new(identities.get_or_create("preview"));
    editor.lifecycle().start();
    preview.lifecycle().start();
    respond(&ready, &editor, "editor#1", RecreatePolicy::Rerun);
    respond(&ready, &preview, "preview#1", RecreatePolicy::Cancel);

    let mut answers = hub.ask(&ready, "ready?".to_string())?;
    let collector = tokio::spawn(async move {
        while let Some(entry) = answers.next().await {
            match entry {
                Ok(answer) => println!("answer: {answer}"),
                Err(err) => println!("error:  {} ({})", err, err.as_label()),
            }
        }
        println!("all responders accounted for");
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    println!("-- recreating both screens --");
    let editor = editor.recreate();
    let preview = preview.recreate();
    respond(&ready, &editor, "editor#2", RecreatePolicy::Rerun);
    respond(&ready, &preview, "preview#2", RecreatePolicy::Cancel);
    editor.lifecycle().start();
    preview.lifecycle().start();

    collector.await?;
    Ok(())
}
