//! # Example: Schedule and Watch
//!
//! Schedules a batch of doc-tasks for one user, cancels a slow one, prints every
//! lifecycle message as it would be sent over a websocket, then shows the stored
//! completion records and the replay cache.
//!
//! ```text
//! cargo run --example schedule_and_watch
//! RUST_LOG=channel_tasks=debug cargo run --example schedule_and_watch
//! ```

use std::{sync::Arc, time::Duration};

use serde_json::json;
use tracing_subscriber::EnvFilter;

use channel_tasks::{
    Config, DocTaskScheduler, GroupBus, LogWriter, MemoryStore, ScheduleBody, Subscribe,
    SubscriberGroup, TaskRegistry, TaskRunner, builtin,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("channel_tasks=info")),
        )
        .with_target(false)
        .init();

    let cfg = Config::from_env()?;
    let bus = Arc::new(GroupBus::new(cfg.bus_capacity_clamped()));
    let runner = TaskRunner::builder(cfg)
        .with_broadcaster(bus.clone())
        .with_subscribers(vec![Arc::new(LogWriter) as Arc<dyn Subscribe>])
        .build()?;
    let store = Arc::new(MemoryStore::new());
    let scheduler = DocTaskScheduler::new(
        runner.clone(),
        Arc::new(TaskRegistry::with_builtins()),
        store.clone(),
    );

    let alice = SubscriberGroup::new("alice");
    let mut events = bus.subscribe(&alice).await;
    let printer = tokio::spawn(async move {
        while let Some(ev) = events.recv().await {
            println!("ws <- {}", ev.to_message());
        }
    });

    let body: ScheduleBody = serde_json::from_value(json!([
        {"registered_task": builtin::SLEEP_TEST, "inputs": {"duration": 0.995}},
        {"registered_task": builtin::SLEEP_TEST, "inputs": {"duration": 0.95}},
        {"registered_task": builtin::SLEEP_TEST, "inputs": {"duration": 0.94}},
        {"registered_task": builtin::SLEEP_TEST, "inputs": {"duration": 0.8}},
        {"registered_task": builtin::SLEEP_TEST, "inputs": {"duration": 0.15, "raise_error": true}},
        {"registered_task": builtin::SLEEP_TEST, "inputs": {"duration": 10}},
    ]))?;
    let handles = scheduler
        .schedule_doctasks("req-1", &alice, body.into_vec())
        .await?;

    // A rejected batch: unknown parameter plus missing duration.
    let bad: ScheduleBody = serde_json::from_value(json!({
        "registered_task": builtin::SLEEP_TEST,
        "inputs": {"speed": 3}
    }))?;
    if let Err(err) = scheduler.schedule_doctasks("req-2", &alice, bad.into_vec()).await {
        println!("rejected: {err}");
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    if let Some(slow) = handles.last() {
        runner.cancel(&slow.id).await;
    }
    for handle in &handles {
        let done = runner.wait(&handle.id).await?;
        println!("{} -> {}", done.id, done.status);
    }

    for record in store.records().await {
        println!("record #{} {}: {:?}", record.id, record.name, record.document);
    }

    let cached = runner.cache().get(&alice).await?;
    println!("{} events cached for {alice}", cached.len());
    for handle in &handles {
        runner.cache().clear(&alice, &handle.id).await?;
    }
    println!("{} events left after ack", runner.cache().get(&alice).await?.len());

    printer.abort();
    Ok(())
}
