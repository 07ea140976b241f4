//! Structured event records written to the JSON-lines event log

mod common;

use assert_fs::TempDir;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use common::{engine, private, public, seed_local, FailingLister, FakeVcs};
use repomirror::config::LoggingConfig;
use repomirror::logging;
use repomirror::{FetchError, Partition, SyncEngine, SyncOptions};

/// Logging config whose console level would hide every info record
fn quiet_logging(event_log: &Path) -> LoggingConfig {
    LoggingConfig {
        level: "error".to_string(),
        event_log: Some(event_log.to_string_lossy().into_owned()),
        ..LoggingConfig::default()
    }
}

fn read_events(event_log: &Path) -> Vec<Value> {
    std::fs::read_to_string(event_log)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn with_event(events: &[Value], kind: &str) -> Vec<Value> {
    events
        .iter()
        .filter(|e| e["fields"]["event"] == kind)
        .cloned()
        .collect()
}

#[tokio::test]
async fn test_every_attempted_action_is_recorded() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("mirror");
    let event_log = temp.path().join("events.jsonl");
    seed_local(&root, Partition::Public, "steady");
    seed_local(&root, Partition::Private, "gone");

    let subscriber = logging::build_subscriber(false, &quiet_logging(&event_log)).unwrap();
    let _guard = tracing::subscriber::set_default(subscriber);

    let vcs = Arc::new(FakeVcs::failing_for(&["broken"]));
    let report = engine(
        vec![public("steady"), private("fresh"), public("broken")],
        vcs,
        &root,
        2,
    )
    .run()
    .await
    .unwrap();

    let events = read_events(&event_log);
    let actions = with_event(&events, "action");
    assert_eq!(actions.len(), report.records.len());
    assert_eq!(actions.len(), 4);

    for action in &actions {
        let fields = &action["fields"];
        assert!(fields["action"].is_string());
        assert!(fields["repo"].is_string());
        assert!(fields["partition"].is_string());
    }

    let failed: Vec<&Value> = actions
        .iter()
        .filter(|a| a["fields"]["outcome"] == "failure")
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["fields"]["repo"], "broken");
    assert_eq!(failed[0]["fields"]["error_kind"], "vcs_operation");

    let summaries = with_event(&events, "summary");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["fields"]["cloned"], 1);
    assert_eq!(summaries[0]["fields"]["errors"], 1);
}

#[tokio::test]
async fn test_fatal_run_still_writes_summary() {
    let temp = TempDir::new().unwrap();
    let event_log = temp.path().join("events.jsonl");

    let subscriber = logging::build_subscriber(false, &quiet_logging(&event_log)).unwrap();
    let _guard = tracing::subscriber::set_default(subscriber);

    let engine = SyncEngine::new(
        Arc::new(FailingLister::new(|| {
            FetchError::Authentication("Bad credentials".to_string())
        })),
        Arc::new(FakeVcs::new()),
        temp.path().join("mirror"),
        SyncOptions::default(),
    );
    assert!(engine.run().await.is_err());

    let events = read_events(&event_log);
    assert!(with_event(&events, "action").is_empty());

    let summaries = with_event(&events, "summary");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["fields"]["errors"], 0);
    assert!(summaries[0]["fields"]["fatal"]
        .as_str()
        .is_some_and(|fatal| fatal.contains("Bad credentials")));
}

#[tokio::test]
async fn test_conflicts_share_the_action_schema() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("mirror");
    let event_log = temp.path().join("events.jsonl");
    seed_local(&root, Partition::Public, "twin");
    seed_local(&root, Partition::Private, "twin");

    let subscriber = logging::build_subscriber(false, &quiet_logging(&event_log)).unwrap();
    let _guard = tracing::subscriber::set_default(subscriber);

    engine(vec![public("twin")], Arc::new(FakeVcs::new()), &root, 1)
        .run()
        .await
        .unwrap();

    let actions = with_event(&read_events(&event_log), "action");
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["fields"]["action"], "none");
    assert_eq!(actions[0]["fields"]["repo"], "twin");
    assert_eq!(actions[0]["fields"]["error_kind"], "inconsistent_local_state");
}
