// ABOUTME: Checks the run log written while the orchestrator processes a server
// ABOUTME: Outcome records, skip notices and the completion line all land in the file

mod common;

use std::collections::HashSet;
use std::io::Read;
use std::sync::{Arc, Mutex};

use common::{options, two_app_server, FakeConnector, ServerState};
use postgres_reindexer::logging::run_log_layer;
use postgres_reindexer::Orchestrator;
use tracing_subscriber::layer::SubscriberExt;

async fn run_with_log(server: ServerState) -> String {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let writer = file.reopen().unwrap();
    let subscriber = tracing_subscriber::registry().with(run_log_layer(Mutex::new(writer)));
    let _guard = tracing::subscriber::set_default(subscriber);

    let orchestrator = Orchestrator::new(
        FakeConnector {
            server: Arc::new(server),
        },
        options(),
    );
    orchestrator.run().await.unwrap();

    let mut contents = String::new();
    file.read_to_string(&mut contents).unwrap();
    contents
}

#[tokio::test]
async fn test_run_log_records_outcomes_skips_and_completion() {
    let log = run_with_log(two_app_server()).await;

    let outcomes: Vec<&str> = log
        .lines()
        .filter(|line| line.contains("Successfully executed"))
        .collect();
    assert_eq!(outcomes.len(), 2, "run log:\n{}", log);
    assert!(outcomes.iter().all(|line| line.contains("database=app1")));
    assert!(outcomes.iter().any(|line| line.contains(r#""public"."idx_a""#)));
    assert!(outcomes.iter().any(|line| line.contains(r#""public"."idx_b""#)));

    assert!(log
        .lines()
        .any(|line| line.contains("No indexes found in database: app2, skipping")));

    let last = log.lines().last().unwrap_or_default();
    assert!(last.contains("All tasks completed"), "last line: {}", last);
    assert!(!log.contains("Error executing"));
}

#[tokio::test]
async fn test_run_log_keeps_failure_text_for_failed_task() {
    let log = run_with_log(ServerState {
        failing: HashSet::from(["idx_b".to_string()]),
        ..two_app_server()
    })
    .await;

    let failures: Vec<&str> = log
        .lines()
        .filter(|line| line.contains("Error executing"))
        .collect();
    assert_eq!(failures.len(), 1, "run log:\n{}", log);
    assert!(failures[0].contains(r#""public"."idx_b""#));
    assert!(failures[0].contains("canceling statement due to lock timeout"));
    assert!(failures[0].contains("WARN"));

    assert_eq!(
        log.lines()
            .filter(|line| line.contains("Successfully executed"))
            .count(),
        1
    );
    assert!(log.contains("All tasks completed (1 databases, 2 indexes, 1 failed)"));
}
