// ABOUTME: Consumes outcome records, logs each one and advances the progress bar
// ABOUTME: Tracks per-database run state so lost or duplicated outcomes are detected

use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{ReindexError, Result};
use crate::worker::OutcomeRecord;

const PROGRESS_TEMPLATE: &str =
    "{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed_precise})";

/// Per-database counters, owned by the orchestrator for one database.
#[derive(Debug)]
pub struct RunState {
    database: String,
    total: usize,
    completed: usize,
    failed: usize,
    started: Instant,
}

impl RunState {
    pub fn new(database: impl Into<String>, total: usize) -> Self {
        Self {
            database: database.into(),
            total,
            completed: 0,
            failed: 0,
            started: Instant::now(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    fn record(&mut self, outcome: &OutcomeRecord) {
        self.completed += 1;
        if !outcome.succeeded() {
            self.failed += 1;
        }
    }

    /// Close out the database, failing if the outcome count drifted from the task count.
    pub fn finish(self) -> Result<DatabaseSummary> {
        if self.completed != self.total {
            return Err(ReindexError::Accounting {
                database: self.database,
                expected: self.total,
                actual: self.completed,
            });
        }
        Ok(DatabaseSummary {
            database: self.database,
            total: self.total,
            succeeded: self.completed - self.failed,
            failed: self.failed,
            elapsed: self.started.elapsed(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSummary {
    pub database: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(state: &RunState) -> Self {
        let bar = ProgressBar::new(state.total() as u64);
        bar.set_style(
            ProgressStyle::with_template(PROGRESS_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix(state.database().to_string());
        Self { bar }
    }

    pub fn hidden(state: &RunState) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(state.total() as u64);
        Self { bar }
    }

    fn advance(&self) {
        self.bar.inc(1);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish();
    }
}

/// Drain `outcomes` until the pool closes it, logging and counting each record.
pub async fn aggregate(
    outcomes: &mut mpsc::Receiver<OutcomeRecord>,
    state: &mut RunState,
    progress: &ProgressReporter,
) {
    while let Some(outcome) = outcomes.recv().await {
        log_outcome(&outcome);
        state.record(&outcome);
        progress.advance();
    }
    progress.finish();
}

fn log_outcome(outcome: &OutcomeRecord) {
    let elapsed_ms = outcome.elapsed.as_millis() as u64;
    match &outcome.error {
        None => info!(
            worker = outcome.worker,
            database = %outcome.database,
            statement = %outcome.statement,
            elapsed_ms,
            "Successfully executed"
        ),
        Some(error) => warn!(
            worker = outcome.worker,
            database = %outcome.database,
            statement = %outcome.statement,
            elapsed_ms,
            error = %error,
            "Error executing"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::IndexDescriptor;

    fn outcome(name: &str, error: Option<&str>) -> OutcomeRecord {
        let index = IndexDescriptor::new("public", name);
        OutcomeRecord {
            worker: 1,
            database: "app1".into(),
            statement: format!("REINDEX INDEX {}", index.qualified_name()),
            index,
            error: error.map(str::to_string),
            elapsed: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_aggregate_reaches_total_when_sink_closes() {
        let (tx, mut rx) = mpsc::channel(2);
        tx.send(outcome("idx_a", None)).await.unwrap();
        tx.send(outcome("idx_b", Some("deadlock detected"))).await.unwrap();
        drop(tx);

        let mut state = RunState::new("app1", 2);
        let progress = ProgressReporter::hidden(&state);
        aggregate(&mut rx, &mut state, &progress).await;

        assert_eq!(progress.position(), 2);
        let summary = state.finish().unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_missing_outcome_is_an_accounting_error() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(outcome("idx_a", None)).await.unwrap();
        drop(tx);

        let mut state = RunState::new("app1", 2);
        let progress = ProgressReporter::hidden(&state);
        aggregate(&mut rx, &mut state, &progress).await;

        match state.finish() {
            Err(ReindexError::Accounting {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("expected accounting error, got {:?}", other),
        }
    }

    #[test]
    fn test_fresh_state_has_no_progress() {
        let state = RunState::new("app2", 0);
        assert_eq!(state.completed(), 0);
        let summary = state.finish().unwrap();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.database, "app2");
    }
}
