// ABOUTME: Drives the run: discover databases, then reindex each one in turn
// ABOUTME: Databases are processed serially; indexes within one run concurrently

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{OnDatabaseError, ReindexConfig};
use crate::error::{ReindexError, Result};
use crate::report::{aggregate, DatabaseSummary, ProgressReporter, RunState};
use crate::session::{Connector, DatabaseSession};
use crate::task::generate_tasks;
use crate::worker::{self, WorkerPoolOptions};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub workers: usize,
    pub exclude_databases: Vec<String>,
    pub exclude_schemas: Vec<String>,
    pub on_database_error: OnDatabaseError,
    /// Draw progress bars and print milestones to stdout.
    pub interactive: bool,
}

impl RunOptions {
    pub fn from_config(config: &ReindexConfig, workers: usize) -> Self {
        Self {
            workers,
            exclude_databases: config.exclude_databases.clone(),
            exclude_schemas: config.exclude_schemas.clone(),
            on_database_error: config.on_database_error,
            interactive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoIndexes,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDatabase {
    pub database: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub processed: Vec<DatabaseSummary>,
    pub skipped: Vec<SkippedDatabase>,
}

impl RunSummary {
    pub fn total_tasks(&self) -> usize {
        self.processed.iter().map(|db| db.total).sum()
    }

    pub fn failed_tasks(&self) -> usize {
        self.processed.iter().map(|db| db.failed).sum()
    }
}

enum DatabaseOutcome {
    Processed(DatabaseSummary),
    Skipped(SkippedDatabase),
}

pub struct Orchestrator<C> {
    connector: C,
    options: RunOptions,
    cancel: CancellationToken,
}

impl<C: Connector> Orchestrator<C> {
    pub fn new(connector: C, options: RunOptions) -> Self {
        Self {
            connector,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling the token stops workers from claiming further tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let databases = self.discover_databases().await?;
        let mut summary = RunSummary::default();

        for database in databases {
            if self.cancel.is_cancelled() {
                return Err(ReindexError::Cancelled);
            }

            match self.process_database(&database).await {
                Ok(DatabaseOutcome::Processed(db)) => summary.processed.push(db),
                Ok(DatabaseOutcome::Skipped(skipped)) => summary.skipped.push(skipped),
                Err(e @ (ReindexError::Connection { .. } | ReindexError::Discovery { .. }))
                    if self.options.on_database_error == OnDatabaseError::Skip =>
                {
                    let report = format!("{:#}", anyhow::Error::from(e));
                    error!(database = %database, "{}", report);
                    self.milestone(format!("Skipping database {}: {}", database, report));
                    summary.skipped.push(SkippedDatabase {
                        database,
                        reason: SkipReason::Failed(report),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        self.milestone(format!(
            "All tasks completed ({} databases, {} indexes, {} failed)",
            summary.processed.len(),
            summary.total_tasks(),
            summary.failed_tasks()
        ));
        Ok(summary)
    }

    async fn discover_databases(&self) -> Result<Vec<String>> {
        let initial = self.connector.initial_database();
        let session = self.connector.connect(initial).await?;
        self.milestone(format!(
            "Successfully connected to the postgres database at {}",
            self.connector.server()
        ));

        let databases = session.list_databases(&self.options.exclude_databases).await;
        session.close().await;
        let databases = databases?;
        info!(count = databases.len(), "Discovered databases: {:?}", databases);
        Ok(databases)
    }

    async fn process_database(&self, database: &str) -> Result<DatabaseOutcome> {
        self.milestone(format!("Start reindex on database {}", database));
        let session = Arc::new(self.connector.connect(database).await?);
        info!(database = %database, "Connected to business database");

        let outcome = self.reindex(&session).await;
        session.close().await;
        outcome
    }

    async fn reindex(&self, session: &Arc<C::Session>) -> Result<DatabaseOutcome> {
        let database = session.database().to_string();
        let indexes = session.list_indexes(&self.options.exclude_schemas).await?;

        if indexes.is_empty() {
            self.milestone(format!("No indexes found in database: {}, skipping", database));
            return Ok(DatabaseOutcome::Skipped(SkippedDatabase {
                database,
                reason: SkipReason::NoIndexes,
            }));
        }

        let tasks = generate_tasks(indexes);
        let mut state = RunState::new(database.as_str(), tasks.len());
        let progress = if self.options.interactive {
            ProgressReporter::new(&state)
        } else {
            ProgressReporter::hidden(&state)
        };
        info!(
            database = %database,
            tasks = state.total(),
            workers = self.options.workers,
            "Launching worker pool"
        );

        let options = WorkerPoolOptions {
            workers: self.options.workers,
        };
        let mut run =
            worker::launch(Arc::clone(session), tasks, options, self.cancel.clone()).await;
        aggregate(&mut run.outcomes, &mut state, &progress).await;

        let panicked = run.join().await;
        if panicked > 0 {
            warn!(database = %database, panicked, "Workers exited abnormally");
        }
        if self.cancel.is_cancelled() {
            warn!(
                database = %database,
                completed = state.completed(),
                total = state.total(),
                "Reindex interrupted"
            );
            return Err(ReindexError::Cancelled);
        }

        let summary = state.finish()?;
        self.milestone(format!(
            "database {} complete: {} succeeded, {} failed in {:.1?}",
            summary.database, summary.succeeded, summary.failed, summary.elapsed
        ));
        Ok(DatabaseOutcome::Processed(summary))
    }

    fn milestone(&self, line: String) {
        info!("{}", line);
        if self.options.interactive {
            println!("{}", line);
        }
    }
}
