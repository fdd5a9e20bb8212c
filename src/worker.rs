// ABOUTME: Fixed-size worker pool draining a closed task queue for one database
// ABOUTME: Every claimed task yields exactly one outcome record, success or failure

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::ReindexError;
use crate::session::DatabaseSession;
use crate::task::{IndexDescriptor, MaintenanceTask};

pub const DEFAULT_WORKERS: usize = 10;

/// Immutable result of one rebuild.
#[derive(Debug, Clone)]
pub struct OutcomeRecord {
    pub worker: usize,
    pub database: String,
    pub index: IndexDescriptor,
    pub statement: String,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl OutcomeRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Statement deadlines belong to the session (server-side `statement_timeout`).
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolOptions {
    pub workers: usize,
}

impl Default for WorkerPoolOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

/// A launched pool. `outcomes` closes only after every worker has exited.
pub struct PoolRun {
    pub outcomes: mpsc::Receiver<OutcomeRecord>,
    supervisor: JoinHandle<usize>,
}

impl PoolRun {
    /// Wait for the supervisor and return how many workers panicked.
    pub async fn join(self) -> usize {
        match self.supervisor.await {
            Ok(panicked) => panicked,
            Err(e) => {
                error!("Worker supervisor failed: {}", e);
                1
            }
        }
    }
}

type TaskSource = Arc<Mutex<mpsc::Receiver<MaintenanceTask>>>;

/// Queue every task, close the queue, and start `options.workers` workers on it.
pub async fn launch<S: DatabaseSession>(
    session: Arc<S>,
    tasks: Vec<MaintenanceTask>,
    options: WorkerPoolOptions,
    cancel: CancellationToken,
) -> PoolRun {
    let total = tasks.len();
    let (task_tx, task_rx) = mpsc::channel(total.max(1));
    for task in tasks {
        if task_tx.send(task).await.is_err() {
            break;
        }
    }
    drop(task_tx);

    let source: TaskSource = Arc::new(Mutex::new(task_rx));
    let (outcome_tx, outcome_rx) = mpsc::channel(total.max(1));

    let workers = options.workers.max(1);
    let handles: Vec<JoinHandle<()>> = (1..=workers)
        .map(|id| {
            tokio::spawn(run_worker(
                id,
                Arc::clone(&session),
                Arc::clone(&source),
                outcome_tx.clone(),
                cancel.clone(),
            ))
        })
        .collect();

    let supervisor = tokio::spawn(async move {
        let panicked = join_all(handles)
            .await
            .into_iter()
            .filter_map(|result| result.err())
            .inspect(|e| error!("Worker panicked: {}", e))
            .count();
        drop(outcome_tx);
        panicked
    });

    PoolRun {
        outcomes: outcome_rx,
        supervisor,
    }
}

async fn run_worker<S: DatabaseSession>(
    id: usize,
    session: Arc<S>,
    source: TaskSource,
    outcomes: mpsc::Sender<OutcomeRecord>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(worker = id, "Worker stopping on cancellation");
                break;
            }
            task = async { source.lock().await.recv().await } => task,
        };
        let Some(task) = next else {
            break;
        };

        let started = Instant::now();
        let result = session.execute(&task).await;

        let record = OutcomeRecord {
            worker: id,
            database: session.database().to_string(),
            statement: task.statement().to_string(),
            index: task.index().clone(),
            error: result.err().map(|e| match e {
                ReindexError::TaskExecution(detail) => detail,
                other => other.to_string(),
            }),
            elapsed: started.elapsed(),
        };

        if outcomes.send(record).await.is_err() {
            break;
        }
    }
}
