// ABOUTME: Error taxonomy for the reindex run
// ABOUTME: Only task-level failures are absorbed; every other variant is fatal

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ReindexError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {host}:{port}/{database}")]
    Connection {
        host: String,
        port: u16,
        database: String,
        #[source]
        source: BoxError,
    },

    #[error("Discovery error on database {database}")]
    Discovery {
        database: String,
        #[source]
        source: BoxError,
    },

    #[error("Task execution error: {0}")]
    TaskExecution(String),

    #[error(
        "Outcome accounting mismatch on database {database}: \
         expected {expected} records, received {actual}"
    )]
    Accounting {
        database: String,
        expected: usize,
        actual: usize,
    },

    #[error("Run cancelled")]
    Cancelled,
}

impl ReindexError {
    /// Task failures are recorded in an outcome and never stop the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ReindexError::TaskExecution(_))
    }
}

pub type Result<T> = std::result::Result<T, ReindexError>;
