// ABOUTME: Seams between the run pipeline and the database server
// ABOUTME: PostgreSQL implements them in `postgres`; tests substitute in-memory fakes

use async_trait::async_trait;

use crate::error::Result;
use crate::task::{IndexDescriptor, MaintenanceTask};

/// A live, pooled handle to one database, shared by every worker of that database.
#[async_trait]
pub trait DatabaseSession: Send + Sync + 'static {
    /// Name of the database this session is connected to.
    fn database(&self) -> &str;

    /// User databases on the server, minus templates and `exclude`.
    async fn list_databases(&self, exclude: &[String]) -> Result<Vec<String>>;

    /// Indexes of this database outside `exclude_schemas`.
    async fn list_indexes(&self, exclude_schemas: &[String]) -> Result<Vec<IndexDescriptor>>;

    /// Run one rebuild. Failures come back as `ReindexError::TaskExecution`.
    async fn execute(&self, task: &MaintenanceTask) -> Result<()>;

    /// Release every connection held by the session.
    async fn close(&self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    type Session: DatabaseSession;

    /// Open a session to `database` and verify it is reachable.
    async fn connect(&self, database: &str) -> Result<Self::Session>;

    /// Database used for server-wide catalog discovery.
    fn initial_database(&self) -> &str;

    /// `host:port` of the server, for milestones.
    fn server(&self) -> String;
}
