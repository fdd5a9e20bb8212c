// ABOUTME: PostgreSQL implementation of the connector and session seams
// ABOUTME: Each session is a deadpool-postgres pool scoped to one database

pub mod catalog;
pub mod pool;
pub mod tls;

use async_trait::async_trait;
use std::time::Duration;

pub use pool::ConnectionPool;

use crate::config::{CredentialTemplate, PoolLimits};
use crate::error::{ReindexError, Result};
use crate::session::{Connector, DatabaseSession};
use crate::task::{IndexDescriptor, MaintenanceTask};

pub struct PgConnector {
    template: CredentialTemplate,
    limits: PoolLimits,
    statement_timeout: Option<Duration>,
}

impl PgConnector {
    pub fn new(
        template: CredentialTemplate,
        limits: PoolLimits,
        statement_timeout: Option<Duration>,
    ) -> Self {
        Self {
            template,
            limits,
            statement_timeout,
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Session = ConnectionPool;

    async fn connect(&self, database: &str) -> Result<ConnectionPool> {
        ConnectionPool::open(
            &self.template.for_database(database),
            self.limits,
            self.statement_timeout,
        )
        .await
    }

    fn initial_database(&self) -> &str {
        &self.template.dbname
    }

    fn server(&self) -> String {
        format!("{}:{}", self.template.host, self.template.port)
    }
}

#[async_trait]
impl DatabaseSession for ConnectionPool {
    fn database(&self) -> &str {
        ConnectionPool::database(self)
    }

    async fn list_databases(&self, exclude: &[String]) -> Result<Vec<String>> {
        let client = self.get().await?;
        let databases = catalog::list_databases(&client, self.database(), exclude).await?;
        self.release(client);
        Ok(databases)
    }

    async fn list_indexes(&self, exclude_schemas: &[String]) -> Result<Vec<IndexDescriptor>> {
        let client = self.get().await?;
        let indexes = catalog::list_indexes(&client, self.database(), exclude_schemas).await?;
        self.release(client);
        Ok(indexes)
    }

    async fn execute(&self, task: &MaintenanceTask) -> Result<()> {
        let client = self.get().await.map_err(|e| {
            ReindexError::TaskExecution(format!("{:#}", anyhow::Error::from(e)))
        })?;
        client
            .batch_execute(task.statement())
            .await
            .map_err(|e| ReindexError::TaskExecution(describe(&e)))?;
        self.release(client);
        Ok(())
    }

    async fn close(&self) {
        ConnectionPool::close(self);
    }
}

/// Server-side detail when available; the driver's `Display` alone is just "db error".
fn describe(error: &tokio_postgres::Error) -> String {
    match error.as_db_error() {
        Some(db) => format!("{} ({})", db.message(), db.code().code()),
        None => error.to_string(),
    }
}
