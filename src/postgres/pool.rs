// ABOUTME: deadpool-postgres pool for one database, opened with a liveness check
// ABOUTME: max_size caps open connections; clients beyond max_idle are dropped on release

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod};
use std::time::Duration;

use super::tls;
use crate::config::{CredentialTemplate, PoolLimits};
use crate::error::{BoxError, ReindexError, Result};

pub struct ConnectionPool {
    pool: Pool,
    host: String,
    port: u16,
    database: String,
    max_idle: usize,
}

/// Driver config for one database. The timeout is enforced by the server so a
/// timed-out statement is cancelled there and its connection stays reusable.
pub fn connection_config(
    template: &CredentialTemplate,
    statement_timeout: Option<Duration>,
) -> tokio_postgres::Config {
    let mut config = tls::pg_config(template);
    if let Some(timeout) = statement_timeout {
        config.options(&format!("-c statement_timeout={}", timeout.as_millis()));
    }
    config
}

impl ConnectionPool {
    /// Build the pool without connecting.
    pub fn build(
        template: &CredentialTemplate,
        limits: PoolLimits,
        statement_timeout: Option<Duration>,
    ) -> Result<Self> {
        let target_error = |source: BoxError| ReindexError::Connection {
            host: template.host.clone(),
            port: template.port,
            database: template.dbname.clone(),
            source,
        };

        let tls = tls::make_connector(template.sslmode).map_err(|e| target_error(e.into()))?;
        let manager = Manager::from_config(
            connection_config(template, statement_timeout),
            tls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(limits.max_open)
            .build()
            .map_err(|e| target_error(e.into()))?;

        Ok(Self {
            pool,
            host: template.host.clone(),
            port: template.port,
            database: template.dbname.clone(),
            max_idle: limits.max_idle,
        })
    }

    /// Build the pool and ping the database through it. A failed ping closes
    /// the pool before the error is returned.
    pub async fn open(
        template: &CredentialTemplate,
        limits: PoolLimits,
        statement_timeout: Option<Duration>,
    ) -> Result<Self> {
        let pool = Self::build(template, limits, statement_timeout)?;
        if let Err(e) = pool.ping().await {
            pool.close();
            return Err(e);
        }

        tracing::debug!(
            database = %pool.database,
            max_open = limits.max_open,
            max_idle = limits.max_idle,
            "Connection pool ready"
        );
        Ok(pool)
    }

    pub async fn ping(&self) -> Result<()> {
        let client = self.get().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| self.connection_error(e.into()))?;
        self.release(client);
        Ok(())
    }

    /// Check out a client, waiting while `max_open` clients are in use.
    pub async fn get(&self) -> Result<Object> {
        self.pool.get().await.map_err(|e| {
            let source: BoxError = match e {
                PoolError::Backend(e) => e.into(),
                other => other.into(),
            };
            self.connection_error(source)
        })
    }

    /// Return a client, closing it instead when `max_idle` clients already wait.
    pub fn release(&self, client: Object) {
        if self.pool.status().available >= self.max_idle {
            drop(Object::take(client));
        }
    }

    pub fn close(&self) {
        self.pool.close();
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn max_open(&self) -> usize {
        self.pool.status().max_size
    }

    fn connection_error(&self, source: BoxError) -> ReindexError {
        ReindexError::Connection {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            source,
        }
    }
}
