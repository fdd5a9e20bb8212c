// ABOUTME: In-memory PostgreSQL stand-in shared by the integration tests
// ABOUTME: Records executed statements and session open/close counts

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use postgres_reindexer::config::{
    OnDatabaseError, DEFAULT_EXCLUDED_DATABASES, DEFAULT_EXCLUDED_SCHEMAS,
};
use postgres_reindexer::session::{Connector, DatabaseSession};
use postgres_reindexer::task::{IndexDescriptor, MaintenanceTask};
use postgres_reindexer::{ReindexError, Result, RunOptions};

#[derive(Default)]
pub struct ServerState {
    pub databases: Vec<String>,
    pub indexes: HashMap<String, Vec<IndexDescriptor>>,
    pub failing: HashSet<String>,
    pub unreachable: HashSet<String>,
    pub executed: Mutex<Vec<(String, String)>>,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
}

impl ServerState {
    pub fn executed_in(&self, database: &str) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|(db, _)| db == database)
            .map(|(_, statement)| statement.clone())
            .collect()
    }
}

pub struct FakeConnector {
    pub server: Arc<ServerState>,
}

pub struct FakeSession {
    database: String,
    server: Arc<ServerState>,
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, database: &str) -> Result<FakeSession> {
        if self.server.unreachable.contains(database) {
            return Err(ReindexError::Connection {
                host: "h".into(),
                port: 5432,
                database: database.into(),
                source: "connection refused".into(),
            });
        }
        self.server.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            database: database.to_string(),
            server: Arc::clone(&self.server),
        })
    }

    fn initial_database(&self) -> &str {
        "postgres"
    }

    fn server(&self) -> String {
        "h:5432".into()
    }
}

#[async_trait]
impl DatabaseSession for FakeSession {
    fn database(&self) -> &str {
        &self.database
    }

    async fn list_databases(&self, exclude: &[String]) -> Result<Vec<String>> {
        Ok(self
            .server
            .databases
            .iter()
            .filter(|db| !exclude.contains(db))
            .cloned()
            .collect())
    }

    async fn list_indexes(&self, exclude_schemas: &[String]) -> Result<Vec<IndexDescriptor>> {
        Ok(self
            .server
            .indexes
            .get(&self.database)
            .into_iter()
            .flatten()
            .filter(|index| !exclude_schemas.contains(&index.schema))
            .cloned()
            .collect())
    }

    async fn execute(&self, task: &MaintenanceTask) -> Result<()> {
        tokio::task::yield_now().await;
        self.server
            .executed
            .lock()
            .unwrap()
            .push((self.database.clone(), task.statement().to_string()));
        if self.server.failing.contains(&task.index().name) {
            return Err(ReindexError::TaskExecution(
                "canceling statement due to lock timeout".into(),
            ));
        }
        Ok(())
    }

    async fn close(&self) {
        self.server.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn options() -> RunOptions {
    RunOptions {
        workers: 10,
        exclude_databases: DEFAULT_EXCLUDED_DATABASES.iter().map(|s| s.to_string()).collect(),
        exclude_schemas: DEFAULT_EXCLUDED_SCHEMAS.iter().map(|s| s.to_string()).collect(),
        on_database_error: OnDatabaseError::Abort,
        interactive: false,
    }
}

pub fn two_app_server() -> ServerState {
    ServerState {
        databases: vec!["postgres".into(), "app1".into(), "app2".into()],
        indexes: HashMap::from([(
            "app1".to_string(),
            vec![
                IndexDescriptor::new("public", "idx_a"),
                IndexDescriptor::new("public", "idx_b"),
                IndexDescriptor::new("pg_catalog", "pg_class_oid_index"),
            ],
        )]),
        ..Default::default()
    }
}

