// ABOUTME: Index descriptors and the REINDEX statements generated from them
// ABOUTME: One statement per index so a failed rebuild never affects another

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexDescriptor {
    pub schema: String,
    pub name: String,
}

impl IndexDescriptor {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Schema-qualified name with both parts quoted.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A ready-to-run rebuild of exactly one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceTask {
    index: IndexDescriptor,
    statement: String,
}

impl MaintenanceTask {
    pub fn index(&self) -> &IndexDescriptor {
        &self.index
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }
}

impl From<IndexDescriptor> for MaintenanceTask {
    fn from(index: IndexDescriptor) -> Self {
        let statement = format!("REINDEX INDEX {}", index.qualified_name());
        Self { index, statement }
    }
}

pub fn generate_tasks(indexes: Vec<IndexDescriptor>) -> Vec<MaintenanceTask> {
    indexes.into_iter().map(MaintenanceTask::from).collect()
}

/// Quote an SQL identifier, doubling any embedded double quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
