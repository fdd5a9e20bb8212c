// ABOUTME: Catalog queries for database and index discovery
// ABOUTME: Runs against pg_database and pg_indexes through a pooled client

use tokio_postgres::Client;

use crate::error::{ReindexError, Result};
use crate::task::IndexDescriptor;

const DATABASES_QUERY: &str = "\
    SELECT datname FROM pg_database \
    WHERE datistemplate = false AND datallowconn AND NOT (datname = ANY($1)) \
    ORDER BY datname";

// Temporary schemas belong to other sessions and cannot be rebuilt from here.
const INDEXES_QUERY: &str = "\
    SELECT schemaname, indexname FROM pg_indexes \
    WHERE NOT (schemaname = ANY($1)) AND schemaname !~ '^pg_(toast_)?temp_' \
    ORDER BY schemaname, indexname";

pub async fn list_databases(
    client: &Client,
    database: &str,
    exclude: &[String],
) -> Result<Vec<String>> {
    let rows = client
        .query(DATABASES_QUERY, &[&exclude])
        .await
        .map_err(|e| discovery_error(database, e))?;

    rows.iter()
        .map(|row| row.try_get::<_, String>(0))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| discovery_error(database, e))
}

pub async fn list_indexes(
    client: &Client,
    database: &str,
    exclude_schemas: &[String],
) -> Result<Vec<IndexDescriptor>> {
    let rows = client
        .query(INDEXES_QUERY, &[&exclude_schemas])
        .await
        .map_err(|e| discovery_error(database, e))?;

    let mut indexes = Vec::with_capacity(rows.len());
    for row in rows {
        let schema: String = row.try_get(0).map_err(|e| discovery_error(database, e))?;
        let name: String = row.try_get(1).map_err(|e| discovery_error(database, e))?;
        indexes.push(IndexDescriptor::new(schema, name));
    }
    Ok(indexes)
}

fn discovery_error(database: &str, source: tokio_postgres::Error) -> ReindexError {
    ReindexError::Discovery {
        database: database.to_string(),
        source: source.into(),
    }
}
