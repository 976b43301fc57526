//! LanceDB connection helpers shared by the collection tables.
use anyhow::Result;
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Creates an empty table; returns `true` when this call created it.
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<bool> {
    if table_exists(conn, name).await? {
        return Ok(false);
    }
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    match conn.create_table(name, Box::new(iter)).execute().await {
        Ok(_) => Ok(true),
        // another worker won the race
        Err(_) if table_exists(conn, name).await? => Ok(false),
        Err(e) => Err(e.into()),
    }
}
