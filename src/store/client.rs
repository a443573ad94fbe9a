use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::collection::{Collection, CollectionInfo};
use super::DistanceMetric;
use crate::error::{QaError, Result};

/// Options applied when a collection is created. Ignored for existing ones.
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    pub metric: DistanceMetric,
    /// Embedding model identifier recorded for mismatch detection.
    pub model: Option<String>,
}

/// Handle on the persistent vector store. Cloning shares the connection.
#[derive(Clone)]
pub struct VectorStoreClient {
    conn: Arc<Mutex<Connection>>,
}

impl VectorStoreClient {
    /// Open (or create) the store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = crate::db::open_database(path)?;
        Ok(Self::from_connection(conn))
    }

    /// A throwaway store backed by an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = crate::db::open_memory_database()?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection whose schema is already initialized.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        lock_conn(&self.conn)
    }

    /// Get the named collection, creating it if absent. Idempotent.
    pub fn get_or_create_collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> Result<Collection> {
        validate_name(name)?;
        let conn = self.lock()?;

        if let Some((id, metric)) = find_collection(&conn, name)? {
            if metric != options.metric {
                tracing::warn!(
                    collection = name,
                    stored = %metric,
                    requested = %options.metric,
                    "collection exists with a different metric; keeping the stored one"
                );
            }
            return Ok(Collection::new(Arc::clone(&self.conn), id, name, metric));
        }

        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO collections (name, metric, model, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, options.metric.as_str(), options.model, now],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(collection = name, metric = %options.metric, "collection created");

        Ok(Collection::new(
            Arc::clone(&self.conn),
            id,
            name,
            options.metric,
        ))
    }

    /// Get an existing collection.
    pub fn get_collection(&self, name: &str) -> Result<Collection> {
        let conn = self.lock()?;
        match find_collection(&conn, name)? {
            Some((id, metric)) => Ok(Collection::new(Arc::clone(&self.conn), id, name, metric)),
            None => Err(QaError::CollectionNotFound(name.to_string())),
        }
    }

    /// Delete a collection and every entry in it.
    pub fn delete_collection(&self, name: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = find_collection(&tx, name)?
            .map(|(id, _)| id)
            .ok_or_else(|| QaError::CollectionNotFound(name.to_string()))?;

        let removed = tx.execute(
            "DELETE FROM index_entries WHERE collection_id = ?1",
            params![id],
        )?;
        tx.execute("DELETE FROM collections WHERE id = ?1", params![id])?;
        tx.commit()?;

        tracing::info!(collection = name, entries = removed, "collection deleted");
        Ok(())
    }

    /// Warn when `collection` exists and was built with a model other than
    /// `model`. Queries against it would compare vectors from different spaces.
    pub fn warn_on_model_mismatch(&self, collection: &str, model: &str) {
        let Ok(c) = self.get_collection(collection) else {
            return;
        };
        let Ok(info) = c.info() else {
            return;
        };
        if let Some(stored) = info.model.filter(|m| m != model) {
            tracing::warn!(
                collection,
                stored = %stored,
                configured = model,
                "embedding model changed; drop the collection and re-run ingestion"
            );
        }
    }

    /// Bookkeeping for every collection, ordered by name.
    pub fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT c.name, c.metric, c.dimensions, c.model, c.created_at, \
                    (SELECT COUNT(*) FROM index_entries e WHERE e.collection_id = c.id) \
             FROM collections c ORDER BY c.name",
        )?;
        let infos = stmt
            .query_map([], CollectionInfo::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(infos)
    }
}

pub(crate) fn lock_conn(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| QaError::LockPoisoned)
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(QaError::InvalidInput("collection name must not be empty".into()));
    }
    Ok(())
}

fn find_collection(conn: &Connection, name: &str) -> Result<Option<(i64, DistanceMetric)>> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, metric FROM collections WHERE name = ?1",
            params![name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    row.map(|(id, metric)| -> Result<(i64, DistanceMetric)> {
        let metric = metric
            .parse::<DistanceMetric>()
            .map_err(QaError::InvalidInput)?;
        Ok((id, metric))
    })
    .transpose()
}
