use std::sync::{Arc, Mutex};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::client::lock_conn;
use super::filter::CategoryFilter;
use super::{embedding_to_bytes, DistanceMetric, Metadata, QueryResult, VectorStore};
use crate::embedding::{Embedder, Embedding};
use crate::error::{QaError, Result};

/// Handle on one named collection. Cloning shares the store connection.
#[derive(Clone)]
pub struct Collection {
    conn: Arc<Mutex<Connection>>,
    id: i64,
    name: String,
    metric: DistanceMetric,
}

/// Bookkeeping row for a collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub metric: String,
    /// Fixed by the first insert; `None` while the collection is empty.
    pub dimensions: Option<usize>,
    pub model: Option<String>,
    pub created_at: String,
    pub count: usize,
}

impl CollectionInfo {
    /// Map a row of `(name, metric, dimensions, model, created_at, count)`.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            metric: row.get(1)?,
            dimensions: row.get::<_, Option<i64>>(2)?.map(|d| d as usize),
            model: row.get(3)?,
            created_at: row.get(4)?,
            count: row.get::<_, i64>(5)? as usize,
        })
    }
}

impl Collection {
    pub(crate) fn new(
        conn: Arc<Mutex<Connection>>,
        id: i64,
        name: &str,
        metric: DistanceMetric,
    ) -> Self {
        Self {
            conn,
            id,
            name: name.to_string(),
            metric,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn count(&self) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM index_entries WHERE collection_id = ?1",
            params![self.id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn info(&self) -> Result<CollectionInfo> {
        let conn = lock_conn(&self.conn)?;
        conn.query_row(
            "SELECT c.name, c.metric, c.dimensions, c.model, c.created_at, \
                    (SELECT COUNT(*) FROM index_entries e WHERE e.collection_id = c.id) \
             FROM collections c WHERE c.id = ?1",
            params![self.id],
            CollectionInfo::from_row,
        )
        .optional()?
        .ok_or_else(|| QaError::CollectionNotFound(self.name.clone()))
    }

    /// Embed raw documents with `embedder` and insert them with their text.
    pub fn add_documents(
        &self,
        embedder: &dyn Embedder,
        ids: &[String],
        documents: &[String],
        metadatas: Option<&[Metadata]>,
    ) -> Result<usize> {
        if ids.len() != documents.len() {
            return Err(QaError::InvalidInput(format!(
                "{} ids but {} documents",
                ids.len(),
                documents.len()
            )));
        }
        let texts: Vec<&str> = documents.iter().map(String::as_str).collect();
        let embeddings = embedder.encode_batch(&texts)?;
        self.insert(ids, &embeddings, Some(documents), metadatas)
    }

    /// Shared write path. Runs in one transaction: either every new row is
    /// written or none is.
    fn insert(
        &self,
        ids: &[String],
        embeddings: &[Embedding],
        documents: Option<&[String]>,
        metadatas: Option<&[Metadata]>,
    ) -> Result<usize> {
        if ids.len() != embeddings.len() {
            return Err(QaError::InvalidInput(format!(
                "{} ids but {} embeddings",
                ids.len(),
                embeddings.len()
            )));
        }
        if let Some(metadatas) = metadatas {
            if metadatas.len() != ids.len() {
                return Err(QaError::InvalidInput(format!(
                    "{} ids but {} metadatas",
                    ids.len(),
                    metadatas.len()
                )));
            }
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;

        let stored_dims = read_dimensions(&tx, self.id, &self.name)?;
        let expected = stored_dims.unwrap_or(embeddings[0].len());
        if expected == 0 {
            return Err(QaError::InvalidInput("embeddings must not be empty".into()));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(QaError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
        if stored_dims.is_none() {
            tx.execute(
                "UPDATE collections SET dimensions = ?1 WHERE id = ?2",
                params![expected as i64, self.id],
            )?;
        }

        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO index_entries (collection_id, id, embedding, document, metadata) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (i, (id, embedding)) in ids.iter().zip(embeddings).enumerate() {
                let document = documents.map(|d| d[i].as_str());
                let metadata = metadatas
                    .map(|m| &m[i])
                    .filter(|m| !m.is_empty())
                    .map(serde_json::to_string)
                    .transpose()?;
                inserted += stmt.execute(params![
                    self.id,
                    id,
                    embedding_to_bytes(embedding),
                    document,
                    metadata
                ])?;
            }
        }
        tx.commit()?;

        let skipped = ids.len() - inserted;
        if skipped > 0 {
            tracing::warn!(
                collection = %self.name,
                skipped,
                "ids already present in collection were skipped"
            );
        }
        tracing::debug!(collection = %self.name, inserted, "embeddings added");
        Ok(inserted)
    }
}

impl VectorStore for Collection {
    /// Duplicate ids (already stored, or repeated within the batch) are
    /// skipped: the first write wins.
    fn add_embeddings(
        &self,
        ids: &[String],
        embeddings: &[Embedding],
        metadatas: Option<&[Metadata]>,
    ) -> Result<usize> {
        self.insert(ids, embeddings, None, metadatas)
    }

    fn query(&self, embedding: &[f32], n_results: usize, topics: &[String]) -> Result<QueryResult> {
        if n_results == 0 {
            return Err(QaError::InvalidInput("n_results must be greater than 0".into()));
        }

        let conn = lock_conn(&self.conn)?;
        let Some(dims) = read_dimensions(&conn, self.id, &self.name)? else {
            return Ok(QueryResult::default());
        };
        if embedding.len() != dims {
            return Err(QaError::DimensionMismatch {
                expected: dims,
                actual: embedding.len(),
            });
        }

        let filter = CategoryFilter::from_topics(topics);
        let filter_sql = filter
            .as_ref()
            .map(|f| format!(" AND {}", f.sql_predicate()))
            .unwrap_or_default();
        let sql = format!(
            "SELECT e.id, {func}(e.embedding, ?) AS distance \
             FROM index_entries e \
             WHERE e.collection_id = ?{filter_sql} \
             ORDER BY distance ASC, e.rowid ASC \
             LIMIT ?",
            func = self.metric.sql_function(),
        );

        let mut values = vec![
            Value::Blob(embedding_to_bytes(embedding).to_vec()),
            Value::Integer(self.id),
        ];
        if let Some(f) = &filter {
            values.extend(f.sql_params());
        }
        values.push(Value::Integer(n_results as i64));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let (ids, distances): (Vec<String>, Vec<f64>) = rows.into_iter().unzip();
        tracing::debug!(
            collection = %self.name,
            n_results,
            topics = topics.len(),
            returned = ids.len(),
            "similarity query"
        );
        Ok(QueryResult { ids, distances })
    }
}

fn read_dimensions(conn: &Connection, id: i64, name: &str) -> Result<Option<usize>> {
    let dims: Option<Option<i64>> = conn
        .query_row(
            "SELECT dimensions FROM collections WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    match dims {
        Some(d) => Ok(d.map(|d| d as usize)),
        None => Err(QaError::CollectionNotFound(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionOptions, VectorStoreClient};

    fn collection() -> Collection {
        VectorStoreClient::open_in_memory()
            .unwrap()
            .get_or_create_collection("test", &CollectionOptions::default())
            .unwrap()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_insert_fixes_dimensions() {
        let c = collection();
        c.add_embeddings(&ids(&["a"]), &[vec![1.0, 0.0, 0.0]], None)
            .unwrap();
        assert_eq!(c.info().unwrap().dimensions, Some(3));

        let err = c
            .add_embeddings(&ids(&["b"]), &[vec![1.0, 0.0]], None)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            QaError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn mixed_dimension_batch_writes_nothing() {
        let c = collection();
        let result = c.add_embeddings(
            &ids(&["a", "b"]),
            &[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]],
            None,
        );
        assert!(result.is_err());
        assert_eq!(c.count().unwrap(), 0);
        assert_eq!(c.info().unwrap().dimensions, None);
    }

    #[test]
    fn length_mismatch_rejected() {
        let c = collection();
        let result = c.add_embeddings(&ids(&["a", "b"]), &[vec![1.0]], None);
        assert!(matches!(result, Err(QaError::InvalidInput(_))));
    }

    #[test]
    fn duplicate_ids_are_skipped() {
        let c = collection();
        let inserted = c
            .add_embeddings(
                &ids(&["a", "a"]),
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
                None,
            )
            .unwrap();
        assert_eq!(inserted, 1);

        // first write wins
        let result = c.query(&[1.0, 0.0], 1, &[]).unwrap();
        assert_eq!(result.ids, vec!["a"]);
        assert!(result.distances[0] < 1e-6);
    }

    #[test]
    fn query_on_empty_collection_is_empty() {
        let c = collection();
        let result = c.query(&[1.0, 0.0], 3, &[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn query_rejects_zero_results() {
        let c = collection();
        assert!(matches!(
            c.query(&[1.0], 0, &[]),
            Err(QaError::InvalidInput(_))
        ));
    }

    #[test]
    fn query_rejects_wrong_dimension() {
        let c = collection();
        c.add_embeddings(&ids(&["a"]), &[vec![1.0, 0.0]], None)
            .unwrap();
        assert!(matches!(
            c.query(&[1.0, 0.0, 0.0], 1, &[]),
            Err(QaError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn cosine_metric_ranks_by_angle() {
        let c = VectorStoreClient::open_in_memory()
            .unwrap()
            .get_or_create_collection(
                "cos",
                &CollectionOptions {
                    metric: DistanceMetric::Cosine,
                    model: None,
                },
            )
            .unwrap();
        // "far" has the larger magnitude but the wrong direction
        c.add_embeddings(
            &ids(&["near", "far"]),
            &[vec![0.1, 0.0], vec![10.0, 10.0]],
            None,
        )
        .unwrap();
        let result = c.query(&[5.0, 0.0], 2, &[]).unwrap();
        assert_eq!(result.ids, vec!["near", "far"]);
        assert!(result.distances[0] < 1e-6);
    }

    #[test]
    fn add_documents_stores_text() {
        struct Axis;
        impl Embedder for Axis {
            fn encode(&self, text: &str) -> Result<Embedding> {
                Ok(vec![text.len() as f32, 1.0])
            }
        }

        let c = collection();
        let inserted = c
            .add_documents(
                &Axis,
                &ids(&["d1", "d2"]),
                &ids(&["short", "a longer document"]),
                None,
            )
            .unwrap();
        assert_eq!(inserted, 2);

        let conn = lock_conn(&c.conn).unwrap();
        let doc: String = conn
            .query_row(
                "SELECT document FROM index_entries WHERE id = 'd2'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(doc, "a longer document");
    }
}
