//! Persistent similarity index over SQLite.
//!
//! A [`VectorStoreClient`] owns the connection and manages named collections.
//! A [`Collection`] is a cheap handle onto one partition; it implements
//! [`VectorStore`], the capability the retriever and ingestion routine use.
//!
//! Nearest-neighbour queries are exact scans ranked by sqlite-vec's
//! `vec_distance_l2` / `vec_distance_cosine`, so category filters are applied
//! before ranking and `n_results` is always honoured.

pub mod client;
pub mod collection;
pub mod filter;

pub use client::{CollectionOptions, VectorStoreClient};
pub use collection::{Collection, CollectionInfo};
pub use filter::CategoryFilter;

use serde::{Deserialize, Serialize};

use crate::embedding::Embedding;
use crate::error::Result;

/// Free-form entry metadata. The `category` key drives topic filtering.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Distance metric a collection is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Euclidean distance.
    #[default]
    L2,
    /// Cosine distance (`1 - cosine similarity`).
    Cosine,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
        }
    }

    /// The sqlite-vec scalar function computing this distance.
    pub(crate) fn sql_function(&self) -> &'static str {
        match self {
            Self::L2 => "vec_distance_l2",
            Self::Cosine => "vec_distance_cosine",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "l2" => Ok(Self::L2),
            "cosine" => Ok(Self::Cosine),
            _ => Err(format!("unknown distance metric: {s}")),
        }
    }
}

/// Nearest neighbours of one query vector, nearest first.
///
/// `ids.len() == distances.len()`, at most the requested `n_results`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub ids: Vec<String>,
    pub distances: Vec<f64>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `(id, distance)` pairs in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.distances.iter().copied())
    }
}

/// Query and bulk-insert capability of a single collection.
pub trait VectorStore: Send + Sync {
    /// Bulk-insert embeddings. Returns the number of rows actually written;
    /// ids already present are skipped.
    fn add_embeddings(
        &self,
        ids: &[String],
        embeddings: &[Embedding],
        metadatas: Option<&[Metadata]>,
    ) -> Result<usize>;

    /// Up to `n_results` nearest entries to `embedding`, restricted by
    /// [`CategoryFilter`] semantics when `topics` is non-empty.
    fn query(&self, embedding: &[f32], n_results: usize, topics: &[String]) -> Result<QueryResult>;
}

/// View an f32 slice as raw little-endian bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}
