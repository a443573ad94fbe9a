//! Bulk ingestion of a question corpus into a collection.
//!
//! Every question is embedded first, then all rows are written in a single
//! transaction. A failure anywhere leaves the collection's entries untouched.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::config::QaConfig;
use crate::corpus::QuestionCorpus;
use crate::embedding::{Embedder, Embedding};
use crate::error::{QaError, Result};
use crate::store::{CollectionOptions, Metadata, VectorStore, VectorStoreClient};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub collection: CollectionOptions,
    pub batch_size: usize,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl IngestOptions {
    /// Collection metric and model, and batch size, from configuration.
    pub fn from_config(config: &QaConfig, show_progress: bool) -> Self {
        Self {
            collection: CollectionOptions {
                metric: config.storage.metric,
                model: Some(config.embedding.model.clone()),
            },
            batch_size: config.embedding.batch_size,
            show_progress,
        }
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            collection: CollectionOptions::default(),
            batch_size: 32,
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub collection: String,
    pub total: usize,
    pub inserted: usize,
    /// Ids that were already present (or repeated in the corpus).
    pub skipped: usize,
}

/// Embed every question in `corpus` and add it to `collection_name`.
///
/// Errors are reported as [`QaError::Ingestion`].
pub fn ingest(
    embedder: &dyn Embedder,
    client: &VectorStoreClient,
    corpus: &QuestionCorpus,
    collection_name: &str,
    options: &IngestOptions,
) -> Result<IngestReport> {
    run(embedder, client, corpus, collection_name, options).map_err(QaError::ingestion)
}

fn run(
    embedder: &dyn Embedder,
    client: &VectorStoreClient,
    corpus: &QuestionCorpus,
    collection_name: &str,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let collection = client.get_or_create_collection(collection_name, &options.collection)?;
    let total = corpus.len();
    tracing::info!(collection = collection_name, questions = total, "ingestion started");

    let embeddings = embed_all(embedder, corpus, options)?;
    let ids: Vec<String> = corpus.questions().iter().map(|q| q.id.clone()).collect();
    let metadatas = corpus.has_categories().then(|| category_metadata(corpus));

    let inserted = collection.add_embeddings(&ids, &embeddings, metadatas.as_deref())?;

    let report = IngestReport {
        collection: collection_name.to_string(),
        total,
        inserted,
        skipped: total - inserted,
    };
    tracing::info!(
        collection = collection_name,
        inserted = report.inserted,
        skipped = report.skipped,
        "ingestion complete"
    );
    Ok(report)
}

fn embed_all(
    embedder: &dyn Embedder,
    corpus: &QuestionCorpus,
    options: &IngestOptions,
) -> Result<Vec<Embedding>> {
    let total = corpus.len();
    let pb = if options.show_progress {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut embeddings = Vec::with_capacity(total);
    for chunk in corpus.questions().chunks(options.batch_size.max(1)) {
        let texts: Vec<&str> = chunk.iter().map(|q| q.text.as_str()).collect();
        let batch = embedder.encode_batch(&texts).inspect_err(|e| {
            tracing::error!(first_id = %chunk[0].id, error = %e, "embedding batch failed");
        })?;
        embeddings.extend(batch);
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(embeddings)
}

fn category_metadata(corpus: &QuestionCorpus) -> Vec<Metadata> {
    corpus
        .questions()
        .iter()
        .map(|q| {
            let mut m = Metadata::new();
            if let Some(category) = &q.category {
                m.insert("category".into(), category.clone().into());
            }
            m
        })
        .collect()
}

/// Incremental knowledge-base updates (upserting changed questions and answers)
/// have no defined semantics; this always fails with [`QaError::Unsupported`].
pub fn apply_update(_update: &QuestionCorpus) -> Result<()> {
    Err(QaError::Unsupported("incremental knowledge-base update"))
}
