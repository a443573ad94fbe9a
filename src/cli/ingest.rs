//! CLI `ingest` command: embed the question corpus into a collection.

use anyhow::{Context, Result};

use agriqa::config::QaConfig;
use agriqa::corpus::QuestionCorpus;
use agriqa::ingest::{self, IngestOptions};
use agriqa::store::VectorStoreClient;

pub fn ingest(config: &QaConfig, collection: Option<&str>, show_progress: bool) -> Result<()> {
    let collection = collection.unwrap_or(&config.storage.collection);
    let db_path = config.resolved_db_path();
    let client = VectorStoreClient::open(&db_path)
        .with_context(|| format!("failed to open vector store at {}", db_path.display()))?;
    client.warn_on_model_mismatch(collection, &config.embedding.model);

    let corpus = QuestionCorpus::load(&config.resolved_questions_path(), config.delimiter())?;
    let embedder = agriqa::embedding::create_embedder(&config.embedding)?;

    println!(
        "Ingesting {} question(s) into '{collection}'...",
        corpus.len()
    );
    let report = ingest::ingest(
        embedder.as_ref(),
        &client,
        &corpus,
        collection,
        &IngestOptions::from_config(config, show_progress),
    )?;

    println!("  Inserted: {}", report.inserted);
    if report.skipped > 0 {
        println!("  Skipped (already present): {}", report.skipped);
    }
    println!("Ingestion complete.");
    Ok(())
}
