use anyhow::{Context, Result};

use agriqa::config::QaConfig;
use agriqa::corpus::AnswerCorpus;
use agriqa::retrieval::{RetrieveOptions, Retriever};
use agriqa::store::VectorStoreClient;

/// Command-line values that take precedence over `[retrieval]` settings.
#[derive(Debug, Default)]
pub struct SearchOverrides {
    pub n_results: Option<usize>,
    pub topics: Vec<String>,
    pub threshold: Option<f64>,
}

/// Answer one question from the terminal.
pub fn search(config: &QaConfig, question: &str, overrides: SearchOverrides) -> Result<()> {
    let options = RetrieveOptions {
        n_results: overrides.n_results.unwrap_or(config.retrieval.n_results),
        topics: if overrides.topics.is_empty() {
            config.retrieval.topics.clone()
        } else {
            overrides.topics
        },
        distance_threshold: overrides.threshold.or(config.retrieval.distance_threshold),
    };

    let db_path = config.resolved_db_path();
    let client = VectorStoreClient::open(&db_path)
        .with_context(|| format!("failed to open vector store at {}", db_path.display()))?;
    let collection = client.get_collection(&config.storage.collection)?;
    let answers = AnswerCorpus::load(&config.resolved_answers_path(), config.delimiter())?;
    let embedder = agriqa::embedding::create_embedder(&config.embedding)?;

    let result = Retriever::new(embedder.as_ref(), &collection).retrieve(question, &answers, &options)?;

    if result.is_empty() {
        println!("No matching questions found.");
        return Ok(());
    }

    println!("Found {} match(es)\n", result.len());
    for i in 0..result.len() {
        println!(
            "  {}. [{}] {} (distance: {:.4})",
            i + 1,
            result.ids[i],
            result.similar_questions[i],
            result.distances[i],
        );
        for answer in &result.answers[i] {
            println!("     - {answer}");
        }
        println!();
    }

    Ok(())
}
