//! Question retrieval: encode → nearest neighbours → threshold → answer join.
//!
//! [`Retriever::retrieve`] is the single entry point. Index hits that exceed the
//! distance threshold, or that have no row in the answer corpus, are dropped;
//! everything else is returned as four parallel sequences in rank order.

use serde::Serialize;

use crate::corpus::AnswerCorpus;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::store::VectorStore;

/// Knobs for a single retrieval call.
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    /// Neighbours requested from the index, and the cap on answers per match.
    pub n_results: usize,
    /// Category restriction; empty means unrestricted.
    pub topics: Vec<String>,
    /// Maximum accepted distance; `None` accepts every hit.
    pub distance_threshold: Option<f64>,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            n_results: 3,
            topics: Vec::new(),
            distance_threshold: None,
        }
    }
}

/// Matches that survived filtering. All four vectors have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub ids: Vec<String>,
    pub similar_questions: Vec<String>,
    pub answers: Vec<Vec<String>>,
    pub distances: Vec<f64>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Borrows a long-lived encoder and collection for the duration of a request.
pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorStore,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn Embedder, store: &'a dyn VectorStore) -> Self {
        Self { embedder, store }
    }

    pub fn retrieve(
        &self,
        question: &str,
        answers: &AnswerCorpus,
        options: &RetrieveOptions,
    ) -> Result<RetrievalResult> {
        let embedding = self.embedder.encode(question)?;
        let hits = self
            .store
            .query(&embedding, options.n_results, &options.topics)?;

        let mut result = RetrievalResult::default();

        for (id, distance) in hits.iter() {
            // per-entry check, not a cutoff
            if options.distance_threshold.is_some_and(|t| distance > t) {
                continue;
            }

            let mut rows = answers.answers_for(id).peekable();
            let Some(first) = rows.peek() else {
                tracing::debug!(id, distance, "index hit has no recorded answer, skipping");
                continue;
            };
            let question_text = first.question_text.clone();

            let mut texts = Vec::new();
            let mut disagreement = false;
            for row in rows {
                if row.question_text != question_text {
                    disagreement = true;
                }
                if texts.len() < options.n_results {
                    texts.push(row.answer_text.clone());
                }
            }
            if disagreement {
                tracing::warn!(
                    id,
                    kept = %question_text,
                    "answer rows disagree on question text; using the first"
                );
            }

            result.ids.push(id.to_string());
            result.distances.push(distance);
            result.similar_questions.push(question_text);
            result.answers.push(texts);
        }

        tracing::debug!(
            hits = hits.len(),
            returned = result.len(),
            threshold = ?options.distance_threshold,
            "retrieval complete"
        );
        Ok(result)
    }
}
