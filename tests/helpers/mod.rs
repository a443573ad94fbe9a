#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use agriqa::corpus::{Answer, AnswerCorpus, Question, QuestionCorpus};
use agriqa::embedding::{Embedder, Embedding};
use agriqa::error::{QaError, Result};
use agriqa::store::{Collection, CollectionOptions, VectorStoreClient};

/// Encoder stub with a fixed text → vector table. Unknown text fails with
/// an encoding error, which lets tests inject failures mid-corpus.
#[derive(Default)]
pub struct FakeEmbedder {
    vectors: HashMap<String, Embedding>,
}

impl FakeEmbedder {
    pub fn new(pairs: &[(&str, &[f32])]) -> Self {
        Self {
            vectors: pairs
                .iter()
                .map(|(text, v)| (text.to_string(), v.to_vec()))
                .collect(),
        }
    }
}

impl Embedder for FakeEmbedder {
    fn encode(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(QaError::Encoding("input text is empty".into()));
        }
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| QaError::Encoding(format!("no vector for {text:?}")))
    }
}

/// Wraps an encoder and blocks for `delay` before every `encode` call.
pub struct SlowEmbedder<E> {
    pub inner: E,
    pub delay: Duration,
}

impl<E: Embedder> Embedder for SlowEmbedder<E> {
    fn encode(&self, text: &str) -> Result<Embedding> {
        std::thread::sleep(self.delay);
        self.inner.encode(text)
    }
}

pub fn client() -> VectorStoreClient {
    VectorStoreClient::open_in_memory().unwrap()
}

pub fn collection(client: &VectorStoreClient, name: &str) -> Collection {
    client
        .get_or_create_collection(name, &CollectionOptions::default())
        .unwrap()
}

pub fn question(id: &str, text: &str, category: Option<&str>) -> Question {
    Question {
        id: id.into(),
        text: text.into(),
        category: category.map(String::from),
    }
}

pub fn answer(question_id: &str, question_text: &str, answer_text: &str) -> Answer {
    Answer {
        question_id: question_id.into(),
        question_text: question_text.into(),
        answer_text: answer_text.into(),
    }
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub const PLANT_Q: &str = "When to plant maize?";
pub const FERTILIZER_Q: &str = "Best maize fertilizer?";
pub const PLANT_QUERY: &str = "When should I plant maize";
pub const FERTILIZER_QUERY: &str = "Which fertilizer for maize";
pub const PLANT_ANSWER: &str = "Plant at the start of the rains.";

/// Encoder for the two-question maize corpus. Each query sits close to one
/// question and far from the other.
pub fn maize_embedder() -> FakeEmbedder {
    FakeEmbedder::new(&[
        (PLANT_Q, &[1.0, 0.0]),
        (FERTILIZER_Q, &[0.0, 1.0]),
        (PLANT_QUERY, &[0.9, 0.1]),
        (FERTILIZER_QUERY, &[0.1, 0.9]),
    ])
}

pub fn maize_questions() -> QuestionCorpus {
    QuestionCorpus::new(vec![
        question("q1", PLANT_Q, None),
        question("q2", FERTILIZER_Q, None),
    ])
}

/// Only `q1` has an answer row.
pub fn maize_answers() -> AnswerCorpus {
    AnswerCorpus::new(vec![answer("q1", PLANT_Q, PLANT_ANSWER)])
}
