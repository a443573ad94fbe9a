//! Question and answer corpora read from delimited text files.
//!
//! Questions need the columns `question_id, question_text` and may carry a
//! `category`; answers need `question_id, question_text, answer_text`. Extra
//! columns are ignored. Both corpora are immutable once loaded.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{QaError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Question {
    #[serde(rename = "question_id")]
    pub id: String,
    #[serde(rename = "question_text")]
    pub text: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub question_text: String,
    pub answer_text: String,
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Read every record of type `T` from a headed, delimited stream.
fn read_records<T, R>(reader: R, delimiter: u8, source: &Path) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut csv = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    csv.deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| QaError::corpus_read(source, e))
}

fn open(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|e| QaError::corpus_read(path, e))
}

/// Ordered list of questions to ingest.
#[derive(Debug, Clone, Default)]
pub struct QuestionCorpus {
    questions: Vec<Question>,
}

impl QuestionCorpus {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn load(path: &Path, delimiter: u8) -> Result<Self> {
        let corpus = Self::from_reader(open(path)?, delimiter, path)?;
        tracing::info!(path = %path.display(), questions = corpus.len(), "question corpus loaded");
        Ok(corpus)
    }

    /// Parse from any reader; `source` is only used in error messages.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8, source: &Path) -> Result<Self> {
        Ok(Self::new(read_records(reader, delimiter, source)?))
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn has_categories(&self) -> bool {
        self.questions.iter().any(|q| q.category.is_some())
    }
}

/// Flat answer relation keyed by `question_id`, kept in file order.
#[derive(Debug, Clone, Default)]
pub struct AnswerCorpus {
    rows: Vec<Answer>,
    by_question: HashMap<String, Vec<usize>>,
}

impl AnswerCorpus {
    pub fn new(rows: Vec<Answer>) -> Self {
        let mut by_question: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            by_question.entry(row.question_id.clone()).or_default().push(i);
        }
        Self { rows, by_question }
    }

    pub fn load(path: &Path, delimiter: u8) -> Result<Self> {
        let corpus = Self::from_reader(open(path)?, delimiter, path)?;
        tracing::info!(
            path = %path.display(),
            answers = corpus.len(),
            questions = corpus.question_count(),
            "answer corpus loaded"
        );
        Ok(corpus)
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: u8, source: &Path) -> Result<Self> {
        Ok(Self::new(read_records(reader, delimiter, source)?))
    }

    /// Every answer row for `question_id`, in corpus order.
    pub fn answers_for<'a>(&'a self, question_id: &str) -> impl Iterator<Item = &'a Answer> + 'a {
        self.by_question
            .get(question_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.rows[i])
    }

    /// Number of answer rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct question ids with at least one answer.
    pub fn question_count(&self) -> usize {
        self.by_question.len()
    }
}
