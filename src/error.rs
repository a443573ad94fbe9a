//! Error taxonomy for the retrieval pipeline.
//!
//! Library code returns [`QaError`]; the binary and CLI wrap it in `anyhow`.
//! [`QaError::kind`] gives the stable `error_kind` string used in HTTP error bodies.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QaError {
    /// The embedding model or its tokenizer could not be loaded.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Input could not be tokenized or inference failed.
    #[error("failed to encode text: {0}")]
    Encoding(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("embedding dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Wraps any encoder or index failure raised while ingesting a corpus.
    #[error("ingestion failed: {0}")]
    Ingestion(#[source] Box<QaError>),

    #[error("an ingestion run is already in progress for collection '{0}'")]
    IngestionInProgress(String),

    #[error("failed to read corpus {}: {message}", path.display())]
    CorpusRead { path: PathBuf, message: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store connection lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QaError>;

impl QaError {
    /// Wrap an error as an ingestion failure. Already-wrapped errors pass through.
    pub fn ingestion(err: QaError) -> Self {
        match err {
            QaError::Ingestion(_) => err,
            other => QaError::Ingestion(Box::new(other)),
        }
    }

    pub fn corpus_read(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        QaError::CorpusRead {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Stable snake_case identifier for this error's category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelLoad(_) => "model_load_error",
            Self::Encoding(_) => "encoding_error",
            Self::CollectionNotFound(_) => "collection_not_found",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::Ingestion(_) => "ingestion_error",
            Self::IngestionInProgress(_) => "ingestion_in_progress",
            Self::CorpusRead { .. } => "corpus_read_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::Unsupported(_) => "unsupported",
            Self::Database(_) => "database_error",
            Self::Serialization(_) => "serialization_error",
            Self::LockPoisoned => "lock_poisoned",
            Self::Io(_) => "io_error",
        }
    }
}
