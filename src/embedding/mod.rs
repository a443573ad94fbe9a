//! Text-to-vector encoding.
//!
//! [`Embedder`] is the capability the retriever and ingestion routine depend on.
//! [`local::LocalEmbedder`] runs a sentence-transformer ONNX export through
//! ONNX Runtime; build one from configuration with [`create_embedder`].

pub mod local;

use crate::config::EmbeddingConfig;
use crate::error::{QaError, Result};

/// Dense vector representation of a piece of text.
pub type Embedding = Vec<f32>;

/// Maps text to fixed-length embeddings.
///
/// Output is deterministic for a fixed model and configuration. Methods are
/// synchronous; async callers should use `tokio::task::spawn_blocking`.
pub trait Embedder: Send + Sync {
    /// Encode a single text.
    fn encode(&self, text: &str) -> Result<Embedding>;

    /// Encode a batch of texts, preserving order. Implementations may override
    /// for batched inference.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }
}

/// Build the configured local embedder.
///
/// Fails with [`QaError::ModelLoad`] if the model directory lacks `model.onnx`
/// or `tokenizer.json`. Run `agriqa model download` first.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let embedder = local::LocalEmbedder::new(config)?;
    Ok(Box::new(embedder))
}

/// Reject inputs the encoder cannot give a meaningful vector for.
pub(crate) fn ensure_encodable(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(QaError::Encoding("input text is empty".into()));
    }
    Ok(())
}
