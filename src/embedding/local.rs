//! Local ONNX Runtime encoder.
//!
//! Implements [`Embedder`] for sentence-transformer exports (all-MiniLM-L6-v2 by
//! default) via `ort`. Handles tokenization with truncation at
//! `max_seq_length`, inference, mean pooling, and optional L2 normalization.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{ensure_encodable, Embedder, Embedding};
use crate::config::EmbeddingConfig;
use crate::error::{QaError, Result};

pub struct LocalEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    normalize: bool,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
unsafe impl Send for LocalEmbedder {}
unsafe impl Sync for LocalEmbedder {}

fn model_load(e: impl std::fmt::Display) -> QaError {
    QaError::ModelLoad(e.to_string())
}

fn encoding(e: impl std::fmt::Display) -> QaError {
    QaError::Encoding(e.to_string())
}

impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_dir = crate::config::expand_tilde(&config.model_path);
        Self::from_dir(&model_dir, config.max_seq_length, config.normalize)
    }

    pub fn from_dir(model_dir: &Path, max_seq_length: usize, normalize: bool) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(QaError::ModelLoad(format!(
                "ONNX model not found at {}. Run `agriqa model download` first.",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(QaError::ModelLoad(format!(
                "tokenizer not found at {}. Run `agriqa model download` first.",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(model_load)?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(model_load)?
            .with_intra_threads(4)
            .map_err(model_load)?
            .commit_from_file(&model_path)
            .map_err(model_load)?;

        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| model_load(format!("failed to load tokenizer: {e}")))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: max_seq_length,
                ..Default::default()
            }))
            .map_err(|e| model_load(format!("failed to set truncation: {e}")))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(
            tokenizer = %tokenizer_path.display(),
            max_seq_length,
            "tokenizer loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            normalize,
        })
    }
}

impl Embedder for LocalEmbedder {
    fn encode(&self, text: &str) -> Result<Embedding> {
        self.encode_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| QaError::Encoding("model returned no embedding".into()))
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        for text in texts {
            ensure_encodable(text)?;
        }

        // Step 1: Tokenize (truncates to max_seq_length)
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| encoding(format!("tokenization failed: {e}")))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        // Step 2: Build flat i64 input tensors
        let mut input_ids_flat = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask_flat = Vec::with_capacity(batch_size * seq_len);

        for encoding in &encodings {
            input_ids_flat.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask_flat.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor =
            Tensor::from_array((shape.clone(), input_ids_flat.into_boxed_slice()))
                .map_err(encoding)?;
        let attention_mask_tensor = Tensor::from_array((
            shape.clone(),
            attention_mask_flat.clone().into_boxed_slice(),
        ))
        .map_err(encoding)?;
        // single-segment input
        let token_type_ids = vec![0i64; batch_size * seq_len];
        let token_type_ids_tensor =
            Tensor::from_array((shape, token_type_ids.into_boxed_slice())).map_err(encoding)?;

        // Step 3: Inference
        let mut session = self
            .session
            .lock()
            .map_err(|e| encoding(format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            })
            .map_err(encoding)?;

        // Step 4: Token embeddings, shape [batch, seq_len, hidden]. Export names vary.
        let token_emb_value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (shape, data) = token_emb_value
            .try_extract_tensor::<f32>()
            .map_err(|e| encoding(format!("failed to extract token embeddings: {e}")))?;

        let dims: &[i64] = &shape;
        if dims.len() != 3 || dims[0] as usize != batch_size {
            return Err(encoding(format!(
                "unexpected token embeddings shape {dims:?}, expected [{batch_size}, seq, hidden]"
            )));
        }
        let actual_seq_len = dims[1] as usize;
        let hidden_dim = dims[2] as usize;

        // Step 5: Mean pooling under the attention mask
        let mut results = Vec::with_capacity(batch_size);
        for b in 0..batch_size {
            let pooled = mean_pool(
                &data[b * actual_seq_len * hidden_dim..(b + 1) * actual_seq_len * hidden_dim],
                &attention_mask_flat[b * seq_len..(b + 1) * seq_len],
                hidden_dim,
            );
            results.push(if self.normalize {
                l2_normalize(&pooled)
            } else {
                pooled
            });
        }

        Ok(results)
    }
}

/// Average the token vectors whose mask is set. `tokens` is `[seq, hidden]` row-major.
fn mean_pool(tokens: &[f32], mask: &[i64], hidden_dim: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_dim];
    let mut count = 0.0f32;

    for (row, &m) in tokens.chunks_exact(hidden_dim).zip(mask) {
        if m > 0 {
            for (acc, v) in sum.iter_mut().zip(row) {
                *acc += v;
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for v in &mut sum {
            *v /= count;
        }
    }
    sum
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
