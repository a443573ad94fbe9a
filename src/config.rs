use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::store::DistanceMetric;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct QaConfig {
    pub server: ServerConfig,
    pub embedding: EmbeddingConfig,
    pub storage: StorageConfig,
    pub corpus: CorpusConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model identifier recorded on collections; used to detect model changes.
    pub model: String,
    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub model_path: String,
    pub max_seq_length: usize,
    pub normalize: bool,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub collection: String,
    pub metric: DistanceMetric,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorpusConfig {
    pub questions_path: String,
    pub answers_path: String,
    pub delimiter: char,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub n_results: usize,
    pub distance_threshold: Option<f64>,
    pub topics: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            log_level: "info".into(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".into(),
            model_path: String::new(),
            max_seq_length: 80,
            normalize: true,
            batch_size: 32,
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            questions_path: String::new(),
            answers_path: String::new(),
            delimiter: ',',
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            n_results: 1,
            distance_threshold: None,
            topics: Vec::new(),
        }
    }
}

/// Returns `~/.agriqa/`
pub fn default_agriqa_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agriqa")
}

/// Returns the default config file path: `~/.agriqa/config.toml`
pub fn default_config_path() -> PathBuf {
    default_agriqa_dir().join("config.toml")
}

impl QaConfig {
    /// Load from `path`, `AGRIQA_CONFIG`, or the default location, in that order.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(p),
            None => match std::env::var("AGRIQA_CONFIG") {
                Ok(p) => Self::load_from(p),
                Err(_) => Self::load_from(default_config_path()),
            },
        }
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            QaConfig::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        let string_overrides: [(&str, &mut String); 8] = [
            ("AGRIQA_HOST", &mut self.server.host),
            ("AGRIQA_LOG_LEVEL", &mut self.server.log_level),
            ("AGRIQA_MODEL_PATH", &mut self.embedding.model_path),
            ("AGRIQA_DB", &mut self.storage.db_path),
            ("AGRIQA_COLLECTION", &mut self.storage.collection),
            ("AGRIQA_QUESTIONS", &mut self.corpus.questions_path),
            ("AGRIQA_ANSWERS", &mut self.corpus.answers_path),
            ("AGRIQA_MODEL", &mut self.embedding.model),
        ];
        for (key, slot) in string_overrides {
            if let Ok(val) = std::env::var(key) {
                *slot = val;
            }
        }
        if let Ok(val) = std::env::var("AGRIQA_PORT") {
            self.server.port = val
                .parse()
                .with_context(|| format!("AGRIQA_PORT is not a valid port: {val}"))?;
        }
        Ok(())
    }

    /// Check that every setting the service cannot run without is present.
    ///
    /// All missing keys are reported together.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("embedding.model_path (AGRIQA_MODEL_PATH)", &self.embedding.model_path),
            ("storage.db_path (AGRIQA_DB)", &self.storage.db_path),
            ("storage.collection (AGRIQA_COLLECTION)", &self.storage.collection),
            ("corpus.questions_path (AGRIQA_QUESTIONS)", &self.corpus.questions_path),
            ("corpus.answers_path (AGRIQA_ANSWERS)", &self.corpus.answers_path),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            bail!("missing required settings: {}", missing.join(", "));
        }

        if self.embedding.max_seq_length == 0 {
            bail!("embedding.max_seq_length must be greater than 0");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be greater than 0");
        }
        if self.server.request_timeout_secs == 0 {
            bail!("server.request_timeout_secs must be greater than 0");
        }
        if self.retrieval.n_results == 0 {
            bail!("retrieval.n_results must be greater than 0");
        }
        if !self.corpus.delimiter.is_ascii() {
            bail!("corpus.delimiter must be a single ASCII character");
        }
        Ok(())
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_model_path(&self) -> PathBuf {
        expand_tilde(&self.embedding.model_path)
    }

    pub fn resolved_questions_path(&self) -> PathBuf {
        expand_tilde(&self.corpus.questions_path)
    }

    pub fn resolved_answers_path(&self) -> PathBuf {
        expand_tilde(&self.corpus.answers_path)
    }

    pub fn delimiter(&self) -> u8 {
        self.corpus.delimiter as u8
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
