//! HTTP API.
//!
//! The encoder, index client, and answer corpus are built once by
//! [`setup_state`] and shared by every request through [`AppState`].
//! Blocking work (encoding, SQLite) runs on the blocking thread pool.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::config::QaConfig;
use crate::corpus::{AnswerCorpus, QuestionCorpus};
use crate::embedding::{self, Embedder};
use crate::error::QaError;
use crate::ingest::{self, IngestOptions};
use crate::retrieval::{RetrievalResult, RetrieveOptions, Retriever};
use crate::store::VectorStoreClient;

/// Long-lived resources shared across requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<QaConfig>,
    pub embedder: Arc<dyn Embedder>,
    pub client: VectorStoreClient,
    pub answers: Arc<AnswerCorpus>,
    ingest_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(
        config: QaConfig,
        embedder: Arc<dyn Embedder>,
        client: VectorStoreClient,
        answers: AnswerCorpus,
    ) -> Self {
        Self {
            config: Arc::new(config),
            embedder,
            client,
            answers: Arc::new(answers),
            ingest_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn retrieve_options(&self) -> RetrieveOptions {
        RetrieveOptions {
            n_results: self.config.retrieval.n_results,
            topics: self.config.retrieval.topics.clone(),
            distance_threshold: self.config.retrieval.distance_threshold,
        }
    }
}

/// Open the store, load the encoder and the answer corpus.
pub fn setup_state(config: QaConfig) -> anyhow::Result<AppState> {
    let db_path = config.resolved_db_path();
    let client = VectorStoreClient::open(&db_path)
        .with_context(|| format!("failed to open vector store at {}", db_path.display()))?;
    tracing::info!(db = %db_path.display(), "vector store ready");
    client.warn_on_model_mismatch(&config.storage.collection, &config.embedding.model);

    let embedder: Arc<dyn Embedder> = Arc::from(
        embedding::create_embedder(&config.embedding).context("failed to load embedding model")?,
    );
    tracing::info!("encoder ready");

    let answers = AnswerCorpus::load(&config.resolved_answers_path(), config.delimiter())
        .context("failed to load answer corpus")?;

    Ok(AppState::new(config, embedder, client, answers))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/query/", post(query))
        .route("/query", post(query))
        .route("/init", post(init))
        .route("/update", post(update))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until ctrl-c.
pub async fn serve(config: QaConfig) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = setup_state(config)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "AgriQA API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

// ── Request / response types ──────────────────────────────────────────────────

/// Body of `POST /query/`.
///
/// Only `question` drives retrieval. The remaining fields are accepted for
/// compatibility with existing clients but do not affect the category filter.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub language: String,
    pub category: String,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub sub_topic: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_kind: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Qa(QaError),
    Timeout(Duration),
    Rejected { status: StatusCode, message: String },
    Internal(String),
}

impl From<QaError> for ApiError {
    fn from(e: QaError) -> Self {
        ApiError::Qa(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {e}"))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Qa(e) => match e {
                QaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                QaError::CollectionNotFound(_) => StatusCode::NOT_FOUND,
                QaError::IngestionInProgress(_) => StatusCode::CONFLICT,
                QaError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Qa(e) => e.kind(),
            ApiError::Timeout(_) => "timeout",
            ApiError::Rejected { .. } => "invalid_request",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Qa(e) => e.to_string(),
            ApiError::Timeout(d) => format!("request timed out after {}s", d.as_secs()),
            ApiError::Rejected { message, .. } | ApiError::Internal(message) => message.clone(),
        };
        if status.is_server_error() {
            tracing::error!(status = %status, kind = self.kind(), %message, "request failed");
        }
        let body = ErrorBody {
            error_kind: self.kind().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Welcome to the AgriQA API server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<RetrievalResult>, ApiError> {
    let Json(req) = payload?;
    if req.question.trim().is_empty() {
        return Err(QaError::InvalidInput("question must not be empty".into()).into());
    }
    tracing::info!(
        question_len = req.question.len(),
        language = %req.language,
        category = %req.category,
        "query received"
    );

    let options = state.retrieve_options();
    let timeout = state.config.request_timeout();
    let worker = state.clone();
    let question = req.question;
    let task = tokio::task::spawn_blocking(move || {
        let collection = worker
            .client
            .get_collection(&worker.config.storage.collection)?;
        Retriever::new(worker.embedder.as_ref(), &collection).retrieve(
            &question,
            &worker.answers,
            &options,
        )
    });

    let result = tokio::time::timeout(timeout, task)
        .await
        .map_err(|_| ApiError::Timeout(timeout))???;

    tracing::info!(matches = result.len(), "query answered");
    Ok(Json(result))
}

async fn init(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let collection = state.config.storage.collection.clone();
    let guard = Arc::clone(&state.ingest_lock)
        .try_lock_owned()
        .map_err(|_| QaError::IngestionInProgress(collection.clone()))?;

    let worker = state.clone();
    let report = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        let config = &worker.config;
        let corpus = QuestionCorpus::load(&config.resolved_questions_path(), config.delimiter())?;
        ingest::ingest(
            worker.embedder.as_ref(),
            &worker.client,
            &corpus,
            &collection,
            &IngestOptions::from_config(config, false),
        )
    })
    .await??;

    tracing::info!(
        collection = %report.collection,
        inserted = report.inserted,
        skipped = report.skipped,
        "index initialized"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Parses the update payload as a question corpus, then reports that updates
/// are unsupported.
async fn update(State(state): State<AppState>, body: String) -> Result<StatusCode, ApiError> {
    let corpus =
        QuestionCorpus::from_reader(body.as_bytes(), state.config.delimiter(), Path::new("request body"))
            .map_err(|e| QaError::InvalidInput(e.to_string()))?;
    ingest::apply_update(&corpus)?;
    Ok(StatusCode::NO_CONTENT)
}
