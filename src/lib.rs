//! Semantic question answering over an agricultural Q&A corpus.
//!
//! A corpus of farmer questions is embedded once and stored in a persistent
//! SQLite collection. Incoming questions are embedded with the same model,
//! matched against the collection by vector distance, and joined with a
//! tabular corpus of expert answers.
//!
//! | Component | Module |
//! |-----------|--------|
//! | Encoder | [`embedding`] |
//! | Similarity index client | [`store`] |
//! | Retriever | [`retrieval`] |
//! | Ingestion | [`ingest`] |
//! | HTTP API | [`server`] |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   distance functions; one database file holds any number of named collections
//! - **Embeddings**: local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//! - **Corpora**: delimited text files read with `csv`
//! - **Transport**: HTTP via axum

pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod retrieval;
pub mod server;
pub mod store;
