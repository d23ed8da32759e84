use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("Malformed document {}: {reason}", path.display())]
    MalformedDocument { path: PathBuf, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingFailure),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Why a call to the embedding service did not produce a vector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingFailure {
    #[error("network failure: {0}")]
    Network(String),

    #[error("authentication rejected (HTTP {0})")]
    Auth(u16),

    #[error("quota or rate limit exceeded")]
    Quota,

    #[error("service returned HTTP {0}")]
    Service(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("model mismatch: index built with '{index}', query embedded with '{query}'")]
    ModelMismatch { index: String, query: String },
}

pub mod commands;
pub mod config;
pub mod corpus;
pub mod database;
pub mod embeddings;
pub mod index;
pub mod mcp;
pub mod retrieval;
pub mod telemetry;
pub mod tools;
