//! Error types for the similarity index and clustering engine.
//!
//! Structured errors using thiserror. Messages carry actionable
//! suggestions so callers can present them without knowing the
//! image pipeline that produced the vectors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the vector store, the similarity index, and its
/// persistence layer.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors come from the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Cannot normalize vector with zero magnitude or non-finite values (source: {source_path})\nSuggestion: Check the embedding extraction for this image; an all-zero or NaN vector usually means extraction failed silently"
    )]
    DegenerateVector { source_path: String },

    #[error(
        "Empty input: no vectors provided and the index has no fixed dimensionality yet\nSuggestion: Provide at least one vector on the first add or build"
    )]
    EmptyInput,

    #[error(
        "Index file at '{path}' is corrupt: {reason}\nSuggestion: Rebuild the index from the source images"
    )]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Invalid similarity score: {0}\nReason: scores must be in [-1.0, 1.0] and not NaN")]
    InvalidScore(f32),

    #[error("Storage error: {0}\nSuggestion: Check disk space and file permissions")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the search read path.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid search parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Errors raised by a clustering pass.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error(
        "Invalid thresholds: duplicate_threshold {duplicate} < similar_threshold {similar}\nSuggestion: The duplicate threshold must be at least as strict as the similar threshold"
    )]
    InvalidThresholds { duplicate: f32, similar: f32 },

    #[error("Clustering pass cancelled after {records_processed} records")]
    Cancelled { records_processed: usize },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Errors raised by embedding providers.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error(
        "Failed to initialize embedding model: {0}\nSuggestion: Ensure you have an internet connection for the first-time model download"
    )]
    ModelInit(String),

    #[error("Unreadable image '{path}': {reason}")]
    UnreadableImage { path: PathBuf, reason: String },

    #[error("Embedding extraction failed: {0}")]
    Extraction(String),
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Result type alias for clustering operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Result type alias for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
