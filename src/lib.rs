//! Image similarity index: exact cosine search and duplicate clustering

pub mod cluster;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod search;
pub mod vector;

// Explicit exports for better API clarity
pub use cluster::{
    ClusterReport, ClusterThresholds, ClusteringEngine, GroupKind, GroupMember, SimilarityGroup,
};
pub use config::Settings;
pub use error::{
    ClusterError, ClusterResult, EmbeddingError, EmbeddingResult, IndexError, IndexResult,
    SearchError, SearchResult,
};
pub use search::{SearchEngine, SearchHit};
pub use vector::{
    IndexStats, Score, SimilarityIndex, VECTOR_DIMENSION_512, VectorDimension, VectorId,
    VectorRecord,
};
