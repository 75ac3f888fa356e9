//! Vector storage and similarity search for image embeddings.
//!
//! The record store owns normalized embedding vectors with stable ids,
//! the similarity index answers exact top-k cosine queries over them,
//! and the storage layer persists the whole thing as one atomic file.

mod index;
mod storage;
mod store;
mod types;

pub use index::{IndexStats, SimilarityIndex, inner_product};
pub(crate) use index::top_k_neighbors;
pub use store::VectorRecordStore;
pub use types::{Score, VECTOR_DIMENSION_512, VectorDimension, VectorId, VectorRecord};
