//! Type-safe wrappers and core types for the similarity index.
//!
//! Newtypes over primitive ids, dimensions, and scores following the
//! project's type safety guidelines. Ids are 1-based and monotonically
//! assigned; they are never reused, which keeps persisted neighbor-id
//! lists valid across incremental adds.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Embedding dimension of CLIP ViT-B/32, the default image model.
pub const VECTOR_DIMENSION_512: usize = 512;

/// Type-safe wrapper for vector IDs.
///
/// Uses `NonZeroU32` internally for space optimization and to ensure
/// vector IDs are never zero (which could indicate uninitialized state).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VectorId(NonZeroU32);

impl VectorId {
    /// Creates a new `VectorId` from a non-zero u32.
    ///
    /// Returns `None` if the provided ID is zero.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Creates a new `VectorId`, panicking if zero.
    ///
    /// # Panics
    /// Panics if `id` is zero. Use `new()` for fallible construction.
    #[must_use]
    pub fn new_unchecked(id: u32) -> Self {
        Self(NonZeroU32::new(id).expect("VectorId cannot be zero"))
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// Converts to little-endian bytes for storage.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 4] {
        self.0.get().to_le_bytes()
    }

    /// Creates from little-endian bytes.
    ///
    /// Returns `None` if the bytes represent zero.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        Self::new(u32::from_le_bytes(bytes))
    }
}

impl std::fmt::Display for VectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

/// Type-safe wrapper for vector dimensions.
///
/// The dimension is fixed when the first vectors enter an index and is
/// invariant thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, IndexError> {
        if dim == 0 {
            return Err(IndexError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// The 512-dimensional space of CLIP ViT-B/32 embeddings.
    #[must_use]
    pub const fn dimension_512() -> Self {
        Self(VECTOR_DIMENSION_512)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.0 {
            return Err(IndexError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// A cosine similarity score in [-1.0, 1.0].
///
/// 1.0 is identical direction, 0.0 orthogonal, -1.0 opposite. NaN is
/// rejected at construction so scores have a total order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Score(f32);

impl Score {
    /// Creates a new `Score` with validation.
    ///
    /// Returns an error if the value is NaN or outside [-1.0, 1.0].
    pub fn new(value: f32) -> Result<Self, IndexError> {
        if value.is_nan() || !(-1.0..=1.0).contains(&value) {
            return Err(IndexError::InvalidScore(value));
        }
        Ok(Self(value))
    }

    /// Clamps an inner product into the valid score range.
    ///
    /// Inner products of normalized vectors can drift marginally outside
    /// [-1, 1] through floating-point rounding.
    #[must_use]
    pub fn clamped(value: f32) -> Self {
        Self(value.clamp(-1.0, 1.0))
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .expect("Score values should never be NaN")
    }
}

/// An indexed embedding with its stable identity and source metadata.
///
/// The stored vector is L2-normalized at insertion so cosine similarity
/// against it is a single inner product. Immutable once in the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    /// Stable id, assigned monotonically at insertion, never reused.
    pub id: VectorId,

    /// Source image path. Not required to be unique.
    pub source_path: String,

    /// The normalized embedding vector.
    #[serde(skip)]
    pub vector: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_id_construction() {
        let id = VectorId::new(42).unwrap();
        assert_eq!(id.get(), 42);

        assert!(VectorId::new(0).is_none());

        let id = VectorId::new_unchecked(100);
        assert_eq!(id.get(), 100);
    }

    #[test]
    #[should_panic(expected = "VectorId cannot be zero")]
    fn test_vector_id_unchecked_panic() {
        let _ = VectorId::new_unchecked(0);
    }

    #[test]
    fn test_vector_id_serialization() {
        let id = VectorId::new(12345).unwrap();
        let bytes = id.to_bytes();
        let deserialized = VectorId::from_bytes(bytes).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_vector_dimension() {
        let dim = VectorDimension::new(512).unwrap();
        assert_eq!(dim.get(), 512);
        assert_eq!(VectorDimension::dimension_512(), dim);

        assert!(VectorDimension::new(0).is_err());

        let vec = vec![0.1; 512];
        assert!(dim.validate_vector(&vec).is_ok());

        let wrong_vec = vec![0.1; 100];
        assert!(dim.validate_vector(&wrong_vec).is_err());
    }

    #[test]
    fn test_score_validation() {
        let score = Score::new(0.5).unwrap();
        assert_eq!(score.get(), 0.5);

        assert!(Score::new(-1.0).is_ok());
        assert!(Score::new(1.0).is_ok());
        assert!(Score::new(-1.1).is_err());
        assert!(Score::new(1.1).is_err());
        assert!(Score::new(f32::NAN).is_err());
    }

    #[test]
    fn test_score_clamping_and_ordering() {
        // Rounding drift just past 1.0 clamps back into range
        let drifted = Score::clamped(1.000_001);
        assert_eq!(drifted.get(), 1.0);

        let low = Score::new(0.2).unwrap();
        let high = Score::new(0.9).unwrap();
        assert!(low < high);
    }
}
