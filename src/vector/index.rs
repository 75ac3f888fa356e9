//! The similarity index: exact nearest-neighbor queries over the
//! record store, incremental append, and atomic persistence.
//!
//! Vectors are normalized once at insertion, so cosine similarity at
//! query time is a single inner product per comparison (flat IP scan).

use std::path::Path;

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{IndexError, IndexResult};
use crate::vector::storage;
use crate::vector::store::{VectorRecordStore, normalize};
use crate::vector::types::{Score, VectorDimension, VectorId, VectorRecord};

/// A long-lived similarity index over embedding vectors.
///
/// Concurrency model: single-writer/multiple-reader. One `RwLock` wraps
/// the whole index, so `query`, `save`, and snapshots may run
/// concurrently with each other but block while an `add` holds the
/// write lock. Construct once at process start and inject into the
/// search and clustering engines.
#[derive(Debug)]
pub struct SimilarityIndex {
    inner: RwLock<VectorRecordStore>,
}

/// Summary counters for an index, for status output.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_vectors: usize,
    pub dimension: Option<usize>,
    pub next_id: u32,
}

impl SimilarityIndex {
    /// Creates an empty index with no fixed dimensionality.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(VectorRecordStore::new()),
        }
    }

    /// Builds an index from a sequence of `(source_path, vector)` pairs.
    ///
    /// Ids are assigned in sequence order starting at 1, so construction
    /// is idempotent for the same input sequence. Fails with
    /// `DimensionMismatch` if any two vectors disagree in length.
    pub fn build(pairs: &[(String, Vec<f32>)]) -> IndexResult<Self> {
        let index = Self::new();
        if !pairs.is_empty() {
            index.add(pairs)?;
        }
        Ok(index)
    }

    /// Appends vectors without disturbing previously assigned ids.
    ///
    /// All-or-nothing per batch: one bad vector fails the whole call and
    /// leaves the index unchanged. The first successful add fixes the
    /// index dimensionality; an empty batch before that point fails with
    /// `EmptyInput`.
    pub fn add(&self, pairs: &[(String, Vec<f32>)]) -> IndexResult<Vec<VectorId>> {
        self.inner.write().append(pairs)
    }

    /// Returns up to `k` nearest neighbors of `vector`, ordered by
    /// descending similarity with ties broken by ascending id.
    ///
    /// The query vector is normalized here; a zero-magnitude or
    /// non-finite query fails with `DegenerateVector`. A query against
    /// an empty index returns an empty sequence, not an error.
    pub fn query(&self, vector: &[f32], k: usize) -> IndexResult<Vec<(VectorId, Score)>> {
        let store = self.inner.read();

        let Some(dimension) = store.dimension() else {
            return Ok(Vec::new());
        };
        dimension.validate_vector(vector)?;

        let query = normalize(vector).ok_or_else(|| IndexError::DegenerateVector {
            source_path: "query vector".to_string(),
        })?;

        Ok(top_k_neighbors(store.records(), &query, k, None))
    }

    /// Looks up a record by id, cloning it out of the store.
    #[must_use]
    pub fn get(&self, id: VectorId) -> Option<VectorRecord> {
        self.inner.read().get(id).cloned()
    }

    /// A point-in-time copy of every record, in ascending id order.
    ///
    /// Clustering runs against this snapshot so a concurrent `add`
    /// cannot shift the corpus mid-pass.
    #[must_use]
    pub fn snapshot(&self) -> Vec<VectorRecord> {
        self.inner.read().records().to_vec()
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True if the index holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// The fixed dimensionality, once the first vectors have landed.
    #[must_use]
    pub fn dimension(&self) -> Option<VectorDimension> {
        self.inner.read().dimension()
    }

    /// Summary counters for status output.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let store = self.inner.read();
        IndexStats {
            total_vectors: store.len(),
            dimension: store.dimension().map(|d| d.get()),
            next_id: store.next_id(),
        }
    }

    /// Persists the whole index (vectors, metadata, dimensionality, id
    /// counter) to `path` as one atomic unit.
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        storage::save_store(&self.inner.read(), path)
    }

    /// Loads an index previously written by [`save`](Self::save).
    ///
    /// Fails with `CorruptIndex` if the stored layout is internally
    /// inconsistent; a failed load never yields a partial index.
    pub fn load(path: &Path) -> IndexResult<Self> {
        Ok(Self {
            inner: RwLock::new(storage::load_store(path)?),
        })
    }
}

impl Default for SimilarityIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Inner product of two equal-length vectors.
///
/// Both sides are expected to be L2-normalized, making this cosine
/// similarity.
#[must_use]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimension");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Exact top-k scan over a record slice.
///
/// Deterministic: descending similarity, ties broken by ascending id.
/// `exclude` drops one id from the candidates (a record queried against
/// its own corpus).
pub(crate) fn top_k_neighbors(
    records: &[VectorRecord],
    query: &[f32],
    k: usize,
    exclude: Option<VectorId>,
) -> Vec<(VectorId, Score)> {
    let mut candidates: Vec<(VectorId, Score)> = records
        .iter()
        .filter(|r| Some(r.id) != exclude)
        .map(|r| (r.id, Score::clamped(inner_product(query, &r.vector))))
        .collect();

    candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    candidates.truncate(k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pair(path: &str, vector: Vec<f32>) -> (String, Vec<f32>) {
        (path.to_string(), vector)
    }

    fn small_index() -> SimilarityIndex {
        SimilarityIndex::build(&[
            pair("a.jpg", vec![1.0, 0.0, 0.0]),
            pair("b.jpg", vec![1.0, 0.0, 0.0]),
            pair("c.jpg", vec![0.0, 1.0, 0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_assigns_ids_in_sequence_order() {
        let index = small_index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.get(VectorId::new_unchecked(1)).unwrap().source_path, "a.jpg");
        assert_eq!(index.get(VectorId::new_unchecked(3)).unwrap().source_path, "c.jpg");
    }

    #[test]
    fn test_query_orders_by_similarity_then_id() {
        let index = small_index();

        let results = index.query(&[1.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(results.len(), 3);
        // Ids 1 and 2 both score 1.0; the tie breaks to the lower id.
        assert_eq!(results[0].0.get(), 1);
        assert_eq!(results[1].0.get(), 2);
        assert!((results[0].1.get() - 1.0).abs() < 1e-6);
        assert_eq!(results[2].0.get(), 3);
        assert!(results[2].1.get() < 0.1);
    }

    #[test]
    fn test_query_is_deterministic() {
        let index = small_index();
        let first = index.query(&[0.7, 0.7, 0.1], 3).unwrap();
        for _ in 0..5 {
            assert_eq!(index.query(&[0.7, 0.7, 0.1], 3).unwrap(), first);
        }
    }

    #[test]
    fn test_query_empty_index_returns_empty() {
        let index = SimilarityIndex::new();
        assert!(index.query(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = small_index();
        assert!(matches!(
            index.query(&[1.0, 0.0], 3),
            Err(IndexError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_query_zero_vector_rejected() {
        let index = small_index();
        assert!(matches!(
            index.query(&[0.0, 0.0, 0.0], 3),
            Err(IndexError::DegenerateVector { .. })
        ));
    }

    #[test]
    fn test_non_finite_vectors_never_reach_scoring() {
        let index = small_index();

        // A NaN vector must fail insertion, not poison later score sorts.
        let result = index.add(&[pair("nan.jpg", vec![f32::NAN, 0.0, 0.0])]);
        assert!(matches!(result, Err(IndexError::DegenerateVector { .. })));

        assert_eq!(index.len(), 3);
        let results = index.query(&[1.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(results.len(), 3);

        // A NaN query is rejected before any comparison happens.
        assert!(matches!(
            index.query(&[f32::NAN, 0.0, 0.0], 3),
            Err(IndexError::DegenerateVector { .. })
        ));
    }

    #[test]
    fn test_failed_add_leaves_index_queryable() {
        let index = small_index();

        let result = index.add(&[pair("bad.jpg", vec![1.0, 0.0])]);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));

        assert_eq!(index.len(), 3);
        let results = index.query(&[0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(results[0].0.get(), 3);
    }

    #[test]
    fn test_id_stability_across_adds() {
        let index = small_index();
        let before = index.get(VectorId::new_unchecked(2)).unwrap();

        let ids = index.add(&[pair("d.jpg", vec![0.0, 0.0, 1.0])]).unwrap();
        assert_eq!(ids[0].get(), 4);

        let after = index.get(VectorId::new_unchecked(2)).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.lvec");

        let index = small_index();
        index.add(&[pair("d.jpg", vec![0.2, 0.5, 0.8])]).unwrap();
        index.save(&path).unwrap();

        let loaded = SimilarityIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.stats().next_id, index.stats().next_id);
        for id in 1..=4u32 {
            let id = VectorId::new_unchecked(id);
            assert_eq!(loaded.get(id), index.get(id));
        }

        // Ids keep advancing from the persisted counter.
        let ids = loaded.add(&[pair("e.jpg", vec![1.0, 1.0, 1.0])]).unwrap();
        assert_eq!(ids[0].get(), 5);
    }

    #[test]
    fn test_self_similarity_is_one() {
        let index = SimilarityIndex::build(&[pair("a.jpg", vec![0.3, -0.2, 0.9])]).unwrap();
        let results = index.query(&[0.3, -0.2, 0.9], 1).unwrap();
        assert!((results[0].1.get() - 1.0).abs() < 1e-6);
    }
}
