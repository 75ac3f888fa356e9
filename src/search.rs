//! The search read path: validated top-k queries with a minimum
//! similarity floor, mapping internal ids back to source metadata.
//!
//! Purely read-only; safe to call concurrently with other reads. An
//! in-progress `add` blocks queries through the index's lock (see
//! [`SimilarityIndex`]).

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::{SearchError, SearchResult};
use crate::vector::{Score, SimilarityIndex, VectorRecord};

/// One ranked neighbor of a query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub record: VectorRecord,
    pub similarity: Score,
}

/// Finds images similar to a query vector or query image.
///
/// Holds a shared handle to the long-lived index; construct once and
/// reuse across queries.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    index: Arc<SimilarityIndex>,
}

impl SearchEngine {
    #[must_use]
    pub fn new(index: Arc<SimilarityIndex>) -> Self {
        Self { index }
    }

    /// Returns up to `top_k` neighbors of `vector` with similarity at
    /// least `min_similarity`, in the index's deterministic order.
    ///
    /// `top_k` must be positive and `min_similarity` within the cosine
    /// range [-1, 1]. A query against an empty index returns an empty
    /// sequence, not an error.
    pub fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> SearchResult<Vec<SearchHit>> {
        validate_params(top_k, min_similarity)?;

        let neighbors = self.index.query(vector, top_k)?;

        Ok(neighbors
            .into_iter()
            .filter(|(_, score)| score.get() >= min_similarity)
            .filter_map(|(id, similarity)| {
                self.index.get(id).map(|record| SearchHit { record, similarity })
            })
            .collect())
    }

    /// Embeds a query image through `provider`, then searches with the
    /// resulting vector.
    pub fn search_image(
        &self,
        provider: &dyn EmbeddingProvider,
        image: &Path,
        top_k: usize,
        min_similarity: f32,
    ) -> SearchResult<Vec<SearchHit>> {
        validate_params(top_k, min_similarity)?;
        let vector = provider.extract(image)?;
        self.search(&vector, top_k, min_similarity)
    }
}

fn validate_params(top_k: usize, min_similarity: f32) -> SearchResult<()> {
    if top_k == 0 {
        return Err(SearchError::InvalidParameter {
            name: "top_k",
            reason: "must be a positive integer".to_string(),
        });
    }
    if min_similarity.is_nan() || !(-1.0..=1.0).contains(&min_similarity) {
        return Err(SearchError::InvalidParameter {
            name: "min_similarity",
            reason: format!("{min_similarity} is outside the cosine range [-1, 1]"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingProvider;
    use crate::vector::VectorDimension;

    fn engine_over_scenario() -> SearchEngine {
        // Ids 1 and 2 identical, 3 at ~0.9 to nothing else relevant,
        // 4 orthogonal to the rest.
        let index = SimilarityIndex::build(&[
            ("dup1.jpg".to_string(), vec![0.0, 0.0, 1.0]),
            ("dup2.jpg".to_string(), vec![0.0, 0.0, 1.0]),
            ("other.jpg".to_string(), vec![0.6268, 1.0, 0.0]),
            ("lone.jpg".to_string(), vec![1.0, -0.6268, 0.0]),
        ])
        .unwrap();
        SearchEngine::new(Arc::new(index))
    }

    #[test]
    fn test_search_filters_below_min_similarity() {
        let engine = engine_over_scenario();

        let hits = engine.search(&[0.0, 0.0, 1.0], 3, 0.99).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.source_path, "dup1.jpg");
        assert_eq!(hits[1].record.source_path, "dup2.jpg");
        for hit in &hits {
            assert!(hit.similarity.get() >= 0.99);
        }
    }

    #[test]
    fn test_search_caps_at_top_k() {
        let engine = engine_over_scenario();
        let hits = engine.search(&[0.0, 0.0, 1.0], 1, -1.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id.get(), 1);
    }

    #[test]
    fn test_search_empty_index_is_empty_not_error() {
        let engine = SearchEngine::new(Arc::new(SimilarityIndex::new()));
        assert!(engine.search(&[1.0, 0.0], 5, 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_parameter_validation() {
        let engine = engine_over_scenario();

        assert!(matches!(
            engine.search(&[0.0, 0.0, 1.0], 0, 0.5),
            Err(SearchError::InvalidParameter { name: "top_k", .. })
        ));
        assert!(matches!(
            engine.search(&[0.0, 0.0, 1.0], 5, 1.5),
            Err(SearchError::InvalidParameter { name: "min_similarity", .. })
        ));
        assert!(matches!(
            engine.search(&[0.0, 0.0, 1.0], 5, f32::NAN),
            Err(SearchError::InvalidParameter { name: "min_similarity", .. })
        ));
    }

    #[test]
    fn test_search_image_goes_through_provider() {
        let engine = engine_over_scenario();
        let provider = MockEmbeddingProvider::new(VectorDimension::new(3).unwrap())
            .with_vector("query.jpg", vec![0.0, 0.0, 2.0]);

        let hits = engine
            .search_image(&provider, Path::new("query.jpg"), 2, 0.99)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.source_path, "dup1.jpg");
    }
}
