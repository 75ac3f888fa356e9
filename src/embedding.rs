//! Embedding extraction for images.
//!
//! The core never inspects image bytes itself; it consumes fixed-length
//! vectors through the [`EmbeddingProvider`] trait. The default
//! implementation runs CLIP ViT-B/32 through fastembed, producing
//! 512-dimensional vectors.

use std::path::Path;
use std::sync::Mutex;

use fastembed::{ImageEmbedding, ImageEmbeddingModel, ImageInitOptions};

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::vector::VectorDimension;

/// Produces a fixed-length embedding vector per image.
///
/// Implementations must be thread-safe; the ingestion layer may call
/// them from a worker pool.
pub trait EmbeddingProvider: Send + Sync {
    /// Extracts an embedding from one image file.
    ///
    /// Fails with [`EmbeddingError::UnreadableImage`] when the file
    /// cannot be opened or decoded.
    fn extract(&self, image: &Path) -> EmbeddingResult<Vec<f32>>;

    /// The dimensionality of every vector this provider produces.
    #[must_use]
    fn dimension(&self) -> VectorDimension;
}

/// CLIP ViT-B/32 image embeddings via fastembed.
///
/// The ONNX model downloads on first use into `cache_dir` and is
/// memory-resident afterwards. Extraction cost dominates indexing
/// latency; the index itself never blocks on it.
pub struct ClipEmbeddingProvider {
    model: Mutex<ImageEmbedding>,
    dimension: VectorDimension,
}

impl ClipEmbeddingProvider {
    /// Initializes the CLIP model, downloading it if not cached.
    pub fn new(cache_dir: &Path, show_download_progress: bool) -> EmbeddingResult<Self> {
        let model = ImageEmbedding::try_new(
            ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

        Ok(Self {
            model: Mutex::new(model),
            dimension: VectorDimension::dimension_512(),
        })
    }
}

impl std::fmt::Debug for ClipEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipEmbeddingProvider")
            .field("model", &"<ImageEmbedding>")
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl EmbeddingProvider for ClipEmbeddingProvider {
    fn extract(&self, image: &Path) -> EmbeddingResult<Vec<f32>> {
        if !image.is_file() {
            return Err(EmbeddingError::UnreadableImage {
                path: image.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                EmbeddingError::Extraction(
                    "failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(vec![image], None)
            .map_err(|e| EmbeddingError::UnreadableImage {
                path: image.to_path_buf(),
                reason: e.to_string(),
            })?;

        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Extraction("model returned no embedding".to_string()))?;

        if embedding.len() != self.dimension.get() {
            return Err(EmbeddingError::Extraction(format!(
                "model produced {} dimensions, expected {}",
                embedding.len(),
                self.dimension.get()
            )));
        }

        Ok(embedding)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// Test double serving canned vectors keyed by path.
#[cfg(test)]
#[derive(Debug)]
pub struct MockEmbeddingProvider {
    vectors: std::collections::HashMap<std::path::PathBuf, Vec<f32>>,
    dimension: VectorDimension,
}

#[cfg(test)]
impl MockEmbeddingProvider {
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            vectors: std::collections::HashMap::new(),
            dimension,
        }
    }

    pub fn with_vector(mut self, path: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(path.into(), vector);
        self
    }
}

#[cfg(test)]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn extract(&self, image: &Path) -> EmbeddingResult<Vec<f32>> {
        self.vectors
            .get(image)
            .cloned()
            .ok_or_else(|| EmbeddingError::UnreadableImage {
                path: image.to_path_buf(),
                reason: "no canned vector for path".to_string(),
            })
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_serves_canned_vectors() {
        let provider = MockEmbeddingProvider::new(VectorDimension::new(3).unwrap())
            .with_vector("a.jpg", vec![1.0, 0.0, 0.0]);

        let vector = provider.extract(Path::new("a.jpg")).unwrap();
        assert_eq!(vector, vec![1.0, 0.0, 0.0]);

        assert!(matches!(
            provider.extract(Path::new("unknown.jpg")),
            Err(EmbeddingError::UnreadableImage { .. })
        ));
    }
}
