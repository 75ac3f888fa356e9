//! Directory scanning and batch feature extraction.
//!
//! Walks a directory tree, finds image files by extension, and runs
//! each through an [`EmbeddingProvider`]. Unreadable files are skipped
//! with a warning rather than failing the batch.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::embedding::EmbeddingProvider;

/// Extensions treated as images, matched case-insensitively.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// Outcome of one ingestion pass.
#[derive(Debug)]
pub struct IngestReport {
    /// Paths paired with their extracted feature vectors, ready for
    /// the index.
    pub vectors: Vec<(String, Vec<f32>)>,
    /// Files that could not be embedded, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Collects image files under `root`, sorted by path for a stable
/// ingestion order.
pub fn find_images(root: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_image(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    images.sort();
    images
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Extracts feature vectors for every image in `paths`.
///
/// Files the provider rejects are collected in the report's `skipped`
/// list instead of aborting the pass. `progress` is invoked once per
/// file, successful or not.
pub fn extract_all(
    provider: &dyn EmbeddingProvider,
    paths: &[PathBuf],
    mut progress: impl FnMut(),
) -> IngestReport {
    let mut vectors = Vec::with_capacity(paths.len());
    let mut skipped = Vec::new();

    for path in paths {
        match provider.extract(path) {
            Ok(vector) => {
                debug!(path = %path.display(), "extracted features");
                vectors.push((path.display().to_string(), vector));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping image");
                skipped.push((path.clone(), e.to_string()));
            }
        }
        progress();
    }

    IngestReport { vectors, skipped }
}
