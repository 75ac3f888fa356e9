//! Configuration for the similarity index and its CLI.
//!
//! Layered settings: defaults, then a `settings.toml` file, then
//! environment variable overrides.
//!
//! # Environment Variables
//!
//! Variables are prefixed with `LOOKALIKE_` and use double underscores
//! for nesting:
//! - `LOOKALIKE_CLUSTERING__DUPLICATE_THRESHOLD=0.97`
//! - `LOOKALIKE_SEARCH__TOP_K=20`
//! - `LOOKALIKE_EMBEDDING__CACHE_DIR=/tmp/models`

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path to the persisted index file
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Search defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Clustering settings
    #[serde(default)]
    pub clustering: ClusteringConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Directory where downloaded ONNX models are cached
    #[serde(default = "default_model_cache_dir")]
    pub cache_dir: PathBuf,

    /// Show a progress bar during first-time model download
    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Default number of results per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Default minimum similarity for results
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClusteringConfig {
    /// Similarity at or above which two images count as duplicates
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f32,

    /// Similarity at or above which two images count as similar
    #[serde(default = "default_similar_threshold")]
    pub similar_threshold: f32,

    /// Cap on neighbors fetched per record during a clustering pass
    #[serde(default = "default_neighbor_cap")]
    pub neighbor_cap: usize,

    /// Number of worker threads for the neighbor pass
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".lookalike/index.lvec")
}
fn default_model_cache_dir() -> PathBuf {
    PathBuf::from(".lookalike/models")
}
fn default_true() -> bool {
    true
}
fn default_top_k() -> usize {
    10
}
fn default_min_similarity() -> f32 {
    0.5
}
fn default_duplicate_threshold() -> f32 {
    0.95
}
fn default_similar_threshold() -> f32 {
    0.85
}
fn default_neighbor_cap() -> usize {
    crate::cluster::DEFAULT_NEIGHBOR_CAP
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            clustering: ClusteringConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_model_cache_dir(),
            show_download_progress: default_true(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: default_duplicate_threshold(),
            similar_threshold: default_similar_threshold(),
            neighbor_cap: default_neighbor_cap(),
            parallel_threads: default_parallel_threads(),
        }
    }
}

impl Settings {
    /// Loads settings from defaults, `settings.toml` next to the
    /// working directory, and `LOOKALIKE_*` environment overrides.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(Path::new("settings.toml"))
    }

    /// Loads settings with an explicit config file path.
    pub fn load_from(config_path: &Path) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("LOOKALIKE_").split("__"))
            .extract()
    }
}
