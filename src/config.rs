//! Configuration module for the video indexing system.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `FRAMESIFT_` and use double
//! underscores to separate nested levels:
//! - `FRAMESIFT_SAMPLING__INTERVAL_SECS=2.0` sets `sampling.interval_secs`
//! - `FRAMESIFT_EMBEDDING__BATCH_SIZE=64` sets `embedding.batch_size`
//! - `FRAMESIFT_SEARCH__DEFAULT_TOP_K=5` sets `search.default_top_k`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Root directory for all persisted state (index, frames, results)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Frame sampling configuration
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Search defaults
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SamplingConfig {
    /// Seconds between consecutive sampled frames
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,

    /// Width of sampled frames in pixels
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,

    /// Height of sampled frames in pixels
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,

    /// JPEG quality for persisted preview frames (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Embedding model family; only CLIP ViT-B/32 is currently supported
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Number of frames encoded per batch (throughput only, never affects vectors)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Cache directory for downloaded model weights
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Number of results returned when the caller does not specify one
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Total length in seconds of materialized preview clips (centered on the hit)
    #[serde(default = "default_clip_secs")]
    pub clip_secs: f64,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".framesift")
}
fn default_false() -> bool {
    false
}
fn default_interval_secs() -> f64 {
    1.0
}
fn default_frame_width() -> u32 {
    224
}
fn default_frame_height() -> u32 {
    224
}
fn default_jpeg_quality() -> u8 {
    95
}
fn default_embedding_model() -> String {
    "ClipVitB32".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_top_k() -> usize {
    10
}
fn default_clip_secs() -> f64 {
    10.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            debug: false,
            sampling: SamplingConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            models_dir: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            clip_secs: default_clip_secs(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(".framesift/settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path))
            // Layer in environment variables with FRAMESIFT_ prefix.
            // Double underscore becomes a dot; single underscores stay.
            .merge(Env::prefixed("FRAMESIFT_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the workspace config by looking for a .framesift directory,
    /// searching from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".framesift");
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Directory holding the vector index, metadata document, and manifest
    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    /// Directory holding persisted preview frames, one subdirectory per video
    pub fn frames_dir(&self) -> PathBuf {
        self.data_dir.join("frames")
    }

    /// Scratch area for materialized clips and copied result frames
    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    /// Cache directory for embedding model weights
    pub fn models_dir(&self) -> PathBuf {
        self.embedding
            .models_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("models"))
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(".framesift/settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = r#"# framesift configuration file

# Version of the configuration schema
version = 1

# Root directory for all persisted state
data_dir = ".framesift"

# Global debug mode
debug = false

[sampling]
# Seconds between consecutive sampled frames
interval_secs = 1.0

# Sampled frame size (CLIP input resolution)
frame_width = 224
frame_height = 224

# JPEG quality for persisted preview frames
jpeg_quality = 95

[embedding]
# Embedding model family
model = "ClipVitB32"

# Frames encoded per batch (throughput only)
batch_size = 32

[search]
# Results returned when --top-k is not given
default_top_k = 10

# Total length in seconds of materialized preview clips
clip_secs = 10.0
"#;

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}
