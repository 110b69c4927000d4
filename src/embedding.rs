//! Embedding generation for frames and queries.
//!
//! Frames and text queries are encoded into the same 512-dimensional CLIP
//! ViT-B/32 space, which is what makes text-to-frame search work: similarity
//! between a query vector and a frame vector is meaningful because both
//! towers were trained jointly.
//!
//! The [`EmbeddingEncoder`] trait is the seam for tests; the real
//! implementation wraps fastembed's image and text towers.

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::vector::VectorDimension;
use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// Trait for encoding frames and queries into a shared embedding space.
///
/// Implementations must be deterministic: encoding the same input twice
/// yields the same vector, and batch size must never change the vectors.
pub trait EmbeddingEncoder: Send + Sync {
    /// Encodes a batch of frame images (by file path), in order.
    fn encode_images(&self, paths: &[PathBuf]) -> IndexResult<Vec<Vec<f32>>>;

    /// Encodes a text query.
    fn encode_text(&self, query: &str) -> IndexResult<Vec<f32>>;

    /// Dimension of the vectors produced by both towers.
    fn dimension(&self) -> VectorDimension;

    /// Model identifier recorded in the index manifest.
    fn model_name(&self) -> &str;
}

/// CLIP ViT-B/32 encoder backed by fastembed's ONNX runtime.
///
/// Both towers download their weights on first use into the configured
/// models cache directory.
pub struct ClipEncoder {
    image_tower: Mutex<ImageEmbedding>,
    text_tower: Mutex<TextEmbedding>,
    batch_size: usize,
    dimension: VectorDimension,
}

impl ClipEncoder {
    /// Initializes both CLIP towers, downloading weights if needed.
    pub fn new(settings: &Settings) -> IndexResult<Self> {
        let cache_dir = settings.models_dir();
        info!(cache = %cache_dir.display(), "Initializing CLIP ViT-B/32 towers");

        let image_tower = ImageEmbedding::try_new(
            ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
                .with_cache_dir(cache_dir.clone())
                .with_show_download_progress(true),
        )
        .map_err(|e| IndexError::Embedding(format!("image tower init: {e}")))?;

        let text_tower = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::ClipVitB32)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(true),
        )
        .map_err(|e| IndexError::Embedding(format!("text tower init: {e}")))?;

        Ok(Self {
            image_tower: Mutex::new(image_tower),
            text_tower: Mutex::new(text_tower),
            batch_size: settings.embedding.batch_size,
            dimension: VectorDimension::dimension_512(),
        })
    }
}

impl EmbeddingEncoder for ClipEncoder {
    fn encode_images(&self, paths: &[PathBuf]) -> IndexResult<Vec<Vec<f32>>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let tower = self
            .image_tower
            .lock()
            .map_err(|_| IndexError::Embedding("image tower lock poisoned".into()))?;

        let embeddings = tower
            .embed(paths.to_vec(), Some(self.batch_size))
            .map_err(|e| IndexError::Embedding(format!("image encoding: {e}")))?;

        if embeddings.len() != paths.len() {
            return Err(IndexError::Embedding(format!(
                "expected {} frame embeddings, got {}",
                paths.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    fn encode_text(&self, query: &str) -> IndexResult<Vec<f32>> {
        let tower = self
            .text_tower
            .lock()
            .map_err(|_| IndexError::Embedding("text tower lock poisoned".into()))?;

        let mut embeddings = tower
            .embed(vec![query.to_string()], None)
            .map_err(|e| IndexError::Embedding(format!("text encoding: {e}")))?;

        embeddings
            .pop()
            .ok_or_else(|| IndexError::Embedding("text tower returned no vector".into()))
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "ClipVitB32"
    }
}

/// Deterministic encoder for tests. No models, no downloads.
///
/// Images hash their file name into a direction; text hashes the query the
/// same way, so a test can force a text query to match a specific frame by
/// using the frame's file name as the query.
#[cfg(test)]
pub struct MockEncoder {
    dimension: VectorDimension,
}

#[cfg(test)]
impl MockEncoder {
    pub fn new(dimension: VectorDimension) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, seed: &str) -> Vec<f32> {
        use std::hash::{DefaultHasher, Hash, Hasher};

        let dim = self.dimension.get();
        let mut vector = Vec::with_capacity(dim);
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        let mut state = hasher.finish();
        for _ in 0..dim {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            vector.push(((state >> 33) as f32 / (1u64 << 31) as f32) - 1.0);
        }
        crate::vector::l2_normalize(&mut vector);
        vector
    }
}

#[cfg(test)]
impl EmbeddingEncoder for MockEncoder {
    fn encode_images(&self, paths: &[PathBuf]) -> IndexResult<Vec<Vec<f32>>> {
        Ok(paths
            .iter()
            .map(|p| {
                let seed = p
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.vector_for(&seed)
            })
            .collect())
    }

    fn encode_text(&self, query: &str) -> IndexResult<Vec<f32>> {
        Ok(self.vector_for(query))
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
