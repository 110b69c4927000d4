//! Persistence for the index pair (vector artifact + metadata document).
//!
//! Artifacts are generation-suffixed and the manifest names the committed
//! generation; the manifest rename is the sole commit point. A commit that
//! dies after writing the next generation's artifacts leaves the previous
//! pair untouched and still referenced, so [`load_pair`] recovers it. The
//! superseded generation is only removed after the new manifest lands, and
//! the count checks in [`load_pair`] catch a pair that disagrees with its
//! manifest.

use crate::error::{IndexError, IndexResult};
use crate::store::metadata::MetadataStore;
use crate::vector::{FlatIndex, VectorDimension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// File name of the manifest inside the index directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// File name of the vector index artifact for a generation.
#[must_use]
pub fn vectors_file_name(generation: u64) -> String {
    format!("vectors-{generation}.fsix")
}

/// File name of the metadata document for a generation.
#[must_use]
pub fn metadata_file_name(generation: u64) -> String {
    format!("metadata-{generation}.json")
}

/// Manifest describing a committed index pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreManifest {
    /// Manifest schema version
    pub version: u32,
    /// Monotonic counter, bumped on every committed update
    pub generation: u64,
    /// Embedding dimension of the vector artifact
    pub dimension: usize,
    /// Number of frame records (and vectors) in the pair
    pub record_count: usize,
    /// Embedding model that produced the vectors
    pub model_name: String,
    /// Unix seconds when the index was first created
    pub created_at: u64,
    /// Unix seconds of the last committed update
    pub updated_at: u64,
}

impl StoreManifest {
    const SCHEMA_VERSION: u32 = 1;

    /// Creates a manifest for a brand-new index.
    #[must_use]
    pub fn new(dimension: VectorDimension, model_name: &str) -> Self {
        let now = unix_now();
        Self {
            version: Self::SCHEMA_VERSION,
            generation: 0,
            dimension: dimension.get(),
            record_count: 0,
            model_name: model_name.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Advances the manifest to describe a new committed pair.
    pub fn advance(&mut self, record_count: usize) {
        self.generation += 1;
        self.record_count = record_count;
        self.updated_at = unix_now();
    }

    fn save(&self, path: &Path) -> IndexResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let json = serde_json::to_vec_pretty(self).map_err(|source| IndexError::Serialize {
            what: "index manifest",
            source,
        })?;
        let tmp = tempfile::NamedTempFile::new_in(parent).map_err(|source| {
            IndexError::Storage {
                path: path.to_path_buf(),
                source,
            }
        })?;
        std::fs::write(tmp.path(), &json).map_err(|source| IndexError::Storage {
            path: tmp.path().to_path_buf(),
            source,
        })?;
        tmp.persist(path).map_err(|e| IndexError::Storage {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }

    fn load(path: &Path) -> IndexResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| IndexError::Storage {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| IndexError::Serialize {
            what: "index manifest",
            source,
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Returns true if a committed index pair exists in the directory.
#[must_use]
pub fn pair_exists(index_dir: &Path) -> bool {
    index_dir.join(MANIFEST_FILE).exists()
}

/// Commits an index pair to disk.
///
/// The next generation's vectors and metadata are written first under new
/// names, then the manifest rename commits them. A failure before the
/// manifest lands leaves the previous generation intact and referenced.
pub fn save_pair(
    index_dir: &Path,
    index: &FlatIndex,
    metadata: &MetadataStore,
    manifest: &mut StoreManifest,
) -> IndexResult<()> {
    if index.len() != metadata.len() {
        return Err(IndexError::Corrupted {
            reason: format!(
                "refusing to persist mismatched pair: {} vectors, {} records",
                index.len(),
                metadata.len()
            ),
        });
    }

    std::fs::create_dir_all(index_dir).map_err(|source| IndexError::Storage {
        path: index_dir.to_path_buf(),
        source,
    })?;

    let previous_generation = manifest.generation;
    let next_generation = previous_generation + 1;
    index.save(&index_dir.join(vectors_file_name(next_generation)))?;
    metadata.save(&index_dir.join(metadata_file_name(next_generation)))?;

    manifest.advance(metadata.len());
    manifest.save(&index_dir.join(MANIFEST_FILE))?;

    // The old generation is unreferenced now; removal failure only leaks files
    if previous_generation > 0 {
        let _ = std::fs::remove_file(index_dir.join(vectors_file_name(previous_generation)));
        let _ = std::fs::remove_file(index_dir.join(metadata_file_name(previous_generation)));
    }

    info!(
        generation = manifest.generation,
        records = manifest.record_count,
        "Committed index pair"
    );
    Ok(())
}

/// Loads a committed index pair and verifies it against its manifest.
pub fn load_pair(index_dir: &Path) -> IndexResult<(FlatIndex, MetadataStore, StoreManifest)> {
    let manifest = StoreManifest::load(&index_dir.join(MANIFEST_FILE))?;
    let index = FlatIndex::load(&index_dir.join(vectors_file_name(manifest.generation)))?;
    let metadata =
        MetadataStore::load(&index_dir.join(metadata_file_name(manifest.generation)))?;

    if index.dimension().get() != manifest.dimension {
        return Err(IndexError::Corrupted {
            reason: format!(
                "vector artifact dimension {} disagrees with manifest dimension {}",
                index.dimension().get(),
                manifest.dimension
            ),
        });
    }
    if index.len() != manifest.record_count || metadata.len() != manifest.record_count {
        return Err(IndexError::Corrupted {
            reason: format!(
                "manifest records {} vs {} vectors and {} metadata records",
                manifest.record_count,
                index.len(),
                metadata.len()
            ),
        });
    }

    debug!(
        generation = manifest.generation,
        records = manifest.record_count,
        "Loaded index pair"
    );
    Ok((index, metadata, manifest))
}
