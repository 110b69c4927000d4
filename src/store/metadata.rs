//! Frame metadata store backing the vector index.
//!
//! Records are kept in a single ordered list whose offsets mirror the vector
//! index positions exactly: the record at offset N describes the vector at
//! position N. Every mutation that disturbs offsets must renumber, and the
//! whole document is rewritten atomically on save.

use crate::error::{IndexError, IndexResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata for one sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Identifier of the source video (file stem at ingest time)
    pub video_id: String,
    /// Seconds from the start of the video where this frame was sampled
    pub timestamp: f64,
    /// Persisted preview frame (JPEG)
    pub frame_path: PathBuf,
    /// Source video file as given at ingest time
    pub video_path: PathBuf,
    /// Offset in the vector index; always equals this record's list offset
    pub index_position: usize,
}

/// Ordered list of frame records, parallel to the vector index.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    records: Vec<FrameRecord>,
}

impl MetadataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns all records in index order.
    #[must_use]
    pub fn all(&self) -> &[FrameRecord] {
        &self.records
    }

    /// Returns the record at an index position, if present.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&FrameRecord> {
        self.records.get(position)
    }

    /// Appends records for a newly ingested video.
    ///
    /// Each record's `index_position` is assigned here from its final offset,
    /// so callers only need the records in sampling order.
    pub fn append(&mut self, records: impl IntoIterator<Item = FrameRecord>) {
        for mut record in records {
            record.index_position = self.records.len();
            self.records.push(record);
        }
    }

    /// Returns true if any record belongs to the given video.
    #[must_use]
    pub fn contains_video(&self, video_id: &str) -> bool {
        self.records.iter().any(|r| r.video_id == video_id)
    }

    /// Returns the distinct video ids in first-seen order.
    #[must_use]
    pub fn video_ids(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.video_id) {
                seen.push(record.video_id.clone());
            }
        }
        seen
    }

    /// Returns the index positions of all frames from one video, ascending.
    #[must_use]
    pub fn positions_for_video(&self, video_id: &str) -> Vec<usize> {
        self.records
            .iter()
            .filter(|r| r.video_id == video_id)
            .map(|r| r.index_position)
            .collect()
    }

    /// Removes every record for a video and renumbers the survivors.
    ///
    /// Returns the removed records (still carrying their old positions, which
    /// the caller uses to drop the matching vectors). After this call,
    /// `index_position` again equals the list offset for every survivor.
    pub fn remove_video(&mut self, video_id: &str) -> Vec<FrameRecord> {
        let mut removed = Vec::new();
        let mut survivors = Vec::with_capacity(self.records.len());

        for record in self.records.drain(..) {
            if record.video_id == video_id {
                removed.push(record);
            } else {
                survivors.push(record);
            }
        }

        for (offset, record) in survivors.iter_mut().enumerate() {
            record.index_position = offset;
        }
        self.records = survivors;
        removed
    }

    /// Writes the store as a JSON document, atomically (temp-then-rename).
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|source| IndexError::Storage {
            path: parent.to_path_buf(),
            source,
        })?;

        let json = serde_json::to_vec_pretty(&self.records).map_err(|source| {
            IndexError::Serialize {
                what: "frame metadata",
                source,
            }
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

    /// Loads a store written by [`MetadataStore::save`].
    ///
    /// Rejects documents whose positions do not match their offsets; that
    /// indicates a partially applied update or external tampering.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| IndexError::Storage {
            path: path.to_path_buf(),
            source,
        })?;
        let records: Vec<FrameRecord> =
            serde_json::from_slice(&bytes).map_err(|source| IndexError::Serialize {
                what: "frame metadata",
                source,
            })?;

        for (offset, record) in records.iter().enumerate() {
            if record.index_position != offset {
                return Err(IndexError::Corrupted {
                    reason: format!(
                        "metadata record at offset {offset} claims index position {}",
                        record.index_position
                    ),
                });
            }
        }

        Ok(Self { records })
    }
}
