//! Error types for the video indexing system
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use crate::vector::VectorError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ingest, search, and deletion operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// The video container could not be opened or decoded
    #[error("Cannot read video '{path}': {reason}")]
    UnreadableVideo { path: PathBuf, reason: String },

    /// The embedding backend failed; fatal for the calling operation
    #[error("Embedding failed: {0}. Verify the model is available (first use downloads it)")]
    Embedding(String),

    /// An index position had no matching metadata record
    #[error(
        "Index position {position} has no metadata record (store holds {store_len}). The index and metadata artifacts are out of sync"
    )]
    Consistency { position: usize, store_len: usize },

    /// The source video file for a result could not be located
    #[error("Video '{video_id}' not found on disk")]
    VideoNotFound { video_id: String },

    /// Attempt to ingest a video id that is already indexed
    #[error("Video '{video_id}' is already indexed. Delete it first to re-ingest")]
    DuplicateVideo { video_id: String },

    /// File system errors during a transactional update
    #[error("Failed to write '{path}': {source}")]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Stored artifacts disagree with each other
    #[error("Index appears to be corrupted: {reason}")]
    Corrupted { reason: String },

    /// Serialization of a persisted document failed
    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        source: serde_json::Error,
    },

    /// Vector-level errors (dimension mismatches, artifact format)
    #[error(transparent)]
    Vector(#[from] VectorError),
}

impl IndexError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::UnreadableVideo { .. } => "UNREADABLE_VIDEO",
            Self::Embedding(_) => "ENCODING_ERROR",
            Self::Consistency { .. } => "CONSISTENCY_ERROR",
            Self::VideoNotFound { .. } => "VIDEO_NOT_FOUND",
            Self::DuplicateVideo { .. } => "DUPLICATE_VIDEO",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Corrupted { .. } => "INDEX_CORRUPTED",
            Self::Serialize { .. } => "STORAGE_ERROR",
            Self::Vector(_) => "VECTOR_ERROR",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::UnreadableVideo { .. } => vec![
                "Check that the file is a supported container (mp4, mkv, mov, avi)",
                "Verify the file is not truncated or still uploading",
            ],
            Self::Embedding(_) => vec![
                "Ensure you have network access for the first-time model download",
                "Check the models cache directory for partial downloads",
            ],
            Self::Corrupted { .. } | Self::Consistency { .. } => vec![
                "Delete the index directory and re-ingest your videos",
                "Check for disk errors or filesystem corruption",
            ],
            Self::Storage { .. } => vec![
                "The operation was rolled back; the previous index pair is intact",
                "Check disk space and permissions in the data directory",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        let err = IndexError::UnreadableVideo {
            path: PathBuf::from("clip.mp4"),
            reason: "no video stream".into(),
        };
        assert_eq!(err.status_code(), "UNREADABLE_VIDEO");

        let err = IndexError::DuplicateVideo {
            video_id: "vacation".into(),
        };
        assert_eq!(err.status_code(), "DUPLICATE_VIDEO");

        let err = IndexError::Consistency {
            position: 7,
            store_len: 3,
        };
        assert_eq!(err.status_code(), "CONSISTENCY_ERROR");
    }

    #[test]
    fn storage_errors_suggest_rollback_safety() {
        let err = IndexError::Storage {
            path: PathBuf::from("metadata.json"),
            source: std::io::Error::other("disk full"),
        };
        assert!(!err.recovery_suggestions().is_empty());
    }
}
