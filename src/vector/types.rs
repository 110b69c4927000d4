//! Type-safe wrappers and core types for vector index functionality.
//!
//! Newtypes here prevent dimension and score mix-ups between the encoder,
//! the index, and the search path.

use thiserror::Error;

/// Embedding dimension for the CLIP ViT-B/32 text/image space.
pub const EMBEDDING_DIMENSION_512: usize = 512;

/// Type-safe wrapper for similarity scores.
///
/// Scores are inner products of L2-normalized vectors, so they live in
/// [-1.0, 1.0] where 1.0 is a perfect match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score(f32);

impl Score {
    /// Creates a new `Score` with validation.
    ///
    /// Returns an error if the score is outside [-1.0, 1.0] or is NaN.
    pub fn new(value: f32) -> Result<Self, VectorError> {
        if value.is_nan() {
            return Err(VectorError::InvalidScore {
                value,
                reason: "Score cannot be NaN",
            });
        }
        // Allow a little float slack from the dot product before clamping
        if !(-1.001..=1.001).contains(&value) {
            return Err(VectorError::InvalidScore {
                value,
                reason: "Score must be in range [-1.0, 1.0]",
            });
        }
        Ok(Self(value.clamp(-1.0, 1.0)))
    }

    /// Creates a score of 1.0 (perfect similarity).
    #[must_use]
    pub const fn one() -> Self {
        Self(1.0)
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .expect("Score values should never be NaN")
    }
}

/// Type-safe wrapper for vector dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Creates the standard 512-dimensional CLIP dimension.
    #[must_use]
    pub const fn dimension_512() -> Self {
        Self(EMBEDDING_DIMENSION_512)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Errors that can occur during vector index operations.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors come from the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Invalid score value: {value}\nReason: {reason}")]
    InvalidScore { value: f32, reason: &'static str },

    #[error("Index artifact error: {0}\nSuggestion: Check disk space and file permissions")]
    Artifact(#[from] std::io::Error),

    #[error("Index artifact is not a framesift index (bad magic bytes)")]
    BadMagic,

    #[error(
        "Invalid artifact version: expected {expected}, got {actual}\nSuggestion: Rebuild the index with this version of framesift"
    )]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Index artifact is truncated: expected {expected} bytes of vector data, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Position {position} is out of bounds for an index of {len} vectors")]
    PositionOutOfBounds { position: usize, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_validation() {
        let score = Score::new(0.5).unwrap();
        assert_eq!(score.get(), 0.5);

        // CLIP similarities can be negative
        let negative = Score::new(-0.25).unwrap();
        assert_eq!(negative.get(), -0.25);

        assert_eq!(Score::one().get(), 1.0);

        assert!(Score::new(-1.5).is_err());
        assert!(Score::new(1.5).is_err());
        assert!(Score::new(f32::NAN).is_err());
    }

    #[test]
    fn score_float_slack_is_clamped() {
        // Dot products of normalized vectors can land a hair above 1.0
        let score = Score::new(1.0000005).unwrap();
        assert_eq!(score.get(), 1.0);
    }

    #[test]
    fn score_ordering() {
        let low = Score::new(0.1).unwrap();
        let high = Score::new(0.9).unwrap();
        assert!(high > low);
    }

    #[test]
    fn dimension_validation() {
        let dim = VectorDimension::new(512).unwrap();
        assert_eq!(dim.get(), 512);
        assert_eq!(VectorDimension::dimension_512().get(), 512);

        assert!(VectorDimension::new(0).is_err());

        let vec = vec![0.1; 512];
        assert!(dim.validate_vector(&vec).is_ok());

        let wrong_vec = vec![0.1; 100];
        assert!(dim.validate_vector(&wrong_vec).is_err());
    }
}
