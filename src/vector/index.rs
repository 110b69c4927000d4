//! Exact inner-product vector index with positional addressing.
//!
//! Positions are contiguous offsets assigned at insertion time and double as
//! the join key into the metadata store. Removal rebuilds the index over the
//! surviving vectors in their original relative order, so positions stay
//! compacted (position N always means the Nth surviving vector).

use crate::vector::{VectorDimension, VectorError};
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::Range;
use std::path::Path;

/// Magic bytes identifying a framesift index artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"FSIX";

/// Current artifact format version.
const ARTIFACT_VERSION: u32 = 1;

/// Flat inner-product index over L2-normalized embedding vectors.
///
/// Similarity is the inner product, which equals cosine similarity because
/// every stored vector (and every query) is normalized to unit length.
/// Higher is better; ties rank by ascending position (first inserted wins).
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: VectorDimension,
    /// Row-major storage: vector i occupies data[i*dim..(i+1)*dim]
    data: Vec<f32>,
}

impl FlatIndex {
    /// Creates an empty index for vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Returns the number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension.get()
    }

    /// Returns true if no vectors are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the vector dimension.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Appends a batch of vectors, returning the contiguous positions assigned.
    ///
    /// Each vector is validated against the index dimension and L2-normalized
    /// before storage so inner product equals cosine similarity.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<Range<usize>, VectorError> {
        for vector in vectors {
            self.dimension.validate_vector(vector)?;
        }

        let start = self.len();
        self.data.reserve(vectors.len() * self.dimension.get());
        for vector in vectors {
            let mut row = vector.clone();
            l2_normalize(&mut row);
            self.data.extend_from_slice(&row);
        }

        Ok(start..self.len())
    }

    /// Returns the stored vector at a position.
    pub fn vector_at(&self, position: usize) -> Result<&[f32], VectorError> {
        let dim = self.dimension.get();
        if position >= self.len() {
            return Err(VectorError::PositionOutOfBounds {
                position,
                len: self.len(),
            });
        }
        Ok(&self.data[position * dim..(position + 1) * dim])
    }

    /// Searches for the k most similar vectors to a query.
    ///
    /// Returns (position, similarity) pairs ordered by descending similarity,
    /// ties broken by ascending position. Fewer than k results are returned
    /// when the index holds fewer vectors.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, VectorError> {
        self.search_filtered(query, k, None)
    }

    /// Searches within an optional subset of candidate positions.
    ///
    /// With a filter, similarity is computed only for the listed positions
    /// (pre-filtering, used for per-video search). Positions outside the
    /// index are rejected.
    pub fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&[usize]>,
    ) -> Result<Vec<(usize, f32)>, VectorError> {
        self.dimension.validate_vector(query)?;

        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut normalized = query.to_vec();
        l2_normalize(&mut normalized);

        let mut candidates: Vec<(usize, f32)> = match filter {
            Some(positions) => {
                let mut scored = Vec::with_capacity(positions.len());
                for &position in positions {
                    let vector = self.vector_at(position)?;
                    scored.push((position, inner_product(&normalized, vector)));
                }
                scored
            }
            None => (0..self.len())
                .map(|position| {
                    let dim = self.dimension.get();
                    let vector = &self.data[position * dim..(position + 1) * dim];
                    (position, inner_product(&normalized, vector))
                })
                .collect(),
        };

        // Descending score, ascending position on ties; deterministic by construction
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates.truncate(k);

        Ok(candidates)
    }

    /// Removes the given positions and compacts the index.
    ///
    /// The surviving vectors are materialized in their original relative
    /// order into a fresh index, so the caller's renumbered metadata offsets
    /// line up again. O(len) by design; flat storage has no in-place delete.
    pub fn remove(&self, positions: &[usize]) -> Result<FlatIndex, VectorError> {
        let dim = self.dimension.get();
        let mut doomed = vec![false; self.len()];
        for &position in positions {
            if position >= self.len() {
                return Err(VectorError::PositionOutOfBounds {
                    position,
                    len: self.len(),
                });
            }
            doomed[position] = true;
        }

        let mut survivor = FlatIndex::new(self.dimension);
        for (position, dead) in doomed.iter().enumerate() {
            if !dead {
                survivor
                    .data
                    .extend_from_slice(&self.data[position * dim..(position + 1) * dim]);
            }
        }
        Ok(survivor)
    }

    /// Writes the index artifact to a file atomically (temp-then-rename).
    ///
    /// Layout: magic, format version (u32), dimension (u32), vector count
    /// (u64), then the row-major f32 payload, all little-endian.
    pub fn save(&self, path: &Path) -> Result<(), VectorError> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let tmp = tempfile::NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            writer.write_all(&ARTIFACT_MAGIC)?;
            writer.write_all(&ARTIFACT_VERSION.to_le_bytes())?;
            writer.write_all(&(self.dimension.get() as u32).to_le_bytes())?;
            writer.write_all(&(self.len() as u64).to_le_bytes())?;
            for value in &self.data {
                writer.write_all(&value.to_le_bytes())?;
            }
            writer.flush()?;
        }
        tmp.persist(path).map_err(|e| VectorError::Artifact(e.error))?;
        Ok(())
    }

    /// Loads an index artifact written by [`FlatIndex::save`].
    pub fn load(path: &Path) -> Result<Self, VectorError> {
        let file = std::fs::File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != ARTIFACT_MAGIC {
            return Err(VectorError::BadMagic);
        }

        let mut buf4 = [0u8; 4];
        reader.read_exact(&mut buf4)?;
        let version = u32::from_le_bytes(buf4);
        if version != ARTIFACT_VERSION {
            return Err(VectorError::VersionMismatch {
                expected: ARTIFACT_VERSION,
                actual: version,
            });
        }

        reader.read_exact(&mut buf4)?;
        let dimension = VectorDimension::new(u32::from_le_bytes(buf4) as usize)?;

        let mut buf8 = [0u8; 8];
        reader.read_exact(&mut buf8)?;
        let count = u64::from_le_bytes(buf8) as usize;

        let expected = count * dimension.get() * std::mem::size_of::<f32>();
        let mut payload = Vec::with_capacity(expected);
        reader.read_to_end(&mut payload)?;
        if payload.len() != expected {
            return Err(VectorError::Truncated {
                expected,
                actual: payload.len(),
            });
        }

        let data = payload
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self { dimension, data })
    }
}

/// Scales a vector to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim4() -> VectorDimension {
        VectorDimension::new(4).unwrap()
    }

    fn basis(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; 4];
        v[axis] = 1.0;
        v
    }

    #[test]
    fn add_assigns_contiguous_positions() {
        let mut index = FlatIndex::new(dim4());
        let range = index.add(&[basis(0), basis(1)]).unwrap();
        assert_eq!(range, 0..2);

        let range = index.add(&[basis(2)]).unwrap();
        assert_eq!(range, 2..3);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn add_normalizes_before_storage() {
        let mut index = FlatIndex::new(dim4());
        index.add(&[vec![3.0, 0.0, 4.0, 0.0]]).unwrap();

        let stored = index.vector_at(0).unwrap();
        let magnitude: f32 = stored.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn add_rejects_wrong_dimension() {
        let mut index = FlatIndex::new(dim4());
        assert!(index.add(&[vec![1.0, 0.0]]).is_err());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn search_ranks_exact_match_first_with_score_one() {
        let mut index = FlatIndex::new(dim4());
        index.add(&[basis(0), basis(1), basis(2)]).unwrap();

        let results = index.search(&basis(1), 3).unwrap();
        assert_eq!(results[0].0, 1);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn search_breaks_ties_by_ascending_position() {
        let mut index = FlatIndex::new(dim4());
        // Identical vectors: all score the same against any query
        index.add(&[basis(0), basis(0), basis(0)]).unwrap();

        let results = index.search(&basis(0), 3).unwrap();
        let positions: Vec<usize> = results.iter().map(|r| r.0).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn search_is_deterministic() {
        let mut index = FlatIndex::new(dim4());
        index
            .add(&[basis(0), basis(1), vec![0.5, 0.5, 0.0, 0.0]])
            .unwrap();

        let query = vec![0.9, 0.1, 0.0, 0.0];
        let first = index.search(&query, 3).unwrap();
        let second = index.search(&query, 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn search_returns_at_most_k() {
        let mut index = FlatIndex::new(dim4());
        index.add(&[basis(0), basis(1), basis(2), basis(3)]).unwrap();

        assert_eq!(index.search(&basis(0), 2).unwrap().len(), 2);
        assert_eq!(index.search(&basis(0), 10).unwrap().len(), 4);
        assert!(index.search(&basis(0), 0).unwrap().is_empty());
    }

    #[test]
    fn search_empty_index_is_empty_not_error() {
        let index = FlatIndex::new(dim4());
        assert!(index.search(&basis(0), 5).unwrap().is_empty());
    }

    #[test]
    fn filtered_search_only_scores_candidates() {
        let mut index = FlatIndex::new(dim4());
        index.add(&[basis(0), basis(1), basis(0)]).unwrap();

        // Position 0 is the best global match but is outside the filter
        let results = index
            .search_filtered(&basis(0), 5, Some(&[1, 2]))
            .unwrap();
        let positions: Vec<usize> = results.iter().map(|r| r.0).collect();
        assert_eq!(positions, vec![2, 1]);
    }

    #[test]
    fn remove_compacts_survivors_in_order() {
        let mut index = FlatIndex::new(dim4());
        index
            .add(&[basis(0), basis(1), basis(2), basis(3)])
            .unwrap();

        let rebuilt = index.remove(&[1, 2]).unwrap();
        assert_eq!(rebuilt.len(), 2);
        // Survivors keep their relative order: old 0 -> new 0, old 3 -> new 1
        assert!((rebuilt.vector_at(0).unwrap()[0] - 1.0).abs() < 1e-6);
        assert!((rebuilt.vector_at(1).unwrap()[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn remove_out_of_bounds_is_rejected() {
        let mut index = FlatIndex::new(dim4());
        index.add(&[basis(0)]).unwrap();
        assert!(index.remove(&[5]).is_err());
    }

    #[test]
    fn artifact_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.fsix");

        let mut index = FlatIndex::new(dim4());
        index.add(&[basis(0), vec![0.5, 0.5, 0.5, 0.5]]).unwrap();
        index.save(&path).unwrap();

        let loaded = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension().get(), 4);
        assert_eq!(loaded.vector_at(1).unwrap(), index.vector_at(1).unwrap());
    }

    #[test]
    fn load_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.fsix");
        std::fs::write(&path, b"NOPE0000000000000000").unwrap();

        assert!(matches!(
            FlatIndex::load(&path),
            Err(VectorError::BadMagic)
        ));
    }

    #[test]
    fn load_rejects_truncated_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.fsix");

        let mut index = FlatIndex::new(dim4());
        index.add(&[basis(0), basis(1)]).unwrap();
        index.save(&path).unwrap();

        // Chop off the tail of the payload
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

        assert!(matches!(
            FlatIndex::load(&path),
            Err(VectorError::Truncated { .. })
        ));
    }
}
