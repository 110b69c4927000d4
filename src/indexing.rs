//! The indexing pipeline: ingest, search, and deletion over the index pair.
//!
//! [`VideoIndexer`] owns the in-memory index pair (vector index + metadata
//! store) and applies every mutation as a transaction: build the next state
//! on the side, persist it, then swap it in. A failed ingest or deletion
//! leaves both the in-memory state and the on-disk pair exactly as they
//! were.
//!
//! [`VideoIndexService`] wraps the indexer for shared use: writes are
//! serialized behind a write lock while searches proceed concurrently.

use crate::config::Settings;
use crate::embedding::EmbeddingEncoder;
use crate::error::{IndexError, IndexResult};
use crate::store::{self, FrameRecord, MetadataStore, StoreManifest};
use crate::vector::{FlatIndex, Score};
use crate::video::{self, ClipRef, FrameSource};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub video_id: String,
    pub frames_extracted: usize,
    pub embeddings_added: usize,
}

/// Outcome of a deletion. `removed_count` is zero when the video was not
/// indexed (deletion is idempotent).
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub video_id: String,
    pub removed_count: usize,
}

/// One ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub video_id: String,
    /// Seconds from the start of the source video
    pub timestamp: f64,
    /// Cosine similarity in [-1.0, 1.0]
    pub score: f32,
    pub frame_path: PathBuf,
    pub video_path: PathBuf,
    /// Filled in by [`VideoIndexer::materialize_clips`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip: Option<ClipRef>,
}

/// Current shape of the index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub video_count: usize,
    pub frame_count: usize,
    pub dimension: usize,
    pub generation: u64,
    pub model_name: String,
}

/// Owns the index pair and runs the ingest/search/delete pipeline.
pub struct VideoIndexer {
    settings: Arc<Settings>,
    encoder: Arc<dyn EmbeddingEncoder>,
    sampler: Box<dyn FrameSource>,
    index: FlatIndex,
    metadata: MetadataStore,
    manifest: StoreManifest,
}

impl VideoIndexer {
    /// Opens the index at the configured data directory, loading the
    /// committed pair if one exists.
    pub fn open(
        settings: Arc<Settings>,
        encoder: Arc<dyn EmbeddingEncoder>,
        sampler: Box<dyn FrameSource>,
    ) -> IndexResult<Self> {
        let index_dir = settings.index_dir();

        let (index, metadata, manifest) = if store::pair_exists(&index_dir) {
            let (index, metadata, manifest) = store::load_pair(&index_dir)?;
            if manifest.model_name != encoder.model_name() {
                return Err(IndexError::Corrupted {
                    reason: format!(
                        "index was built with model '{}' but the encoder is '{}'",
                        manifest.model_name,
                        encoder.model_name()
                    ),
                });
            }
            if manifest.dimension != encoder.dimension().get() {
                return Err(IndexError::Corrupted {
                    reason: format!(
                        "index dimension {} does not match encoder dimension {}",
                        manifest.dimension,
                        encoder.dimension().get()
                    ),
                });
            }
            (index, metadata, manifest)
        } else {
            (
                FlatIndex::new(encoder.dimension()),
                MetadataStore::new(),
                StoreManifest::new(encoder.dimension(), encoder.model_name()),
            )
        };

        Ok(Self {
            settings,
            encoder,
            sampler,
            index,
            metadata,
            manifest,
        })
    }

    /// Samples, encodes, and indexes one video.
    ///
    /// The video id is the file stem. Re-ingesting an indexed id is rejected;
    /// delete it first. On any failure the index pair is untouched and the
    /// frames written for this video are cleaned up.
    pub fn ingest(&mut self, video_path: &Path) -> IndexResult<IngestReport> {
        let video_id = video_id_for(video_path)?;
        if self.metadata.contains_video(&video_id) {
            return Err(IndexError::DuplicateVideo { video_id });
        }

        info!(video_id, path = %video_path.display(), "Ingesting video");

        match self.ingest_inner(&video_id, video_path) {
            Ok(report) => Ok(report),
            Err(e) => {
                // Roll back the preview frames; the pair was never swapped
                if let Err(cleanup) =
                    video::remove_video_frames(&self.settings.frames_dir(), &video_id)
                {
                    warn!(video_id, error = %cleanup, "Frame cleanup after failed ingest");
                }
                Err(e)
            }
        }
    }

    fn ingest_inner(&mut self, video_id: &str, video_path: &Path) -> IndexResult<IngestReport> {
        let sampling = &self.settings.sampling;
        let frames_dir = self.settings.frames_dir();

        let stream = self.sampler.sample(
            video_path,
            sampling.interval_secs,
            sampling.frame_width,
            sampling.frame_height,
        )?;

        // Persist each frame as it is decoded; only paths and timestamps
        // stay in memory
        let mut frame_paths = Vec::new();
        let mut timestamps = Vec::new();
        for (ordinal, frame) in stream.enumerate() {
            let frame = frame?;
            let path = video::save_frame(
                &frames_dir,
                video_id,
                ordinal,
                &frame,
                sampling.jpeg_quality,
            )?;
            timestamps.push(frame.timestamp);
            frame_paths.push(path);
        }

        if frame_paths.is_empty() {
            return Err(IndexError::UnreadableVideo {
                path: video_path.to_path_buf(),
                reason: "no frames could be sampled".into(),
            });
        }

        let embeddings = self.encoder.encode_images(&frame_paths)?;

        // Build the next state on the side, then commit and swap
        let mut next_index = self.index.clone();
        let range = next_index.add(&embeddings)?;
        debug_assert_eq!(range.start, self.metadata.len());

        let mut next_metadata = self.metadata.clone();
        next_metadata.append(frame_paths.iter().zip(&timestamps).map(
            |(frame_path, &timestamp)| FrameRecord {
                video_id: video_id.to_string(),
                timestamp,
                frame_path: frame_path.clone(),
                video_path: video_path.to_path_buf(),
                index_position: 0, // assigned by append
            },
        ));

        let mut next_manifest = self.manifest.clone();
        store::save_pair(
            &self.settings.index_dir(),
            &next_index,
            &next_metadata,
            &mut next_manifest,
        )?;

        self.index = next_index;
        self.metadata = next_metadata;
        self.manifest = next_manifest;

        info!(
            video_id,
            frames = frame_paths.len(),
            total = self.metadata.len(),
            "Video indexed"
        );

        Ok(IngestReport {
            video_id: video_id.to_string(),
            frames_extracted: frame_paths.len(),
            embeddings_added: embeddings.len(),
        })
    }

    /// Searches for frames matching a natural-language query.
    ///
    /// With `video_filter`, only that video's frames are scored; an unknown
    /// id is an error rather than a silently empty result.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        video_filter: Option<&str>,
    ) -> IndexResult<Vec<SearchResult>> {
        // Resolve the filter before the empty-index shortcut so an unknown
        // id is reported even when nothing is indexed
        let filter_positions = match video_filter {
            Some(video_id) => {
                let positions = self.metadata.positions_for_video(video_id);
                if positions.is_empty() {
                    return Err(IndexError::VideoNotFound {
                        video_id: video_id.to_string(),
                    });
                }
                Some(positions)
            }
            None => None,
        };

        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.encoder.encode_text(query)?;
        let hits = self
            .index
            .search_filtered(&query_vector, top_k, filter_positions.as_deref())?;

        let mut results = Vec::with_capacity(hits.len());
        for (position, raw_score) in hits {
            let Some(record) = self.metadata.get(position) else {
                // Should be unreachable given the pair invariant; drop the
                // hit rather than failing the whole search
                warn!(
                    position,
                    store_len = self.metadata.len(),
                    "Search hit has no metadata record"
                );
                continue;
            };
            let score = Score::new(raw_score)?;
            results.push(SearchResult {
                video_id: record.video_id.clone(),
                timestamp: record.timestamp,
                score: score.get(),
                frame_path: record.frame_path.clone(),
                video_path: record.video_path.clone(),
                clip: None,
            });
        }
        Ok(results)
    }

    /// Removes a video's vectors, records, and preview frames.
    ///
    /// Unknown ids are a no-op reported as zero removals.
    pub fn delete_video(&mut self, video_id: &str) -> IndexResult<DeleteReport> {
        let positions = self.metadata.positions_for_video(video_id);
        if positions.is_empty() {
            return Ok(DeleteReport {
                video_id: video_id.to_string(),
                removed_count: 0,
            });
        }

        let next_index = self.index.remove(&positions)?;
        let mut next_metadata = self.metadata.clone();
        let removed = next_metadata.remove_video(video_id);

        let mut next_manifest = self.manifest.clone();
        store::save_pair(
            &self.settings.index_dir(),
            &next_index,
            &next_metadata,
            &mut next_manifest,
        )?;

        self.index = next_index;
        self.metadata = next_metadata;
        self.manifest = next_manifest;

        // Preview frames go last; the pair is already committed, so a
        // cleanup failure must not turn a successful deletion into an error
        if let Err(cleanup) = video::remove_video_frames(&self.settings.frames_dir(), video_id)
        {
            warn!(video_id, error = %cleanup, "Frame cleanup after committed delete");
        }

        info!(video_id, removed = removed.len(), "Video deleted");
        Ok(DeleteReport {
            video_id: video_id.to_string(),
            removed_count: removed.len(),
        })
    }

    /// Cuts a preview clip for each result, centered on its timestamp.
    ///
    /// Failures degrade to a [`ClipRef::FullVideo`] reference per result
    /// instead of failing the batch.
    pub fn materialize_clips(&self, results: &mut [SearchResult]) -> IndexResult<()> {
        let clips_dir = self.settings.results_dir().join("clips");
        let clip_secs = self.settings.search.clip_secs;

        for result in results.iter_mut() {
            let duration = match self.sampler.probe(&result.video_path) {
                Ok(info) if info.duration_secs > 0.0 => info.duration_secs,
                _ => f64::INFINITY,
            };
            let (start, end) = video::clip_window(result.timestamp, clip_secs, duration);
            let dest = clips_dir.join(format!(
                "{}_t{:.2}.mp4",
                result.video_id, result.timestamp
            ));
            result.clip = Some(video::extract_clip_or_fallback(
                &result.video_path,
                start,
                end,
                &dest,
            ));
        }
        Ok(())
    }

    /// Copies each result's preview frame into a directory, prefixed by rank.
    pub fn save_result_frames(
        &self,
        results: &[SearchResult],
        dest_dir: &Path,
    ) -> IndexResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dest_dir).map_err(|source| IndexError::Storage {
            path: dest_dir.to_path_buf(),
            source,
        })?;

        let mut copied = Vec::with_capacity(results.len());
        for (rank, result) in results.iter().enumerate() {
            let name = result
                .frame_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{}_t{:.2}.jpg", result.video_id, result.timestamp));
            let dest = dest_dir.join(format!("{:02}_{name}", rank + 1));
            std::fs::copy(&result.frame_path, &dest).map_err(|source| IndexError::Storage {
                path: dest.clone(),
                source,
            })?;
            copied.push(dest);
        }
        Ok(copied)
    }

    /// Reports the current shape of the index.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            video_count: self.metadata.video_ids().len(),
            frame_count: self.metadata.len(),
            dimension: self.index.dimension().get(),
            generation: self.manifest.generation,
            model_name: self.manifest.model_name.clone(),
        }
    }

    /// Distinct indexed video ids, in first-ingested order.
    #[must_use]
    pub fn video_ids(&self) -> Vec<String> {
        self.metadata.video_ids()
    }

    /// Settings this indexer was opened with.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

fn video_id_for(path: &Path) -> IndexResult<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| IndexError::UnreadableVideo {
            path: path.to_path_buf(),
            reason: "path has no file name to derive a video id from".into(),
        })
}

/// Shared handle over a [`VideoIndexer`].
///
/// Ingest and deletion take the write lock, so writers are serialized.
/// Searches take the read lock and run concurrently; because mutations swap
/// in a fully built state, a search sees either the old index or the new
/// one, never a half-applied update.
pub struct VideoIndexService {
    inner: RwLock<VideoIndexer>,
}

impl VideoIndexService {
    #[must_use]
    pub fn new(indexer: VideoIndexer) -> Self {
        Self {
            inner: RwLock::new(indexer),
        }
    }

    pub fn ingest(&self, video_path: &Path) -> IndexResult<IngestReport> {
        self.inner.write().ingest(video_path)
    }

    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        video_filter: Option<&str>,
    ) -> IndexResult<Vec<SearchResult>> {
        self.inner.read().search(query, top_k, video_filter)
    }

    pub fn delete_video(&self, video_id: &str) -> IndexResult<DeleteReport> {
        self.inner.write().delete_video(video_id)
    }

    pub fn materialize_clips(&self, results: &mut [SearchResult]) -> IndexResult<()> {
        self.inner.read().materialize_clips(results)
    }

    pub fn stats(&self) -> IndexStats {
        self.inner.read().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEncoder;
    use crate::vector::VectorDimension;
    use crate::video::{SampledFrame, VideoInfo};
    use std::collections::HashMap;

    /// Synthetic frame source: every video is `duration_secs` long and
    /// yields a deterministic frame per interval boundary. Paths containing
    /// "broken" fail to open.
    struct FakeSource {
        durations: HashMap<String, f64>,
    }

    impl FakeSource {
        fn new(durations: &[(&str, f64)]) -> Self {
            Self {
                durations: durations
                    .iter()
                    .map(|(id, d)| (id.to_string(), *d))
                    .collect(),
            }
        }

        fn duration_of(&self, path: &Path) -> IndexResult<f64> {
            let id = video_id_for(path)?;
            if id.contains("broken") {
                return Err(IndexError::UnreadableVideo {
                    path: path.to_path_buf(),
                    reason: "synthetic failure".into(),
                });
            }
            Ok(self.durations.get(&id).copied().unwrap_or(3.0))
        }
    }

    impl FrameSource for FakeSource {
        fn probe(&self, path: &Path) -> IndexResult<VideoInfo> {
            Ok(VideoInfo {
                duration_secs: self.duration_of(path)?,
                fps: 30.0,
                width: 640,
                height: 480,
            })
        }

        fn sample(
            &self,
            path: &Path,
            interval_secs: f64,
            width: u32,
            height: u32,
        ) -> IndexResult<Box<dyn Iterator<Item = IndexResult<SampledFrame>>>> {
            let duration = self.duration_of(path)?;
            // Grid boundaries strictly inside the duration
            let count = (duration / interval_secs).ceil() as usize;
            let frames: Vec<IndexResult<SampledFrame>> = (0..count)
                .map(|k| {
                    Ok(SampledFrame {
                        timestamp: k as f64 * interval_secs,
                        width,
                        height,
                        rgb: vec![(k % 256) as u8; (width * height * 3) as usize],
                    })
                })
                .collect();
            Ok(Box::new(frames.into_iter()))
        }
    }

    fn test_settings(dir: &Path) -> Arc<Settings> {
        let mut settings = Settings::default();
        settings.data_dir = dir.to_path_buf();
        settings.sampling.frame_width = 8;
        settings.sampling.frame_height = 8;
        Arc::new(settings)
    }

    fn open_indexer(dir: &Path, durations: &[(&str, f64)]) -> VideoIndexer {
        let settings = test_settings(dir);
        let encoder = Arc::new(MockEncoder::new(VectorDimension::new(16).unwrap()));
        VideoIndexer::open(settings, encoder, Box::new(FakeSource::new(durations))).unwrap()
    }

    #[test]
    fn ingest_samples_on_the_interval_grid() {
        let dir = tempfile::tempdir().unwrap();
        // 9.5s at 1s intervals: boundaries 0..=9
        let mut indexer = open_indexer(dir.path(), &[("beach", 9.5)]);

        let report = indexer.ingest(Path::new("beach.mp4")).unwrap();
        assert_eq!(report.video_id, "beach");
        assert_eq!(report.frames_extracted, 10);
        assert_eq!(report.embeddings_added, 10);

        let stats = indexer.stats();
        assert_eq!(stats.frame_count, 10);
        assert_eq!(stats.video_count, 1);
        assert_eq!(stats.generation, 1);

        // Timestamps are the exact grid, positions are offsets
        for (k, record) in (0..10).zip(indexer.metadata.all()) {
            assert_eq!(record.timestamp, k as f64);
            assert_eq!(record.index_position, k);
            assert!(record.frame_path.exists());
        }
    }

    #[test]
    fn reingest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = open_indexer(dir.path(), &[("beach", 3.5)]);
        indexer.ingest(Path::new("beach.mp4")).unwrap();

        let err = indexer.ingest(Path::new("beach.mp4")).unwrap_err();
        assert_eq!(err.status_code(), "DUPLICATE_VIDEO");
        assert_eq!(indexer.stats().frame_count, 4);
    }

    #[test]
    fn failed_ingest_leaves_prior_state_intact() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = open_indexer(dir.path(), &[("ok", 3.5)]);
        indexer.ingest(Path::new("ok.mp4")).unwrap();

        let err = indexer.ingest(Path::new("broken.mp4")).unwrap_err();
        assert_eq!(err.status_code(), "UNREADABLE_VIDEO");

        let stats = indexer.stats();
        assert_eq!(stats.video_count, 1);
        assert_eq!(stats.frame_count, 4);
        assert_eq!(stats.generation, 1);
        assert!(!dir.path().join("frames/broken").exists());
    }

    #[test]
    fn search_ranks_by_similarity_and_respects_top_k() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = open_indexer(dir.path(), &[("beach", 5.0)]);
        indexer.ingest(Path::new("beach.mp4")).unwrap();

        // The mock encoder collides a query with a frame's file name
        let target = "beach_frame_000002_t2.00.jpg";
        let results = indexer.search(target, 3, None).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].timestamp, 2.0);
        assert!((results[0].score - 1.0).abs() < 1e-5);

        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn search_on_empty_index_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = open_indexer(dir.path(), &[]);
        assert!(indexer.search("anything", 10, None).unwrap().is_empty());
    }

    #[test]
    fn search_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = open_indexer(dir.path(), &[("beach", 5.0)]);
        indexer.ingest(Path::new("beach.mp4")).unwrap();

        let a = indexer.search("sunset over water", 5, None).unwrap();
        let b = indexer.search("sunset over water", 5, None).unwrap();
        let key = |rs: &[SearchResult]| -> Vec<(String, u64)> {
            rs.iter()
                .map(|r| (r.video_id.clone(), r.timestamp.to_bits()))
                .collect()
        };
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn video_filter_restricts_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = open_indexer(dir.path(), &[("beach", 4.0), ("city", 4.0)]);
        indexer.ingest(Path::new("beach.mp4")).unwrap();
        indexer.ingest(Path::new("city.mp4")).unwrap();

        let results = indexer.search("traffic at night", 10, Some("city")).unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.video_id == "city"));
    }

    #[test]
    fn filtering_on_unknown_video_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = open_indexer(dir.path(), &[("beach", 4.0)]);
        indexer.ingest(Path::new("beach.mp4")).unwrap();

        let err = indexer.search("anything", 5, Some("missing")).unwrap_err();
        assert_eq!(err.status_code(), "VIDEO_NOT_FOUND");
    }

    #[test]
    fn filtering_on_unknown_video_errors_even_when_index_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = open_indexer(dir.path(), &[]);

        let err = indexer.search("anything", 5, Some("missing")).unwrap_err();
        assert_eq!(err.status_code(), "VIDEO_NOT_FOUND");
    }

    #[test]
    fn unjoinable_hit_is_dropped_and_remaining_rows_returned() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = open_indexer(dir.path(), &[("beach", 5.0)]);
        indexer.ingest(Path::new("beach.mp4")).unwrap();

        // Force a vector with no metadata record; the query below matches it
        // exactly, so it would rank first if the join were not enforced
        let query = "stray vector with no record";
        let orphan = indexer.encoder.encode_text(query).unwrap();
        indexer.index.add(&[orphan]).unwrap();

        let results = indexer.search(query, 10, None).unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.video_id == "beach"));
    }

    #[test]
    fn delete_compacts_positions_and_drops_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = open_indexer(dir.path(), &[("beach", 5.0), ("city", 5.0)]);
        indexer.ingest(Path::new("beach.mp4")).unwrap();
        indexer.ingest(Path::new("city.mp4")).unwrap();
        assert_eq!(indexer.stats().frame_count, 10);

        let report = indexer.delete_video("beach").unwrap();
        assert_eq!(report.removed_count, 5);

        let stats = indexer.stats();
        assert_eq!(stats.frame_count, 5);
        assert_eq!(stats.video_count, 1);

        for (offset, record) in indexer.metadata.all().iter().enumerate() {
            assert_eq!(record.index_position, offset);
            assert_eq!(record.video_id, "city");
        }
        assert!(!dir.path().join("frames/beach").exists());
        assert!(dir.path().join("frames/city").exists());

        // Deleted content never comes back in search
        let results = indexer.search("sand dunes", 10, None).unwrap();
        assert!(results.iter().all(|r| r.video_id == "city"));
    }

    #[test]
    fn delete_still_succeeds_when_frame_cleanup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = open_indexer(dir.path(), &[("beach", 5.0)]);
        indexer.ingest(Path::new("beach.mp4")).unwrap();

        // Replace the frame directory with a plain file so cleanup cannot
        // remove it
        let frames = dir.path().join("frames/beach");
        std::fs::remove_dir_all(&frames).unwrap();
        std::fs::write(&frames, b"in the way").unwrap();

        let report = indexer.delete_video("beach").unwrap();
        assert_eq!(report.removed_count, 5);
        assert_eq!(indexer.stats().frame_count, 0);

        // The deletion committed, so a retry is the documented no-op
        assert_eq!(indexer.delete_video("beach").unwrap().removed_count, 0);
    }

    #[test]
    fn deleting_unknown_video_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = open_indexer(dir.path(), &[("beach", 5.0)]);
        indexer.ingest(Path::new("beach.mp4")).unwrap();

        let report = indexer.delete_video("missing").unwrap();
        assert_eq!(report.removed_count, 0);
        assert_eq!(indexer.stats().frame_count, 5);
    }

    #[test]
    fn index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut indexer = open_indexer(dir.path(), &[("beach", 5.0)]);
            indexer.ingest(Path::new("beach.mp4")).unwrap();
        }

        let reopened = open_indexer(dir.path(), &[("beach", 5.0)]);
        let stats = reopened.stats();
        assert_eq!(stats.frame_count, 5);
        assert_eq!(stats.generation, 1);

        let target = "beach_frame_000002_t2.00.jpg";
        let results = reopened.search(target, 1, None).unwrap();
        assert_eq!(results[0].timestamp, 2.0);
    }

    #[test]
    fn result_frames_are_copied_in_rank_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = open_indexer(dir.path(), &[("beach", 3.0)]);
        indexer.ingest(Path::new("beach.mp4")).unwrap();

        let results = indexer.search("waves", 2, None).unwrap();
        let dest = dir.path().join("out");
        let copied = indexer.save_result_frames(&results, &dest).unwrap();

        assert_eq!(copied.len(), 2);
        assert!(copied[0].file_name().unwrap().to_string_lossy().starts_with("01_"));
        assert!(copied.iter().all(|p| p.exists()));
    }

    #[test]
    fn service_serializes_writes_and_shares_reads() {
        let dir = tempfile::tempdir().unwrap();
        let service = VideoIndexService::new(open_indexer(dir.path(), &[("beach", 3.0)]));

        service.ingest(Path::new("beach.mp4")).unwrap();
        let results = service.search("waves", 2, None).unwrap();
        assert_eq!(results.len(), 2);

        service.delete_video("beach").unwrap();
        assert_eq!(service.stats().frame_count, 0);
    }
}
