//! Persisted preview frames.
//!
//! Each indexed frame is written as a JPEG under `frames/{video_id}/` so
//! search results can show what matched without re-decoding the video. The
//! file name encodes the sample ordinal and grid timestamp:
//! `{video_id}_frame_{k:06}_t{timestamp:.2}.jpg`.

use crate::error::{IndexError, IndexResult};
use crate::video::sampler::SampledFrame;
use image::codecs::jpeg::JpegEncoder;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name for the k-th sampled frame of a video.
#[must_use]
pub fn frame_file_name(video_id: &str, ordinal: usize, timestamp: f64) -> String {
    format!("{video_id}_frame_{ordinal:06}_t{timestamp:.2}.jpg")
}

/// Directory holding a video's preview frames.
#[must_use]
pub fn video_frames_dir(frames_dir: &Path, video_id: &str) -> PathBuf {
    frames_dir.join(video_id)
}

/// Encodes a sampled frame as a JPEG and writes it under the video's
/// frame directory. Returns the written path.
pub fn save_frame(
    frames_dir: &Path,
    video_id: &str,
    ordinal: usize,
    frame: &SampledFrame,
    jpeg_quality: u8,
) -> IndexResult<PathBuf> {
    let dir = video_frames_dir(frames_dir, video_id);
    std::fs::create_dir_all(&dir).map_err(|source| IndexError::Storage {
        path: dir.clone(),
        source,
    })?;

    let path = dir.join(frame_file_name(video_id, ordinal, frame.timestamp));
    let file = File::create(&path).map_err(|source| IndexError::Storage {
        path: path.clone(),
        source,
    })?;

    let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), jpeg_quality);
    encoder
        .encode(
            &frame.rgb,
            frame.width,
            frame.height,
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| IndexError::Storage {
            path: path.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;

    Ok(path)
}

/// Deletes a video's frame directory. Missing directory is not an error.
pub fn remove_video_frames(frames_dir: &Path, video_id: &str) -> IndexResult<()> {
    let dir = video_frames_dir(frames_dir, video_id);
    match std::fs::remove_dir_all(&dir) {
        Ok(()) => {
            debug!(video_id, "Removed preview frames");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(IndexError::Storage { path: dir, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(timestamp: f64) -> SampledFrame {
        SampledFrame {
            timestamp,
            width: 8,
            height: 8,
            rgb: vec![128; 8 * 8 * 3],
        }
    }

    #[test]
    fn frame_file_names_are_stable() {
        assert_eq!(
            frame_file_name("vacation", 3, 3.0),
            "vacation_frame_000003_t3.00.jpg"
        );
        assert_eq!(
            frame_file_name("clip", 0, 0.5),
            "clip_frame_000000_t0.50.jpg"
        );
    }

    #[test]
    fn save_writes_a_decodable_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_frame(dir.path(), "vid", 0, &solid_frame(0.0), 95).unwrap();

        assert!(path.starts_with(dir.path().join("vid")));
        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.height(), 8);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        save_frame(dir.path(), "vid", 0, &solid_frame(0.0), 95).unwrap();

        remove_video_frames(dir.path(), "vid").unwrap();
        assert!(!dir.path().join("vid").exists());

        // Second removal of a missing directory succeeds
        remove_video_frames(dir.path(), "vid").unwrap();
    }
}
