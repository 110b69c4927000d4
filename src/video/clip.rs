//! Preview clip extraction around search hits.
//!
//! Clips are cut by remuxing: packets are stream-copied from the source
//! container into a new one with timestamps shifted to start at zero, so no
//! re-encoding happens. The cut lands on packet boundaries, which is close
//! enough for previews and keeps extraction fast.
//!
//! Extraction failure is non-fatal: a result degrades to pointing at the
//! full source video with a start offset instead.

use crate::error::{IndexError, IndexResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use ffmpeg_next as ffmpeg;

/// Where a result's preview clip can be watched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClipRef {
    /// A materialized clip file covering the window around the hit
    Saved { path: PathBuf },
    /// Extraction failed; watch the full video from this offset instead
    FullVideo { path: PathBuf, start_offset: f64 },
}

/// Computes the clip window centered on a hit, clamped to the video bounds.
///
/// The window is `clip_secs` long when it fits; near the edges it shrinks
/// rather than shifting, matching what a viewer expects to see.
#[must_use]
pub fn clip_window(timestamp: f64, clip_secs: f64, duration_secs: f64) -> (f64, f64) {
    let half = clip_secs / 2.0;
    let start = (timestamp - half).max(0.0);
    let end = (timestamp + half).min(duration_secs.max(0.0));
    (start, end.max(start))
}

/// Cuts `[start_secs, end_secs)` out of a video into `dest` by stream copy.
pub fn extract_clip(
    src: &Path,
    start_secs: f64,
    end_secs: f64,
    dest: &Path,
) -> IndexResult<()> {
    ffmpeg::init().ok();

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|source| IndexError::Storage {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let unreadable = |reason: String| IndexError::UnreadableVideo {
        path: src.to_path_buf(),
        reason,
    };

    let mut ictx = ffmpeg::format::input(&src).map_err(|e| unreadable(e.to_string()))?;
    let mut octx =
        ffmpeg::format::output(&dest).map_err(|e| unreadable(format!("open output: {e}")))?;

    // Seek to the nearest keyframe at or before the window start
    let seek_target = (start_secs * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
    ictx.seek(seek_target, ..seek_target)
        .map_err(|e| unreadable(format!("seek: {e}")))?;

    let mut stream_mapping: Vec<isize> = vec![0; ictx.nb_streams() as usize];
    let mut input_time_bases = vec![ffmpeg::Rational(0, 1); ictx.nb_streams() as usize];
    let mut output_index: isize = 0;
    for (input_index, stream) in ictx.streams().enumerate() {
        let medium = stream.parameters().medium();
        if medium != ffmpeg::media::Type::Video
            && medium != ffmpeg::media::Type::Audio
            && medium != ffmpeg::media::Type::Subtitle
        {
            stream_mapping[input_index] = -1;
            continue;
        }
        stream_mapping[input_index] = output_index;
        input_time_bases[input_index] = stream.time_base();
        output_index += 1;

        let mut out_stream = octx
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| unreadable(format!("add stream: {e}")))?;
        out_stream.set_parameters(stream.parameters());
        // Container changes invalidate the source codec tag
        unsafe {
            (*out_stream.parameters().as_mut_ptr()).codec_tag = 0;
        }
    }

    octx.write_header()
        .map_err(|e| unreadable(format!("write header: {e}")))?;

    for (stream, mut packet) in ictx.packets() {
        let input_index = stream.index();
        let out_index = stream_mapping[input_index];
        if out_index < 0 {
            continue;
        }

        let time_base = input_time_bases[input_index];
        let packet_secs = packet.pts().unwrap_or(0) as f64 * f64::from(time_base);
        if packet_secs >= end_secs {
            break;
        }

        // Shift timestamps so the clip starts at zero
        let start_ticks = if f64::from(time_base) > 0.0 {
            (start_secs / f64::from(time_base)) as i64
        } else {
            0
        };
        if let Some(pts) = packet.pts() {
            packet.set_pts(Some(pts - start_ticks));
        }
        if let Some(dts) = packet.dts() {
            packet.set_dts(Some(dts - start_ticks));
        }

        let out_time_base = octx
            .stream(out_index as usize)
            .map(|s| s.time_base())
            .unwrap_or(time_base);
        packet.rescale_ts(time_base, out_time_base);
        packet.set_position(-1);
        packet.set_stream(out_index as usize);
        packet
            .write_interleaved(&mut octx)
            .map_err(|e| unreadable(format!("write packet: {e}")))?;
    }

    octx.write_trailer()
        .map_err(|e| unreadable(format!("write trailer: {e}")))?;
    Ok(())
}

/// Extracts a clip, degrading to a full-video reference on failure.
pub fn extract_clip_or_fallback(
    src: &Path,
    start_secs: f64,
    end_secs: f64,
    dest: &Path,
) -> ClipRef {
    match extract_clip(src, start_secs, end_secs, dest) {
        Ok(()) => ClipRef::Saved {
            path: dest.to_path_buf(),
        },
        Err(e) => {
            warn!(
                video = %src.display(),
                error = %e,
                "Clip extraction failed, falling back to full video"
            );
            ClipRef::FullVideo {
                path: src.to_path_buf(),
                start_offset: start_secs,
            }
        }
    }
}
