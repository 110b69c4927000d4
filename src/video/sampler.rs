//! Frame sampling from video files.
//!
//! Sampling walks the decode timeline and emits one frame per interval
//! boundary: for an interval of I seconds, the frame emitted for boundary k
//! is the first decoded frame whose presentation time reaches k*I, and its
//! recorded timestamp is exactly k*I. Recorded timestamps are therefore a
//! clean arithmetic grid regardless of the container's real frame times.
//!
//! Decoding is lazy: [`FrameStream`] pulls packets on demand so a long video
//! never has all of its frames resident at once.

use crate::error::{IndexError, IndexResult};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

/// Probed properties of a video file.
#[derive(Debug, Clone, Copy)]
pub struct VideoInfo {
    /// Duration in seconds (0.0 when the container does not report one)
    pub duration_secs: f64,
    /// Average frame rate of the video stream
    pub fps: f64,
    /// Source width in pixels
    pub width: u32,
    /// Source height in pixels
    pub height: u32,
}

/// A decoded frame scaled to the target size.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Grid timestamp (k * interval), in seconds
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGB24 pixels, row-major
    pub rgb: Vec<u8>,
}

/// Source of sampled frames; the seam that lets the indexer run in tests
/// without ffmpeg or real video files.
pub trait FrameSource: Send + Sync {
    /// Probes a video file for its basic properties.
    fn probe(&self, path: &Path) -> IndexResult<VideoInfo>;

    /// Opens a lazy stream of sampled frames at the given interval and size.
    fn sample(
        &self,
        path: &Path,
        interval_secs: f64,
        width: u32,
        height: u32,
    ) -> IndexResult<Box<dyn Iterator<Item = IndexResult<SampledFrame>>>>;
}

/// ffmpeg-backed frame source. Holds no state; each call opens its own
/// demux/decode context.
pub struct FfmpegSampler;

impl FfmpegSampler {
    pub fn new() -> Self {
        // Safe to call repeatedly
        ffmpeg::init().ok();
        Self
    }
}

impl Default for FfmpegSampler {
    fn default() -> Self {
        Self::new()
    }
}

fn unreadable(path: &Path, reason: impl Into<String>) -> IndexError {
    IndexError::UnreadableVideo {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn open_input(path: &Path) -> IndexResult<ffmpeg::format::context::Input> {
    if !path.exists() {
        return Err(unreadable(path, "file does not exist"));
    }
    ffmpeg::format::input(&path).map_err(|e| unreadable(path, e.to_string()))
}

fn probe_input(path: &Path, ictx: &ffmpeg::format::context::Input) -> IndexResult<(usize, f64, VideoInfo)> {
    let stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| unreadable(path, "no video stream found"))?;

    let stream_index = stream.index();
    let time_base = f64::from(stream.time_base());
    let fps = f64::from(stream.avg_frame_rate());

    let duration_secs = if stream.duration() > 0 {
        stream.duration() as f64 * time_base
    } else if ictx.duration() > 0 {
        // Container duration is in AV_TIME_BASE units (microseconds)
        ictx.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
    } else {
        0.0
    };

    let params = stream.parameters();
    let decoder = ffmpeg::codec::context::Context::from_parameters(params)
        .map_err(|e| unreadable(path, format!("codec parameters: {e}")))?
        .decoder()
        .video()
        .map_err(|e| unreadable(path, format!("no video decoder: {e}")))?;

    let info = VideoInfo {
        duration_secs,
        fps,
        width: decoder.width(),
        height: decoder.height(),
    };
    Ok((stream_index, time_base, info))
}

impl FrameSource for FfmpegSampler {
    fn probe(&self, path: &Path) -> IndexResult<VideoInfo> {
        let ictx = open_input(path)?;
        let (_, _, info) = probe_input(path, &ictx)?;
        Ok(info)
    }

    fn sample(
        &self,
        path: &Path,
        interval_secs: f64,
        width: u32,
        height: u32,
    ) -> IndexResult<Box<dyn Iterator<Item = IndexResult<SampledFrame>>>> {
        let stream = FrameStream::open(path, interval_secs, width, height)?;
        Ok(Box::new(stream))
    }
}

/// Lazy iterator over sampled frames.
///
/// Pulls packets from the demuxer on demand and yields at most one frame per
/// grid boundary within the video duration. Yields an error item and stops if
/// decoding fails mid-stream.
pub struct FrameStream {
    path: PathBuf,
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: Option<ffmpeg::software::scaling::Context>,
    stream_index: usize,
    time_base: f64,
    interval_secs: f64,
    duration_secs: f64,
    out_width: u32,
    out_height: u32,
    /// Next grid boundary to fill (timestamp = next_boundary * interval)
    next_boundary: u64,
    pending: VecDeque<SampledFrame>,
    eof_sent: bool,
    finished: bool,
}

impl FrameStream {
    /// Opens a video and prepares a sampling stream over it.
    pub fn open(
        path: &Path,
        interval_secs: f64,
        width: u32,
        height: u32,
    ) -> IndexResult<Self> {
        let ictx = open_input(path)?;
        let (stream_index, time_base, info) = probe_input(path, &ictx)?;

        let stream = ictx
            .stream(stream_index)
            .ok_or_else(|| unreadable(path, "video stream disappeared"))?;
        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| unreadable(path, format!("codec parameters: {e}")))?
            .decoder()
            .video()
            .map_err(|e| unreadable(path, format!("no video decoder: {e}")))?;

        // Unknown duration: sample until EOF instead of cutting off at zero
        let duration_secs = if info.duration_secs > 0.0 {
            info.duration_secs
        } else {
            f64::INFINITY
        };

        Ok(Self {
            path: path.to_path_buf(),
            ictx,
            decoder,
            scaler: None,
            stream_index,
            time_base,
            interval_secs,
            duration_secs,
            out_width: width,
            out_height: height,
            next_boundary: 0,
            pending: VecDeque::new(),
            eof_sent: false,
            finished: false,
        })
    }

    fn next_target(&self) -> f64 {
        self.next_boundary as f64 * self.interval_secs
    }

    fn consider(&mut self, frame: &ffmpeg::util::frame::video::Video) -> IndexResult<()> {
        let pts_secs = frame.pts().unwrap_or(0).max(0) as f64 * self.time_base;

        // A boundary at exactly the duration belongs to the dropped partial
        // interval; small slack so a frame timed a hair under the boundary
        // still counts
        while self.next_target() < self.duration_secs
            && pts_secs + 1e-3 >= self.next_target()
        {
            let rgb = self.to_rgb(frame)?;
            self.pending.push_back(SampledFrame {
                timestamp: self.next_target(),
                width: self.out_width,
                height: self.out_height,
                rgb,
            });
            self.next_boundary += 1;
        }
        Ok(())
    }

    fn to_rgb(&mut self, frame: &ffmpeg::util::frame::video::Video) -> IndexResult<Vec<u8>> {
        if self.scaler.is_none() {
            let scaler = ffmpeg::software::scaling::Context::get(
                frame.format(),
                frame.width(),
                frame.height(),
                ffmpeg::format::Pixel::RGB24,
                self.out_width,
                self.out_height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| unreadable(&self.path, format!("scaler: {e}")))?;
            self.scaler = Some(scaler);
        }

        let mut rgb_frame = ffmpeg::util::frame::video::Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler
                .run(frame, &mut rgb_frame)
                .map_err(|e| unreadable(&self.path, format!("pixel conversion: {e}")))?;
        }

        // Strip the row padding the scaler may add
        let data = rgb_frame.data(0);
        let stride = rgb_frame.stride(0);
        let row_bytes = self.out_width as usize * 3;
        let mut rgb = Vec::with_capacity(row_bytes * self.out_height as usize);
        for y in 0..self.out_height as usize {
            let start = y * stride;
            rgb.extend_from_slice(&data[start..start + row_bytes]);
        }
        Ok(rgb)
    }

    fn drain_decoder(&mut self) -> IndexResult<()> {
        let mut frame = ffmpeg::util::frame::video::Video::empty();
        while self.decoder.receive_frame(&mut frame).is_ok() {
            self.consider(&frame)?;
        }
        Ok(())
    }

    fn pump(&mut self) -> IndexResult<()> {
        // Pull the next packet for our stream; None means demuxer EOF
        let packet = {
            let mut packets = self.ictx.packets();
            loop {
                match packets.next() {
                    Some((stream, packet)) if stream.index() == self.stream_index => {
                        break Some(packet);
                    }
                    Some(_) => continue,
                    None => break None,
                }
            }
        };

        match packet {
            Some(packet) => {
                self.decoder
                    .send_packet(&packet)
                    .map_err(|e| unreadable(&self.path, format!("decode: {e}")))?;
                self.drain_decoder()?;
            }
            None => {
                if !self.eof_sent {
                    self.eof_sent = true;
                    self.decoder
                        .send_eof()
                        .map_err(|e| unreadable(&self.path, format!("decode flush: {e}")))?;
                    self.drain_decoder()?;
                }
                self.finished = true;
            }
        }
        Ok(())
    }
}

impl Iterator for FrameStream {
    type Item = IndexResult<SampledFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(Ok(frame));
            }
            if self.finished || self.next_target() >= self.duration_secs {
                return None;
            }
            if let Err(e) = self.pump() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_unreadable() {
        let sampler = FfmpegSampler::new();
        let err = sampler.probe(Path::new("/nonexistent/video.mp4")).unwrap_err();
        assert_eq!(err.status_code(), "UNREADABLE_VIDEO");
    }

    // Integration test: only runs when a local fixture is present
    #[test]
    fn samples_real_video_on_the_interval_grid() {
        let fixture = Path::new("tests/fixtures/sample.mp4");
        if !fixture.exists() {
            eprintln!("Skipping real video test: tests/fixtures/sample.mp4 not found");
            return;
        }

        let sampler = FfmpegSampler::new();
        let info = sampler.probe(fixture).unwrap();
        assert!(info.duration_secs > 0.0);

        let frames: Vec<_> = sampler
            .sample(fixture, 1.0, 224, 224)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(!frames.is_empty());

        for (k, frame) in frames.iter().enumerate() {
            assert!((frame.timestamp - k as f64).abs() < f64::EPSILON);
            assert_eq!(frame.width, 224);
            assert_eq!(frame.height, 224);
            assert_eq!(frame.rgb.len(), 224 * 224 * 3);
        }
    }
}
