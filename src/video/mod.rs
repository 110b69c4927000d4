//! Video decoding, frame sampling, preview frames, and clip extraction.

pub mod clip;
pub mod frames;
pub mod sampler;

pub use clip::{ClipRef, clip_window, extract_clip, extract_clip_or_fallback};
pub use frames::{remove_video_frames, save_frame};
pub use sampler::{FfmpegSampler, FrameSource, FrameStream, SampledFrame, VideoInfo};
