//! Natural-language search over video content.
//!
//! Videos are sampled into frames on a fixed interval, each frame is encoded
//! into the CLIP ViT-B/32 text/image space, and a flat inner-product index
//! answers text queries with ranked (video, timestamp) hits. Results can be
//! materialized as preview frames and stream-copied clips.

pub mod config;
pub mod embedding;
pub mod error;
pub mod indexing;
pub mod store;
pub mod vector;
pub mod video;

// Explicit exports for better API clarity
pub use config::Settings;
pub use embedding::{ClipEncoder, EmbeddingEncoder};
pub use error::{IndexError, IndexResult};
pub use indexing::{
    DeleteReport, IndexStats, IngestReport, SearchResult, VideoIndexService, VideoIndexer,
};
pub use store::{FrameRecord, MetadataStore, StoreManifest};
pub use vector::{FlatIndex, Score, VectorDimension, VectorError};
pub use video::{ClipRef, FfmpegSampler, FrameSource, SampledFrame, VideoInfo};
