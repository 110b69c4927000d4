//! Metadata storage and on-disk persistence for the index pair.

pub mod metadata;
pub mod persistence;

pub use metadata::{FrameRecord, MetadataStore};
pub use persistence::{StoreManifest, load_pair, pair_exists, save_pair};
