//! Vector index for frame embeddings.
//!
//! The index stores L2-normalized CLIP embeddings in flat row-major storage
//! and answers exact inner-product (cosine) queries. Positions assigned by
//! the index are the join key into the metadata store.

pub mod index;
pub mod types;

pub use index::{FlatIndex, l2_normalize};
pub use types::{EMBEDDING_DIMENSION_512, Score, VectorDimension, VectorError};
