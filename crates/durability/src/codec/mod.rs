//! Batch-encoding seam.

pub mod traits;

pub use traits::{BatchCodec, OpaqueBatchCodec};
