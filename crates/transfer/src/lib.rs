//! Byte-range planning and positioned reads for parallel uploads.
//!
//! A file is split into one contiguous [`ByteRange`] per stream by [`plan`];
//! each stream then walks its range with a [`RangeReader`] and a
//! [`StreamCursor`].

mod chunked;
mod plan;
mod progress;
mod types;
mod validation;

pub use chunked::RangeReader;
pub use plan::plan;
pub use progress::{ProgressCallback, ProgressSnapshot, ProgressTracker, SpeedCalculator};
pub use types::{ByteRange, StreamCursor};
pub use validation::validate_logical_path;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid logical path: {0}")]
    InvalidPath(String),
}
