//! Wire protocol for the iRODS HTTP API parallel write operations.
//!
//! Control operations (`parallel_write_init`, `parallel_write_shutdown`) are
//! url-encoded forms; data operations (`write`) are `multipart/form-data`
//! frames built by [`multipart::build_frame`].

pub mod constants;
pub mod messages;
pub mod multipart;

// Re-export primary types for convenience.
pub use constants::{DEFAULT_BUFFER_SIZE, Operation};
pub use messages::{
    FormParams, IrodsResponse, ParallelWriteInitResponse, StatusResponse, WriteRequest,
};
pub use multipart::{
    FieldValue, FormField, Frame, MultipartError, build_frame, generate_boundary,
};
