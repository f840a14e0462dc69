//! Parallel write uploads for the iRODS HTTP API.
//!
//! [`SessionCoordinator`] partitions a local file into byte ranges, opens a
//! parallel write session, streams every range concurrently as multipart
//! frames, and closes the session once all streams have finished.

pub mod error;
pub mod http;
pub mod retry;
pub mod session;
pub mod transport;
pub mod types;
mod worker;

#[cfg(test)]
mod test_support;

pub use error::{ErrorKind, StreamFailure, UploadError};
pub use http::{DEFAULT_BASE_URL, HttpTransport, HttpTransportConfig, authenticate};
pub use retry::RetryPolicy;
pub use session::SessionCoordinator;
pub use transport::{Transport, TransportFuture, TransportResponse};
pub use types::{StreamReport, UploadEvent, UploadOptions, UploadSummary, WriteSession};
