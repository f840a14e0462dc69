//! Upload error types.

use std::fmt;

use pwrite_protocol::MultipartError;
use pwrite_transfer::TransferError;

/// Coarse classification of an [`UploadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad partition request or unusable argument.
    InvalidArgument,
    /// Local file open/seek/read failure.
    Io,
    /// Connection failure, timeout or non-success HTTP status.
    Transport,
    /// Missing or malformed fields in a server response.
    Protocol,
    /// The upload was cancelled.
    Cancelled,
    /// A worker task died without reporting.
    Internal,
}

/// Errors produced while uploading.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("multipart encoding failed: {0}")]
    Multipart(#[from] MultipartError),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{}", summarize(.failures, .close_error))]
    StreamsFailed {
        failures: Vec<StreamFailure>,
        close_error: Option<Box<UploadError>>,
    },
}

impl UploadError {
    /// Maps the error onto its [`ErrorKind`].
    ///
    /// Aggregated stream failures report the kind of the lowest-indexed
    /// failed stream.
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            UploadError::Io(_) => ErrorKind::Io,
            UploadError::Transport(_) | UploadError::Http(_) | UploadError::Status { .. } => {
                ErrorKind::Transport
            }
            UploadError::Protocol(_) | UploadError::Multipart(_) => ErrorKind::Protocol,
            UploadError::Cancelled => ErrorKind::Cancelled,
            UploadError::Internal(_) => ErrorKind::Internal,
            UploadError::StreamsFailed { failures, .. } => failures
                .iter()
                .min_by_key(|f| f.stream_index)
                .map_or(ErrorKind::Internal, |f| f.error.kind()),
        }
    }

    /// Returns true if resending the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Transport(_) | UploadError::Http(_) => true,
            UploadError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    /// Indices of the failed streams, if this is an aggregated failure.
    pub fn failed_streams(&self) -> Vec<u32> {
        match self {
            UploadError::StreamsFailed { failures, .. } => {
                failures.iter().map(|f| f.stream_index).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl From<TransferError> for UploadError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Io(e) => UploadError::Io(e),
            TransferError::InvalidArgument(msg) | TransferError::InvalidPath(msg) => {
                UploadError::InvalidArgument(msg)
            }
        }
    }
}

/// The outcome of one stream that did not complete.
#[derive(Debug)]
pub struct StreamFailure {
    pub stream_index: u32,
    pub error: UploadError,
}

impl fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream {}: {}", self.stream_index, self.error)
    }
}

fn summarize(failures: &[StreamFailure], close_error: &Option<Box<UploadError>>) -> String {
    let mut msg = format!("{} stream(s) failed", failures.len());
    for (i, failure) in failures.iter().enumerate() {
        let sep = if i == 0 { ": " } else { "; " };
        msg.push_str(sep);
        msg.push_str(&failure.to_string());
    }
    if let Some(close) = close_error {
        msg.push_str(&format!(" (closing the session also failed: {close})"));
    }
    msg
}
