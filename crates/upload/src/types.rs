//! Public types for upload coordination.

use std::sync::Arc;
use std::time::Duration;

use pwrite_protocol::DEFAULT_BUFFER_SIZE;

use crate::retry::RetryPolicy;

/// An open parallel write session.
///
/// Not `Clone`: [`SessionCoordinator::close_session`](crate::SessionCoordinator::close_session)
/// consumes it, so a session can be closed at most once.
#[derive(Debug)]
pub struct WriteSession {
    handle: Arc<str>,
    target_path: String,
    stream_count: u32,
}

impl WriteSession {
    pub(crate) fn new(handle: &str, target_path: &str, stream_count: u32) -> Self {
        Self {
            handle: Arc::from(handle),
            target_path: target_path.to_string(),
            stream_count,
        }
    }

    /// Server-issued handle shared by every stream.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub(crate) fn shared_handle(&self) -> Arc<str> {
        Arc::clone(&self.handle)
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// Stream count declared when the session was opened.
    pub fn stream_count(&self) -> u32 {
        self.stream_count
    }
}

/// Tunables for one upload.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Upper bound on the payload of one frame.
    pub buffer_size: usize,
    pub retry: RetryPolicy,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

/// What one stream achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub stream_index: u32,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    /// The local file ended before the stream's range was exhausted.
    pub short_read: bool,
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadSummary {
    pub target_path: String,
    pub handle: String,
    pub file_size: u64,
    /// One report per stream, ordered by stream index.
    pub streams: Vec<StreamReport>,
    pub elapsed: Duration,
}

impl UploadSummary {
    pub fn bytes_sent(&self) -> u64 {
        self.streams.iter().map(|s| s.bytes_sent).sum()
    }

    pub fn frames_sent(&self) -> u64 {
        self.streams.iter().map(|s| s.frames_sent).sum()
    }

    /// True if any stream hit end-of-file early.
    pub fn short_read(&self) -> bool {
        self.streams.iter().any(|s| s.short_read)
    }
}

/// Events emitted while an upload runs.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    SessionOpened {
        handle: String,
        stream_count: u32,
    },
    StreamStarted {
        stream_index: u32,
        base_offset: u64,
        length: u64,
    },
    /// A frame was acknowledged by the server.
    FrameSent {
        stream_index: u32,
        offset: u64,
        bytes: u64,
    },
    /// A frame failed and will be resent after `delay`.
    FrameRetry {
        stream_index: u32,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    StreamShortRead {
        stream_index: u32,
        missing_bytes: u64,
    },
    StreamCompleted {
        stream_index: u32,
        bytes_sent: u64,
    },
    StreamFailed {
        stream_index: u32,
        error: String,
    },
    SessionClosed {
        handle: String,
    },
}
