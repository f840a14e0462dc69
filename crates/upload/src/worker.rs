//! Sends one byte range as a sequence of write frames.

use std::path::PathBuf;
use std::sync::Arc;

use pwrite_protocol::{WriteRequest, generate_boundary};
use pwrite_transfer::{ByteRange, RangeReader, StreamCursor};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::UploadError;
use crate::transport::Transport;
use crate::types::{StreamReport, UploadEvent, UploadOptions};

/// State shared read-only by every stream of one upload.
pub(crate) struct WorkerContext {
    pub transport: Arc<dyn Transport>,
    pub handle: Arc<str>,
    pub local_file: PathBuf,
    pub options: UploadOptions,
    pub events: mpsc::Sender<UploadEvent>,
    pub cancel: CancellationToken,
}

impl WorkerContext {
    /// Best-effort event delivery; a full or closed channel drops the event.
    fn emit(&self, event: UploadEvent) {
        let _ = self.events.try_send(event);
    }
}

/// Uploads one [`ByteRange`] over its own file handle.
///
/// The first frame carries the range's base offset; the server tracks the
/// stream's position from then on, so later frames omit it.
pub(crate) struct StreamWorker {
    ctx: Arc<WorkerContext>,
    range: ByteRange,
}

impl StreamWorker {
    pub fn new(ctx: Arc<WorkerContext>, range: ByteRange) -> Self {
        Self { ctx, range }
    }

    pub async fn run(self) -> Result<StreamReport, UploadError> {
        let stream_index = self.range.stream_index;
        match self.transfer().await {
            Ok(report) => {
                debug!(
                    stream = stream_index,
                    frames = report.frames_sent,
                    bytes = report.bytes_sent,
                    "stream completed"
                );
                self.ctx.emit(UploadEvent::StreamCompleted {
                    stream_index,
                    bytes_sent: report.bytes_sent,
                });
                Ok(report)
            }
            Err(e) => {
                error!(stream = stream_index, error = %e, "stream failed");
                self.ctx.emit(UploadEvent::StreamFailed {
                    stream_index,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn transfer(&self) -> Result<StreamReport, UploadError> {
        let range = self.range;
        let mut report = StreamReport {
            stream_index: range.stream_index,
            ..Default::default()
        };

        if range.is_empty() {
            debug!(stream = range.stream_index, "empty range, nothing to send");
            return Ok(report);
        }
        if self.ctx.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let mut reader = RangeReader::open(&self.ctx.local_file, range.base_offset).await?;
        let mut cursor = StreamCursor::new(&range);
        self.ctx.emit(UploadEvent::StreamStarted {
            stream_index: range.stream_index,
            base_offset: range.base_offset,
            length: range.length,
        });

        while !cursor.is_done() {
            if self.ctx.cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            let want = cursor.next_read_len(self.ctx.options.buffer_size);
            let data = reader.read_chunk(want).await?;
            if data.is_empty() {
                warn!(
                    stream = range.stream_index,
                    offset = cursor.current_offset,
                    missing = cursor.remaining,
                    "local file ended before the range was exhausted"
                );
                report.short_read = true;
                self.ctx.emit(UploadEvent::StreamShortRead {
                    stream_index: range.stream_index,
                    missing_bytes: cursor.remaining,
                });
                break;
            }

            let sent = data.len() as u64;
            let request = WriteRequest {
                handle: &self.ctx.handle,
                stream_index: range.stream_index,
                offset: cursor.offset_field(),
                data,
            };
            self.send_with_retry(&request).await?;

            debug!(
                stream = range.stream_index,
                offset = cursor.current_offset,
                bytes = sent,
                "frame sent"
            );
            self.ctx.emit(UploadEvent::FrameSent {
                stream_index: range.stream_index,
                offset: cursor.current_offset,
                bytes: sent,
            });
            cursor.advance(sent);
            report.frames_sent += 1;
            report.bytes_sent += sent;
        }

        Ok(report)
    }

    /// Sends `request`, resending per the retry policy.
    ///
    /// Every attempt is encoded from the same request, so a resent first
    /// frame still carries the offset and later frames never do.
    async fn send_with_retry(&self, request: &WriteRequest<'_>) -> Result<(), UploadError> {
        let policy = &self.ctx.options.retry;
        let mut attempt = 1;
        loop {
            match self.send_once(request).await {
                Ok(()) => return Ok(()),
                Err(e) if policy.should_retry(attempt, &e) => {
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        stream = request.stream_index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "frame failed, retrying"
                    );
                    self.ctx.emit(UploadEvent::FrameRetry {
                        stream_index: request.stream_index,
                        attempt,
                        delay,
                        error: e.to_string(),
                    });
                    tokio::select! {
                        biased;
                        _ = self.ctx.cancel.cancelled() => return Err(UploadError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: &WriteRequest<'_>) -> Result<(), UploadError> {
        let frame = request.encode(&generate_boundary())?;
        let response = tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => return Err(UploadError::Cancelled),
            r = self.ctx.transport.post_frame(frame) => r?,
        };
        response.error_for_status()?;
        Ok(())
    }
}
