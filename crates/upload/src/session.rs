//! Session coordinator for parallel writes.
//!
//! Opens one server-side session, runs one worker per byte range, waits for
//! all of them, and closes the session whatever the workers did.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use pwrite_protocol::messages::{parallel_write_init_params, parallel_write_shutdown_params};
use pwrite_protocol::{ParallelWriteInitResponse, StatusResponse};
use pwrite_transfer::{ByteRange, plan, validate_logical_path};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{error, info, warn};

use crate::error::{StreamFailure, UploadError};
use crate::transport::Transport;
use crate::types::{StreamReport, UploadEvent, UploadOptions, UploadSummary, WriteSession};
use crate::worker::{StreamWorker, WorkerContext};

/// Drives parallel write sessions over a [`Transport`].
pub struct SessionCoordinator {
    transport: Arc<dyn Transport>,
    options: UploadOptions,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl SessionCoordinator {
    pub fn new(transport: Arc<dyn Transport>, options: UploadOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            transport,
            options,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Events are delivered best-effort: a receiver that falls behind by
    /// more than the channel capacity misses events.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns a token that cancels in-flight streams when triggered.
    ///
    /// The session is still closed after cancellation.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    fn emit(&self, event: UploadEvent) {
        let _ = self.events_tx.try_send(event);
    }

    /// Opens a session for `target_path` declaring `stream_count` streams.
    pub async fn open_session(
        &self,
        target_path: &str,
        stream_count: u32,
    ) -> Result<WriteSession, UploadError> {
        if stream_count == 0 {
            return Err(UploadError::InvalidArgument(
                "stream count must be at least 1".into(),
            ));
        }
        validate_logical_path(target_path)?;

        let response = self
            .transport
            .post_form(parallel_write_init_params(target_path, stream_count))
            .await?
            .error_for_status()?;

        let init: ParallelWriteInitResponse = serde_json::from_str(&response.body)
            .map_err(|e| UploadError::Protocol(format!("malformed parallel_write_init response: {e}")))?;

        if !init.irods_response.is_ok() {
            return Err(UploadError::Protocol(format!(
                "parallel_write_init failed with status {}{}",
                init.irods_response.status_code,
                init.irods_response
                    .status_message
                    .as_deref()
                    .map(|m| format!(": {m}"))
                    .unwrap_or_default()
            )));
        }

        let handle = init.handle().ok_or_else(|| {
            UploadError::Protocol("parallel_write_init response has no parallel_write_handle".into())
        })?;

        info!(handle, path = target_path, streams = stream_count, "parallel write session opened");
        self.emit(UploadEvent::SessionOpened {
            handle: handle.to_string(),
            stream_count,
        });
        Ok(WriteSession::new(handle, target_path, stream_count))
    }

    /// Uploads every range concurrently and waits for all of them.
    ///
    /// A failing stream does not stop the others. Reports come back ordered
    /// by stream index; any failures are collected into
    /// [`UploadError::StreamsFailed`].
    pub async fn run(
        &self,
        session: &WriteSession,
        local_file: &Path,
        ranges: &[ByteRange],
    ) -> Result<Vec<StreamReport>, UploadError> {
        let mut seen = HashSet::with_capacity(ranges.len());
        for r in ranges {
            if r.stream_index >= session.stream_count() {
                return Err(UploadError::InvalidArgument(format!(
                    "stream index {} outside session of {} streams",
                    r.stream_index,
                    session.stream_count()
                )));
            }
            if !seen.insert(r.stream_index) {
                return Err(UploadError::InvalidArgument(format!(
                    "stream index {} assigned to more than one range",
                    r.stream_index
                )));
            }
        }

        let ctx = Arc::new(WorkerContext {
            transport: Arc::clone(&self.transport),
            handle: session.shared_handle(),
            local_file: local_file.to_path_buf(),
            options: self.options.clone(),
            events: self.events_tx.clone(),
            cancel: self.cancel.clone(),
        });

        // Dropping this future aborts every stream task.
        let tasks: Vec<_> = ranges
            .iter()
            .map(|range| {
                let worker = StreamWorker::new(Arc::clone(&ctx), *range);
                let task = AbortOnDropHandle::new(tokio::spawn(worker.run()));
                async move { (range.stream_index, task.await) }
            })
            .collect();

        let mut reports = Vec::with_capacity(ranges.len());
        let mut failures = Vec::new();
        for (stream_index, joined) in join_all(tasks).await {
            match joined {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(error)) => failures.push(StreamFailure {
                    stream_index,
                    error,
                }),
                Err(join_err) => {
                    error!(stream = stream_index, error = %join_err, "stream task died");
                    failures.push(StreamFailure {
                        stream_index,
                        error: UploadError::Internal(format!("stream task died: {join_err}")),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(reports)
        } else {
            Err(UploadError::StreamsFailed {
                failures,
                close_error: None,
            })
        }
    }

    /// Shuts the session down. Consumes it, so it can only happen once.
    ///
    /// Only an unsuccessful HTTP status or a parseable non-zero
    /// `status_code` counts as failure; an unparseable body is tolerated.
    pub async fn close_session(&self, session: WriteSession) -> Result<(), UploadError> {
        let handle = session.handle();
        let response = self
            .transport
            .post_form(parallel_write_shutdown_params(handle))
            .await?
            .error_for_status()?;

        match serde_json::from_str::<StatusResponse>(&response.body) {
            Ok(status) if !status.irods_response.is_ok() => {
                return Err(UploadError::Protocol(format!(
                    "parallel_write_shutdown failed with status {}",
                    status.irods_response.status_code
                )));
            }
            Ok(_) => {}
            Err(e) => warn!(handle, error = %e, "unparseable parallel_write_shutdown response"),
        }

        info!(handle, "parallel write session closed");
        self.emit(UploadEvent::SessionClosed {
            handle: handle.to_string(),
        });
        Ok(())
    }

    /// Uploads `local_file` to `target_path` over `stream_count` streams.
    ///
    /// Arguments are validated and the file is partitioned before a session
    /// is opened. Once a session is open it is always closed, after every
    /// stream has finished.
    pub async fn upload(
        &self,
        local_file: &Path,
        target_path: &str,
        stream_count: u32,
    ) -> Result<UploadSummary, UploadError> {
        let started = Instant::now();
        validate_logical_path(target_path)?;
        let file_size = tokio::fs::metadata(local_file).await?.len();
        let ranges = plan(file_size, stream_count)?;
        // The token is never reset, so a cancelled coordinator stays cancelled.
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let session = self.open_session(target_path, stream_count).await?;
        let handle = session.handle().to_string();

        let run_result = self.run(&session, local_file, &ranges).await;
        let close_result = self.close_session(session).await;

        match (run_result, close_result) {
            (Ok(streams), Ok(())) => {
                let summary = UploadSummary {
                    target_path: target_path.to_string(),
                    handle,
                    file_size,
                    streams,
                    elapsed: started.elapsed(),
                };
                info!(
                    path = target_path,
                    bytes = summary.bytes_sent(),
                    frames = summary.frames_sent(),
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "upload complete"
                );
                Ok(summary)
            }
            (Ok(_), Err(close)) => {
                error!(handle = %handle, error = %close, "closing session failed");
                Err(close)
            }
            (Err(UploadError::StreamsFailed { failures, .. }), close) => {
                Err(UploadError::StreamsFailed {
                    failures,
                    close_error: close.err().map(Box::new),
                })
            }
            (Err(other), close) => {
                if let Err(close) = close {
                    error!(handle = %handle, error = %close, "closing session failed");
                }
                Err(other)
            }
        }
    }
}
