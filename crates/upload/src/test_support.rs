//! In-memory [`Transport`] that decodes every frame it receives.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use pwrite_protocol::{FormParams, Frame};

use crate::error::UploadError;
use crate::transport::{Transport, TransportFuture, TransportResponse};

pub(crate) const HANDLE: &str = "pw-handle-1";

/// One decoded `op=write` request.
#[derive(Debug, Clone)]
pub(crate) struct RecordedWrite {
    pub handle: String,
    pub stream_index: u32,
    pub offset: Option<u64>,
    pub count: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    /// The exchange itself fails.
    Transport,
    /// The server answers with this status.
    Status(u16),
}

struct PlannedFailure {
    kind: Failure,
    remaining: u32,
}

pub(crate) struct MockTransport {
    init: TransportResponse,
    shutdown: TransportResponse,
    write_delay: Option<Duration>,
    /// Keyed by (stream index, 1-based frame number within the stream).
    failures: Mutex<HashMap<(u32, u64), PlannedFailure>>,
    pub forms: Mutex<Vec<FormParams>>,
    /// Every write attempt, in arrival order.
    pub attempts: Mutex<Vec<RecordedWrite>>,
    /// Acknowledged writes, in arrival order.
    pub writes: Mutex<Vec<RecordedWrite>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            init: TransportResponse::new(
                200,
                format!(
                    r#"{{"irods_response":{{"status_code":0}},"parallel_write_handle":"{HANDLE}"}}"#
                ),
            ),
            shutdown: TransportResponse::new(200, r#"{"irods_response":{"status_code":0}}"#),
            write_delay: None,
            failures: Mutex::new(HashMap::new()),
            forms: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_init(mut self, status: u16, body: &str) -> Self {
        self.init = TransportResponse::new(status, body);
        self
    }

    pub fn with_shutdown(mut self, status: u16, body: &str) -> Self {
        self.shutdown = TransportResponse::new(status, body);
        self
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Fails the `frame`-th frame of `stream` `times` times in a row.
    pub fn fail_frame(self, stream: u32, frame: u64, times: u32, kind: Failure) -> Self {
        self.failures.lock().unwrap().insert(
            (stream, frame),
            PlannedFailure {
                kind,
                remaining: times,
            },
        );
        self
    }

    pub fn ops(&self) -> Vec<String> {
        self.forms
            .lock()
            .unwrap()
            .iter()
            .filter_map(|params| {
                params
                    .iter()
                    .find(|(k, _)| *k == "op")
                    .map(|(_, v)| v.clone())
            })
            .collect()
    }

    pub fn count_op(&self, op: &str) -> usize {
        self.ops().iter().filter(|o| *o == op).count()
    }

    pub fn writes_for(&self, stream: u32) -> Vec<RecordedWrite> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.stream_index == stream)
            .cloned()
            .collect()
    }

    fn planned_failure(&self, write: &RecordedWrite) -> Option<Failure> {
        let frame_no = self
            .writes
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.stream_index == write.stream_index)
            .count() as u64
            + 1;
        let mut failures = self.failures.lock().unwrap();
        let planned = failures.get_mut(&(write.stream_index, frame_no))?;
        if planned.remaining == 0 {
            return None;
        }
        planned.remaining -= 1;
        Some(planned.kind)
    }
}

impl Transport for MockTransport {
    fn post_form(&self, params: FormParams) -> TransportFuture<'_> {
        Box::pin(async move {
            let is_init = params.iter().any(|(_, v)| v == "parallel_write_init");
            self.forms.lock().unwrap().push(params);
            Ok(if is_init {
                self.init.clone()
            } else {
                self.shutdown.clone()
            })
        })
    }

    fn post_frame(&self, frame: Frame) -> TransportFuture<'_> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let result = self.handle_frame(frame).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }
}

impl MockTransport {
    async fn handle_frame(&self, frame: Frame) -> Result<TransportResponse, UploadError> {
        let write = decode_write(frame).await;

        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        self.attempts.lock().unwrap().push(write.clone());
        match self.planned_failure(&write) {
            Some(Failure::Transport) => Err(UploadError::Transport("connection reset".into())),
            Some(Failure::Status(status)) => Ok(TransportResponse::new(status, "rejected")),
            None => {
                self.writes.lock().unwrap().push(write);
                Ok(TransportResponse::new(200, r#"{"irods_response":{"status_code":0}}"#))
            }
        }
    }
}

/// Parses a frame the way a multipart-aware server would.
pub(crate) async fn decode_write(frame: Frame) -> RecordedWrite {
    let boundary = frame.boundary().to_string();
    let body = frame.into_body();
    let stream = futures_util::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields: HashMap<String, Vec<u8>> = HashMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap().to_string();
        let value = field.bytes().await.unwrap().to_vec();
        assert!(
            fields.insert(name.clone(), value).is_none(),
            "duplicate field {name}"
        );
    }

    let text = |name: &str| -> Option<String> {
        fields
            .get(name)
            .map(|v| String::from_utf8(v.clone()).unwrap())
    };
    assert_eq!(text("op").as_deref(), Some("write"));

    RecordedWrite {
        handle: text("parallel-write-handle").unwrap(),
        stream_index: text("stream-index").unwrap().parse().unwrap(),
        offset: text("offset").map(|o| o.parse().unwrap()),
        count: text("count").unwrap().parse().unwrap(),
        data: fields.get("bytes").cloned().unwrap(),
    }
}

/// Writes `len` bytes of a repeating pattern and returns them.
pub(crate) fn write_pattern(path: &std::path::Path, len: usize) -> Vec<u8> {
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(path, &data).unwrap();
    data
}

/// Reassembles acknowledged writes into a file image.
///
/// Each stream's first write sets its cursor; later writes append.
pub(crate) fn reassemble(writes: &[RecordedWrite], len: usize) -> Vec<u8> {
    let mut image = vec![0u8; len];
    let mut cursors: HashMap<u32, u64> = HashMap::new();
    for w in writes {
        let cursor = match w.offset {
            Some(offset) => {
                assert!(
                    !cursors.contains_key(&w.stream_index),
                    "stream {} sent offset twice",
                    w.stream_index
                );
                offset
            }
            None => *cursors
                .get(&w.stream_index)
                .expect("write without offset before the first frame"),
        };
        let start = cursor as usize;
        image[start..start + w.data.len()].copy_from_slice(&w.data);
        cursors.insert(w.stream_index, cursor + w.data.len() as u64);
    }
    image
}
