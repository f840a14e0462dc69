//! Request builders and response payloads for `/data-objects`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::constants::{Operation, field};
use crate::multipart::{Frame, FormField, MultipartError, build_frame};

/// Form parameters of a url-encoded control request.
pub type FormParams = Vec<(&'static str, String)>;

/// Status block embedded in every JSON response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrodsResponse {
    pub status_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl IrodsResponse {
    pub fn is_ok(&self) -> bool {
        self.status_code == 0
    }
}

/// Response to `op=parallel_write_init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelWriteInitResponse {
    pub irods_response: IrodsResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_write_handle: Option<String>,
}

impl ParallelWriteInitResponse {
    /// The session handle, if present and non-blank.
    pub fn handle(&self) -> Option<&str> {
        self.parallel_write_handle
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }
}

/// Response body shared by operations that only report status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub irods_response: IrodsResponse,
}

/// Parameters opening a parallel write session.
pub fn parallel_write_init_params(logical_path: &str, stream_count: u32) -> FormParams {
    vec![
        (field::OP, Operation::ParallelWriteInit.as_str().to_string()),
        (field::LOGICAL_PATH, logical_path.to_string()),
        (field::STREAM_COUNT, stream_count.to_string()),
    ]
}

/// Parameters closing a parallel write session.
pub fn parallel_write_shutdown_params(handle: &str) -> FormParams {
    vec![
        (
            field::OP,
            Operation::ParallelWriteShutdown.as_str().to_string(),
        ),
        (field::HANDLE, handle.to_string()),
    ]
}

/// One `op=write` request for a single stream.
#[derive(Debug, Clone)]
pub struct WriteRequest<'a> {
    pub handle: &'a str,
    pub stream_index: u32,
    /// Absolute file offset; only the first request of a stream carries it.
    pub offset: Option<u64>,
    pub data: Bytes,
}

impl WriteRequest<'_> {
    /// Fields in wire order: op, handle, stream index, offset, count, bytes.
    pub fn fields(&self) -> Vec<FormField> {
        let mut fields = Vec::with_capacity(6);
        fields.push(FormField::text(field::OP, Operation::Write.as_str()));
        fields.push(FormField::text(field::HANDLE, self.handle));
        fields.push(FormField::text(
            field::STREAM_INDEX,
            self.stream_index.to_string(),
        ));
        if let Some(offset) = self.offset {
            fields.push(FormField::text(field::OFFSET, offset.to_string()));
        }
        fields.push(FormField::text(field::COUNT, self.data.len().to_string()));
        fields.push(FormField::binary(field::BYTES, self.data.clone()));
        fields
    }

    pub fn encode(&self, boundary: &str) -> Result<Frame, MultipartError> {
        build_frame(boundary, self.fields())
    }
}
