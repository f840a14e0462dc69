/// Endpoint exchanging Basic credentials for a bearer token.
pub const AUTHENTICATE_PATH: &str = "/authenticate";

/// Endpoint carrying every parallel-write operation.
pub const DATA_OBJECTS_PATH: &str = "/data-objects";

/// Form field names understood by the `/data-objects` endpoint.
pub mod field {
    pub const OP: &str = "op";
    pub const LOGICAL_PATH: &str = "lpath";
    pub const STREAM_COUNT: &str = "stream-count";
    pub const HANDLE: &str = "parallel-write-handle";
    pub const STREAM_INDEX: &str = "stream-index";
    pub const OFFSET: &str = "offset";
    pub const COUNT: &str = "count";
    pub const BYTES: &str = "bytes";
}

/// Default working buffer per stream (4 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Longest boundary permitted by RFC 2046.
pub const MAX_BOUNDARY_LEN: usize = 70;

/// Operation selector sent in the `op` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ParallelWriteInit,
    Write,
    ParallelWriteShutdown,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::ParallelWriteInit => "parallel_write_init",
            Operation::Write => "write",
            Operation::ParallelWriteShutdown => "parallel_write_shutdown",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
