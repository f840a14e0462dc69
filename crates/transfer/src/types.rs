/// A contiguous slice of the source file owned by one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// 0-based stream identifier.
    pub stream_index: u32,
    /// Absolute offset of the first byte.
    pub base_offset: u64,
    /// Number of bytes in the range (may be 0).
    pub length: u64,
}

impl ByteRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.base_offset + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Per-stream write position.
///
/// Tracks where the next frame starts, how much of the range is left, and
/// whether the stream's first frame (the only one carrying `offset`) has
/// been acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCursor {
    pub current_offset: u64,
    pub remaining: u64,
    pub first_frame_sent: bool,
}

impl StreamCursor {
    pub fn new(range: &ByteRange) -> Self {
        Self {
            current_offset: range.base_offset,
            remaining: range.length,
            first_frame_sent: false,
        }
    }

    /// Bytes to request for the next frame.
    pub fn next_read_len(&self, buffer_size: usize) -> usize {
        usize::try_from(self.remaining).map_or(buffer_size, |r| r.min(buffer_size))
    }

    /// The `offset` field value for the next frame, if it must carry one.
    pub fn offset_field(&self) -> Option<u64> {
        (!self.first_frame_sent).then_some(self.current_offset)
    }

    /// Records an acknowledged frame of `bytes` bytes.
    pub fn advance(&mut self, bytes: u64) {
        self.current_offset += bytes;
        self.remaining = self.remaining.saturating_sub(bytes);
        self.first_frame_sent = true;
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }
}
