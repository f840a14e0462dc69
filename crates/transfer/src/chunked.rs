use std::io::SeekFrom;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;

/// Reads a file sequentially from a fixed starting offset.
///
/// Each reader opens its own handle, so concurrent readers over the same
/// file never share a cursor.
pub struct RangeReader {
    file: tokio::fs::File,
    position: u64,
}

impl RangeReader {
    /// Opens `path` and positions the cursor at `offset`.
    pub async fn open(path: &Path, offset: u64) -> Result<Self, TransferError> {
        let mut file = tokio::fs::File::open(path).await?;
        let position = file.seek(SeekFrom::Start(offset)).await?;
        Ok(Self { file, position })
    }

    /// Reads up to `max` bytes into a freshly allocated buffer.
    ///
    /// Keeps reading until `max` bytes arrive or the file ends, so a short
    /// result always means EOF. Returns an empty buffer at EOF.
    pub async fn read_chunk(&mut self, max: usize) -> Result<Bytes, TransferError> {
        let mut buf = BytesMut::zeroed(max);
        let mut filled = 0;
        while filled < max {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        self.position += filled as u64;
        Ok(buf.freeze())
    }

    /// Current absolute byte offset.
    pub fn position(&self) -> u64 {
        self.position
    }
}
