use crate::TransferError;
use crate::types::ByteRange;

/// Splits `file_size` bytes into `stream_count` contiguous ranges.
///
/// Every range is `file_size / stream_count` bytes long except the last,
/// which also takes the remainder. Ranges are ordered by stream index and
/// cover `[0, file_size)` exactly.
pub fn plan(file_size: u64, stream_count: u32) -> Result<Vec<ByteRange>, TransferError> {
    if stream_count == 0 {
        return Err(TransferError::InvalidArgument(
            "stream count must be at least 1".into(),
        ));
    }

    let count = u64::from(stream_count);
    let chunk_size = file_size / count;
    let remainder = file_size % count;

    let ranges = (0..stream_count)
        .map(|i| {
            let is_last = i == stream_count - 1;
            ByteRange {
                stream_index: i,
                base_offset: u64::from(i) * chunk_size,
                length: chunk_size + if is_last { remainder } else { 0 },
            }
        })
        .collect();

    tracing::debug!(file_size, stream_count, chunk_size, remainder, "planned byte ranges");
    Ok(ranges)
}
