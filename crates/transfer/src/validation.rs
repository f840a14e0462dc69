use crate::TransferError;

/// Validates a logical (server-side) destination path.
///
/// Rejects:
/// - Empty paths
/// - Relative paths (logical paths start at the zone, e.g. `/tempZone/...`)
/// - `.` and `..` components
/// - NUL, CR and LF bytes
/// - A trailing `/` (the target is a data object, not a collection)
pub fn validate_logical_path(path: &str) -> Result<(), TransferError> {
    if path.is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }

    if !path.starts_with('/') {
        return Err(TransferError::InvalidPath(format!(
            "logical path must be absolute: {path}"
        )));
    }

    if path.contains(['\0', '\r', '\n']) {
        return Err(TransferError::InvalidPath(format!(
            "control characters not allowed: {path:?}"
        )));
    }

    if path.len() > 1 && path.ends_with('/') {
        return Err(TransferError::InvalidPath(format!(
            "path names a collection: {path}"
        )));
    }

    for component in path.split('/').skip(1) {
        match component {
            "." | ".." => {
                return Err(TransferError::InvalidPath(format!(
                    "relative component not allowed: {path}"
                )));
            }
            "" => {
                return Err(TransferError::InvalidPath(format!(
                    "empty component: {path}"
                )));
            }
            _ => {}
        }
    }

    Ok(())
}
