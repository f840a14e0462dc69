//! The seam between session coordination and the HTTP client.

use std::future::Future;
use std::pin::Pin;

use pwrite_protocol::{FormParams, Frame};

use crate::error::UploadError;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-2xx response into [`UploadError::Status`].
    pub fn error_for_status(self) -> Result<Self, UploadError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(UploadError::Status {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransportResponse, UploadError>> + Send + 'a>>;

/// Sends requests to the data-objects endpoint.
///
/// Implementations must be shareable across stream tasks. Errors are for
/// failures to complete an exchange; any HTTP status, success or not, is
/// returned as a [`TransportResponse`].
pub trait Transport: Send + Sync {
    /// Posts an `application/x-www-form-urlencoded` control request.
    fn post_form(&self, params: FormParams) -> TransportFuture<'_>;

    /// Posts one `multipart/form-data` frame.
    fn post_frame(&self, frame: Frame) -> TransportFuture<'_>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn success_range() {
        assert!(TransportResponse::new(200, "").is_success());
        assert!(TransportResponse::new(204, "").is_success());
        assert!(!TransportResponse::new(199, "").is_success());
        assert!(!TransportResponse::new(302, "").is_success());
        assert!(!TransportResponse::new(500, "").is_success());
    }

    #[test]
    fn error_for_status_keeps_body() {
        let err = TransportResponse::new(401, "bad token")
            .error_for_status()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(matches!(
            err,
            UploadError::Status { status: 401, ref body } if body == "bad token"
        ));

        let ok = TransportResponse::new(200, "{}").error_for_status().unwrap();
        assert_eq!(ok.body, "{}");
    }
}
