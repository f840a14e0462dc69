//! `multipart/form-data` framing for write requests.
//!
//! # Wire format
//!
//! ```text
//! PER FIELD:
//!   --<boundary>\r\n
//!   Content-Disposition: form-data; name=<name>\r\n
//!   Content-Type: application/octet-stream\r\n
//!   Content-Transfer-Encoding: binary\r\n
//!   Content-Length: <n>\r\n          (binary fields only)
//!   \r\n
//!   <value>\r\n
//!
//! TERMINATOR: --<boundary>--\r\n
//! ```
//!
//! A [`Frame`] is a list of segments whose concatenation is the request
//! body. Binary payloads are carried as their own segment so the payload
//! buffer is never copied while the frame is built.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::MAX_BOUNDARY_LEN;

const CRLF: &[u8] = b"\r\n";

/// Errors produced while building a frame.
#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
    #[error("invalid boundary {boundary:?}: {reason}")]
    InvalidBoundary { boundary: String, reason: String },

    #[error("invalid field name {0:?}")]
    InvalidFieldName(String),
}

/// Value of a single form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// UTF-8 text, written as-is.
    Text(String),
    /// Raw payload; its length is declared in a `Content-Length` header.
    Binary(Bytes),
}

/// A named form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: FieldValue,
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn binary(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Binary(data.into()),
        }
    }
}

/// An encoded multipart request body.
#[derive(Debug, Clone)]
pub struct Frame {
    boundary: String,
    segments: Vec<Bytes>,
}

impl Frame {
    /// Boundary delimiting the fields of this frame.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Ordered body segments.
    pub fn segments(&self) -> &[Bytes] {
        &self.segments
    }

    /// Total body length in bytes.
    pub fn len(&self) -> usize {
        self.segments.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenates the segments into one contiguous body.
    pub fn into_body(self) -> Bytes {
        if self.segments.len() == 1 {
            return self.segments.into_iter().next().unwrap_or_default();
        }
        let mut body = BytesMut::with_capacity(self.len());
        for segment in &self.segments {
            body.put_slice(segment);
        }
        body.freeze()
    }
}

/// Returns a boundary that is unique per call.
pub fn generate_boundary() -> String {
    format!("pwrite-{}", uuid::Uuid::new_v4().simple())
}

/// Encodes `fields` into a fresh [`Frame`] delimited by `boundary`.
///
/// Each call allocates its own segments; nothing is shared with frames built
/// earlier except reference-counted binary payloads handed in by the caller.
pub fn build_frame<I>(boundary: &str, fields: I) -> Result<Frame, MultipartError>
where
    I: IntoIterator<Item = FormField>,
{
    validate_boundary(boundary)?;

    let mut segments = Vec::new();
    for field in fields {
        validate_field_name(&field.name)?;

        let mut head = BytesMut::with_capacity(160 + field.name.len());
        head.put_slice(b"--");
        head.put_slice(boundary.as_bytes());
        head.put_slice(CRLF);
        head.put_slice(b"Content-Disposition: form-data; name=");
        head.put_slice(field.name.as_bytes());
        head.put_slice(CRLF);
        head.put_slice(b"Content-Type: application/octet-stream");
        head.put_slice(CRLF);
        head.put_slice(b"Content-Transfer-Encoding: binary");
        head.put_slice(CRLF);

        match field.value {
            FieldValue::Text(text) => {
                head.put_slice(CRLF);
                head.put_slice(text.as_bytes());
                head.put_slice(CRLF);
                segments.push(head.freeze());
            }
            FieldValue::Binary(data) => {
                head.put_slice(format!("Content-Length: {}", data.len()).as_bytes());
                head.put_slice(CRLF);
                head.put_slice(CRLF);
                segments.push(head.freeze());
                segments.push(data);
                segments.push(Bytes::from_static(CRLF));
            }
        }
    }

    let mut tail = BytesMut::with_capacity(boundary.len() + 6);
    tail.put_slice(b"--");
    tail.put_slice(boundary.as_bytes());
    tail.put_slice(b"--");
    tail.put_slice(CRLF);
    segments.push(tail.freeze());

    Ok(Frame {
        boundary: boundary.to_string(),
        segments,
    })
}

fn validate_boundary(boundary: &str) -> Result<(), MultipartError> {
    let invalid = |reason: &str| MultipartError::InvalidBoundary {
        boundary: boundary.to_string(),
        reason: reason.to_string(),
    };

    if boundary.is_empty() {
        return Err(invalid("empty"));
    }
    if boundary.len() > MAX_BOUNDARY_LEN {
        return Err(invalid("longer than 70 characters"));
    }
    if boundary.ends_with(' ') {
        return Err(invalid("trailing space"));
    }
    // RFC 2046 bchars.
    let allowed = |c: char| c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c);
    if let Some(c) = boundary.chars().find(|&c| !allowed(c)) {
        return Err(invalid(&format!("character {c:?} not allowed")));
    }
    Ok(())
}

fn validate_field_name(name: &str) -> Result<(), MultipartError> {
    let bad = |c: char| c.is_control() || c.is_whitespace() || c == '"' || c == ';';
    if name.is_empty() || name.chars().any(bad) {
        return Err(MultipartError::InvalidFieldName(name.to_string()));
    }
    Ok(())
}
