//! Error types for the admin API client.
//!
//! # Design
//! Three server-facing kinds mirror the three call paths: the generic JSON
//! path (`Request`), the token endpoint (`Login`) and multipart uploads
//! (`Upload`). Each carries the numeric status and a best-effort parsed body
//! so callers can branch on them directly. The `Display` text still embeds
//! status, status text and body for logs and terminal output.

use std::fmt;

use serde_json::Value;

/// Best-effort decoding of an error response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    /// The body parsed as JSON.
    Json(Value),
    /// The body was not JSON; kept verbatim.
    Text(String),
    /// The body was empty.
    Empty,
}

impl ErrorBody {
    /// Parse `raw` as JSON, falling back to the raw text.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return ErrorBody::Empty;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => ErrorBody::Json(value),
            Err(_) => ErrorBody::Text(raw.to_string()),
        }
    }

    /// Parse `raw` as JSON only; anything else collapses to `Empty`.
    /// The token endpoint reports failures this way.
    pub fn parse_json_only(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => ErrorBody::Json(value),
            Err(_) => ErrorBody::Empty,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ErrorBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The `detail` string DRF-style backends put in error bodies.
    pub fn detail(&self) -> Option<&str> {
        self.as_json()?.get("detail")?.as_str()
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorBody::Json(value) => write!(f, "{value}"),
            ErrorBody::Text(text) => write!(f, "{}", Value::String(text.clone())),
            ErrorBody::Empty => f.write_str("{}"),
        }
    }
}

/// Errors returned by `ApiClient` and `Session` operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A generic JSON-path call returned a non-2xx status.
    #[error("API request failed: {status} {status_text} - {body}")]
    Request {
        status: u16,
        status_text: String,
        body: ErrorBody,
    },

    /// The token endpoint rejected the credentials or failed.
    #[error("Login failed: {status} - {body}")]
    Login { status: u16, body: ErrorBody },

    /// A multipart upload returned a non-2xx status.
    #[error("Upload failed: {status} {status_text} - {body}")]
    Upload {
        status: u16,
        status_text: String,
        body: ErrorBody,
    },

    /// The request never produced a response (DNS, connect, TLS, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// A successful response did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(String),

    /// The token store could not be written.
    #[error("token storage failed: {0}")]
    Storage(String),
}

impl ApiError {
    /// HTTP status of a server-reported failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request { status, .. }
            | ApiError::Login { status, .. }
            | ApiError::Upload { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Parsed error body of a server-reported failure.
    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            ApiError::Request { body, .. }
            | ApiError::Login { body, .. }
            | ApiError::Upload { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}
