//! Small, fully-buffered responses
//!
//! Used for redirects, listings and error bodies. File content is streamed
//! elsewhere and never goes through this type.

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;

/// Response produced without touching file content
#[derive(Debug)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Bytes>,
}

/// JSON error body: a stable code plus a short message
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: &'a str,
    pub message: &'a str,
}

impl HandlerResponse {
    /// Create a simple response with status code
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a response with body
    pub fn with_body(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    /// Add a header
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Create redirect response
    pub fn redirect(to: &str, status: StatusCode) -> Self {
        Self::status(status).header("Location", to)
    }

    /// HTML page
    pub fn html(body: String) -> Self {
        Self::with_body(StatusCode::OK, body).header("Content-Type", "text/html; charset=utf-8")
    }

    /// JSON error with a machine readable code
    pub fn error(status: StatusCode, code: &str, message: &str) -> Self {
        let body = serde_json::to_vec(&ErrorBody { code, message })
            .unwrap_or_else(|_| b"{\"code\":\"internal\"}".to_vec());
        Self::with_body(status, body).header("Content-Type", "application/json")
    }

    /// Create not found response
    pub fn not_found() -> Self {
        Self::error(StatusCode::NOT_FOUND, "not_found", "Not Found")
    }

    /// Create internal server error response
    pub fn internal_error() -> Self {
        Self::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Internal Server Error",
        )
    }

    /// Method not allowed, listing what is
    pub fn method_not_allowed(allow: &str) -> Self {
        Self::error(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "Method Not Allowed",
        )
        .header("Allow", allow)
    }

    /// Look up a header that was set on this response
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
