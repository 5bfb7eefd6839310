//! Single-range `Range` header support (RFC 7233)
//!
//! Only one `bytes=` range per request is honoured. Malformed or multi-range
//! headers are not errors for the client: the caller serves full content.
//! An unsatisfiable range is the one case that produces a 416.

use thiserror::Error;

/// A resolved, inclusive byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub length: u64,
}

impl ByteRange {
    /// `Content-Range` value for a 206 response
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("invalid range header")]
    Invalid,

    #[error("range not satisfiable")]
    Unsatisfiable,

    #[error("multiple ranges are not supported")]
    MultipleRanges,
}

/// What the content server should send for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeDecision {
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

/// `Content-Range` value for a 416 response
pub fn unsatisfiable_content_range(size: u64) -> String {
    format!("bytes */{}", size)
}

/// Parse a `Range` header against a known content length
///
/// An empty header yields `Ok(None)`.
pub fn parse_range(header: &str, size: u64) -> Result<Option<ByteRange>, RangeError> {
    let header = header.trim();
    if header.is_empty() {
        return Ok(None);
    }

    let spec = header.strip_prefix("bytes=").ok_or(RangeError::Invalid)?;
    if spec.contains(',') {
        return Err(RangeError::MultipleRanges);
    }

    let mut parts = spec.trim().split('-');
    let (first, second) = match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(second), None) => (first.trim(), second.trim()),
        _ => return Err(RangeError::Invalid),
    };

    let (start, end) = match (first.is_empty(), second.is_empty()) {
        (true, true) => return Err(RangeError::Invalid),
        // suffix: the last N bytes
        (true, false) => {
            let suffix = parse_number(second)?;
            if suffix == 0 {
                return Err(RangeError::Invalid);
            }
            if size == 0 {
                return Err(RangeError::Unsatisfiable);
            }
            (size.saturating_sub(suffix), size - 1)
        }
        // open ended: from N to the end
        (false, true) => {
            let start = parse_number(first)?;
            if start >= size {
                return Err(RangeError::Unsatisfiable);
            }
            (start, size - 1)
        }
        (false, false) => {
            let start = parse_number(first)?;
            let end = parse_number(second)?;
            if end < start {
                return Err(RangeError::Invalid);
            }
            if start >= size {
                return Err(RangeError::Unsatisfiable);
            }
            (start, end.min(size - 1))
        }
    };

    Ok(Some(ByteRange {
        start,
        end,
        length: end - start + 1,
    }))
}

fn parse_number(s: &str) -> Result<u64, RangeError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Invalid);
    }
    s.parse().map_err(|_| RangeError::Invalid)
}

/// Apply the caller policy to an optional `Range` header
pub fn negotiate(header: Option<&str>, size: u64) -> RangeDecision {
    let Some(header) = header else {
        return RangeDecision::Full;
    };
    match parse_range(header, size) {
        Ok(Some(range)) => RangeDecision::Partial(range),
        Ok(None) => RangeDecision::Full,
        Err(RangeError::Unsatisfiable) => RangeDecision::Unsatisfiable,
        Err(e) => {
            tracing::debug!(header, error = %e, "Ignoring range header");
            RangeDecision::Full
        }
    }
}
