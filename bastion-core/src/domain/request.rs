//! Minimal HTTP/1.x request head inspection.
//!
//! The proxy forwards request bytes verbatim, so this only extracts what routing,
//! filtering and caching need: the request line, and enough of the head to know
//! when a request has been read completely.

use std::fmt;

use thiserror::Error;

/// Reasons a request line could not be understood.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestLineError {
    /// No bytes, or only whitespace, before the first line break.
    #[error("empty request line")]
    Empty,

    /// The line does not have the `METHOD TARGET VERSION` shape.
    #[error("malformed request line: {0:?}")]
    Malformed(String),
}

/// The first line of an HTTP/1.x request, e.g. `GET /app1?x=1 HTTP/1.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: String,
    target: String,
    version: String,
}

impl RequestLine {
    /// Parse the request line at the start of a raw request buffer.
    pub fn parse(raw: &[u8]) -> Result<Self, RequestLineError> {
        let end = raw
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(raw.len());
        let line = String::from_utf8_lossy(&raw[..end]);
        let line = line.trim();
        if line.is_empty() {
            return Err(RequestLineError::Empty);
        }

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(target), Some(version), None)
                if version.starts_with("HTTP/") && method.bytes().all(|b| b.is_ascii_alphabetic()) =>
            {
                Ok(Self {
                    method: method.to_string(),
                    target: target.to_string(),
                    version: version.to_string(),
                })
            }
            _ => Err(RequestLineError::Malformed(line.to_string())),
        }
    }

    /// Request method as sent, e.g. `GET`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Full request target including any query string.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Path component of the target.
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(path, _)| path)
    }

    /// Query component of the target, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    /// Protocol version, e.g. `HTTP/1.1`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// `GET` and `HEAD`, the methods whose responses may be replayed.
    pub fn is_idempotent_read(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET") || self.method.eq_ignore_ascii_case("HEAD")
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.target, self.version)
    }
}

/// Length of the request head including the blank line, once it has been fully received.
pub fn head_len(buf: &[u8]) -> Option<usize> {
    if let Some(pos) = find(buf, b"\r\n\r\n") {
        return Some(pos + 4);
    }
    find(buf, b"\n\n").map(|pos| pos + 2)
}

/// Declared `Content-Length` of a request head, if any.
pub fn content_length(head: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(head)
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Total size of the request once fully received: the head plus its declared body.
///
/// `None` until the head is complete. A declared length too large to add saturates
/// at `usize::MAX`, so callers comparing against a byte limit reject it.
pub fn expected_len(buf: &[u8]) -> Option<usize> {
    let head = head_len(buf)?;
    Some(head.saturating_add(content_length(&buf[..head]).unwrap_or(0)))
}

/// Whether `buf` holds a whole request: the head plus any declared body.
pub fn is_complete(buf: &[u8]) -> bool {
    expected_len(buf).is_some_and(|len| buf.len() >= len)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
