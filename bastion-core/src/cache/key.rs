//! Normalized cache keys.

use std::fmt;

use crate::domain::request::RequestLine;

/// Identifies one cacheable request: method, path, query and protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: String,
    path: String,
    query: Option<String>,
    version: String,
}

impl CacheKey {
    /// Key for `line`, or `None` when the method is not safe to replay.
    ///
    /// Only `GET` and `HEAD` are cached. The method is upper-cased and an empty
    /// query (`/p?`) is treated the same as no query.
    pub fn for_request(line: &RequestLine) -> Option<Self> {
        if !line.is_idempotent_read() {
            return None;
        }
        Some(Self {
            method: line.method().to_ascii_uppercase(),
            path: line.path().to_string(),
            query: line.query().filter(|q| !q.is_empty()).map(str::to_string),
            version: line.version().to_string(),
        })
    }

    /// Path component of the key.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        write!(f, " {}", self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> Option<CacheKey> {
        CacheKey::for_request(&RequestLine::parse(raw.as_bytes()).unwrap())
    }

    #[test]
    fn only_reads_are_cacheable() {
        assert!(key("GET / HTTP/1.1").is_some());
        assert!(key("HEAD / HTTP/1.1").is_some());
        assert!(key("POST / HTTP/1.1").is_none());
        assert!(key("DELETE /x HTTP/1.1").is_none());
    }

    #[test]
    fn key_distinguishes_query_method_and_version() {
        assert_ne!(key("GET /a?x=1 HTTP/1.1"), key("GET /a?x=2 HTTP/1.1"));
        assert_ne!(key("GET /a HTTP/1.1"), key("HEAD /a HTTP/1.1"));
        assert_ne!(key("GET /a HTTP/1.1"), key("GET /a HTTP/1.0"));
    }

    #[test]
    fn key_normalizes_method_case_and_empty_query() {
        assert_eq!(key("get /a HTTP/1.1"), key("GET /a HTTP/1.1"));
        assert_eq!(key("GET /a? HTTP/1.1"), key("GET /a HTTP/1.1"));
        assert_eq!(key("GET /a?b=1 HTTP/1.1").unwrap().to_string(), "GET /a?b=1 HTTP/1.1");
    }
}
