//! Bastion request filters
//!
//! Classifies a parsed request line before any admission or routing work is done.
//! Noise requests (favicon probes and the like) are dropped silently, dashboard
//! requests are answered locally, and everything else continues to the rate
//! limiter.

use bastion_core::config::FilterConfig;
use bastion_core::domain::request::RequestLine;

/// What the connection handler should do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Drop without a response. Not rate limited.
    Noise,
    /// Serve the stats dashboard. Not rate limited.
    Dashboard,
    /// Continue through rate limiting, cache and routing.
    Forward,
}

/// Matches request paths against the configured noise list and dashboard path.
#[derive(Debug, Clone)]
pub struct RequestFilter {
    noise_paths: Vec<String>,
    dashboard_path: String,
}

impl RequestFilter {
    /// Create a filter from configuration.
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            noise_paths: config.noise_paths.clone(),
            dashboard_path: config.dashboard_path.clone(),
        }
    }

    /// Path served by the dashboard.
    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }

    /// Classify a request by its path.
    ///
    /// Paths are compared exactly, ignoring any query string. Only `GET` and
    /// `HEAD` reach the dashboard; other methods on that path are forwarded.
    pub fn classify(&self, line: &RequestLine) -> RequestClass {
        let path = line.path();
        if self.noise_paths.iter().any(|noise| noise == path) {
            return RequestClass::Noise;
        }
        if path == self.dashboard_path && line.is_idempotent_read() {
            return RequestClass::Dashboard;
        }
        RequestClass::Forward
    }
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(raw: &str) -> RequestClass {
        RequestFilter::default().classify(&RequestLine::parse(raw.as_bytes()).unwrap())
    }

    #[test]
    fn favicon_is_noise() {
        assert_eq!(classify("GET /favicon.ico HTTP/1.1"), RequestClass::Noise);
        assert_eq!(classify("GET /favicon.ico?v=2 HTTP/1.1"), RequestClass::Noise);
    }

    #[test]
    fn stats_is_dashboard() {
        assert_eq!(classify("GET /stats HTTP/1.1"), RequestClass::Dashboard);
        assert_eq!(classify("GET /stats?refresh=1 HTTP/1.1"), RequestClass::Dashboard);
        assert_eq!(classify("HEAD /stats HTTP/1.1"), RequestClass::Dashboard);
    }

    #[test]
    fn writes_to_stats_path_are_forwarded() {
        assert_eq!(classify("POST /stats HTTP/1.1"), RequestClass::Forward);
    }

    #[test]
    fn similar_paths_are_forwarded() {
        assert_eq!(classify("GET /statsd HTTP/1.1"), RequestClass::Forward);
        assert_eq!(classify("GET /app1 HTTP/1.1"), RequestClass::Forward);
        assert_eq!(classify("GET / HTTP/1.1"), RequestClass::Forward);
    }

    #[test]
    fn custom_paths_are_honoured() {
        let filter = RequestFilter::new(&FilterConfig {
            noise_paths: vec!["/robots.txt".to_string()],
            dashboard_path: "/_lb".to_string(),
        });
        let line = |raw: &str| RequestLine::parse(raw.as_bytes()).unwrap();
        assert_eq!(filter.classify(&line("GET /robots.txt HTTP/1.1")), RequestClass::Noise);
        assert_eq!(filter.classify(&line("GET /_lb HTTP/1.1")), RequestClass::Dashboard);
        assert_eq!(filter.classify(&line("GET /favicon.ico HTTP/1.1")), RequestClass::Forward);
        assert_eq!(filter.dashboard_path(), "/_lb");
    }
}
