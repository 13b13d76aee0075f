//! Backend server models.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A unique identifier for a backend server.
///
/// The value is the backend's position in the configured list, which is also the
/// index used by route rules and the weighted distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(pub usize);

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Represents a single upstream backend server
#[derive(Debug)]
pub struct Backend {
    /// The unique ID of the backend
    pub id: BackendId,
    host: String,
    port: u16,
    weight: NonZeroU32,
    /// Written only by the health monitor.
    alive: AtomicBool,
    /// Incremented once per forwarded, non-cached request.
    requests: AtomicU64,
}

impl Backend {
    /// Create a new backend. Backends start out alive until the first probe says otherwise.
    pub fn new(id: BackendId, host: impl Into<String>, port: u16, weight: NonZeroU32) -> Self {
        Self {
            id,
            host: host.into(),
            port,
            weight,
            alive: AtomicBool::new(true),
            requests: AtomicU64::new(0),
        }
    }

    /// Host name or IP literal of the backend.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port of the backend.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, suitable for logging and display.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Static rotation weight.
    pub fn weight(&self) -> NonZeroU32 {
        self.weight
    }

    /// Check if the backend is currently considered alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Update the liveness of the backend, returning the previous value.
    pub fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::AcqRel)
    }

    /// Count one request forwarded to this backend.
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Total requests forwarded to this backend since start-up.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

/// A thread-safe reference to a Backend.
pub type SharedBackend = Arc<Backend>;

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> Backend {
        Backend::new(BackendId(0), "127.0.0.1", 9001, NonZeroU32::new(3).unwrap())
    }

    #[test]
    fn starts_alive_with_zero_requests() {
        let b = backend();
        assert!(b.is_alive());
        assert_eq!(b.request_count(), 0);
        assert_eq!(b.address(), "127.0.0.1:9001");
        assert_eq!(b.weight().get(), 3);
    }

    #[test]
    fn set_alive_reports_previous_state() {
        let b = backend();
        assert!(b.set_alive(false));
        assert!(!b.is_alive());
        assert!(!b.set_alive(false));
        assert!(!b.set_alive(true));
        assert!(b.is_alive());
    }

    #[test]
    fn request_counter_is_shared_across_threads() {
        let b = Arc::new(backend());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let b = Arc::clone(&b);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        b.record_request();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(b.request_count(), 8000);
    }
}
