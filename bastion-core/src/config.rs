//! Static configuration for a Bastion instance.
//!
//! Every section implements `Default` and is marked `#[serde(default)]`, so a
//! configuration file only needs to name the values it changes. The defaults
//! describe three local backends on ports 9001-9003 with equal weights.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Address the proxy listener binds to.
    pub listen: SocketAddr,
    /// Optional separate address serving the admin endpoints.
    pub admin_listen: Option<SocketAddr>,
    /// Fixed backend pool, in rotation order.
    pub backends: Vec<BackendConfig>,
    /// Path pinning rules, checked in order.
    pub routes: Vec<RouteRuleConfig>,
    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,
    /// Response cache.
    pub cache: CacheConfig,
    /// Background health probing.
    pub health: HealthConfig,
    /// Socket deadlines.
    pub timeouts: TimeoutConfig,
    /// Admission and size limits.
    pub limits: LimitsConfig,
    /// Request classification.
    pub filters: FilterConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            admin_listen: None,
            backends: (9001..=9003)
                .map(|port| BackendConfig {
                    host: "127.0.0.1".to_string(),
                    port,
                    weight: 3,
                })
                .collect(),
            routes: vec![
                RouteRuleConfig {
                    prefix: "/app1".to_string(),
                    backend: 0,
                    method: Some("GET".to_string()),
                },
                RouteRuleConfig {
                    prefix: "/app2".to_string(),
                    backend: 1,
                    method: Some("GET".to_string()),
                },
            ],
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            health: HealthConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            filters: FilterConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Check cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.backends.is_empty() {
            return Err(CoreError::EmptyPool);
        }
        for (index, backend) in self.backends.iter().enumerate() {
            if backend.weight == 0 {
                return Err(CoreError::ZeroWeight {
                    index,
                    address: backend.address(),
                });
            }
        }
        for rule in &self.routes {
            if rule.backend >= self.backends.len() {
                return Err(CoreError::UnknownRouteTarget {
                    prefix: rule.prefix.clone(),
                    index: rule.backend,
                    available: self.backends.len(),
                });
            }
            if !rule.prefix.starts_with('/') {
                return Err(invalid(format!("route prefix '{}' must start with '/'", rule.prefix)));
            }
        }

        let rl = &self.rate_limit;
        if rl.window_secs == 0 || rl.max_requests == 0 || rl.ban_secs == 0 {
            return Err(invalid("rate_limit window_secs, max_requests and ban_secs must be > 0"));
        }
        if rl.idle_eviction_windows == 0 {
            return Err(invalid("rate_limit.idle_eviction_windows must be > 0"));
        }
        if self.cache.ttl_secs == 0 || self.cache.max_entries == 0 {
            return Err(invalid("cache ttl_secs and max_entries must be > 0"));
        }
        if self.health.interval_secs == 0 || self.health.timeout_ms == 0 {
            return Err(invalid("health interval_secs and timeout_ms must be > 0"));
        }
        let t = &self.timeouts;
        if t.client_read_ms == 0
            || t.client_write_ms == 0
            || t.backend_connect_ms == 0
            || t.backend_io_ms == 0
        {
            return Err(invalid("all timeouts must be > 0"));
        }
        if self.limits.max_connections == 0 || self.limits.max_request_bytes == 0 {
            return Err(invalid("limits max_connections and max_request_bytes must be > 0"));
        }
        if !self.filters.dashboard_path.starts_with('/') {
            return Err(invalid("filters.dashboard_path must start with '/'"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::InvalidConfig(message.into())
}

/// One backend of the fixed pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Host name or IP literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Rotation weight, at least 1.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl BackendConfig {
    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_weight() -> u32 {
    1
}

/// Pins requests whose path starts with `prefix` to one backend while it is alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRuleConfig {
    /// Literal path prefix, e.g. `/app1`.
    pub prefix: String,
    /// Index into `backends`.
    pub backend: usize,
    /// Restrict the rule to one method. `None` matches any method.
    #[serde(default)]
    pub method: Option<String>,
}

/// Sliding-window rate limit parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Length of the trailing window W.
    pub window_secs: u64,
    /// Requests N allowed per window.
    pub max_requests: usize,
    /// Ban duration B.
    pub ban_secs: u64,
    /// Client records idle for this many windows are evicted.
    pub idle_eviction_windows: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 10,
            max_requests: 5,
            ban_secs: 30,
            idle_eviction_windows: 3,
        }
    }
}

impl RateLimitConfig {
    /// Window W as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Ban duration B.
    pub fn ban(&self) -> Duration {
        Duration::from_secs(self.ban_secs)
    }

    /// Inactivity after which a client record may be dropped.
    pub fn idle_after(&self) -> Duration {
        self.window() * self.idle_eviction_windows
    }
}

/// Response cache parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime.
    pub ttl_secs: u64,
    /// Upper bound on stored entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 4,
            max_entries: 1024,
        }
    }
}

impl CacheConfig {
    /// Entry lifetime as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Health probe parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Time between probe cycles.
    pub interval_secs: u64,
    /// Connect timeout of a single probe.
    pub timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            timeout_ms: 2000,
        }
    }
}

impl HealthConfig {
    /// Probe cycle interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Per-probe connect timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Deadlines applied to every socket operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for reading a complete request from the client.
    pub client_read_ms: u64,
    /// Deadline for writing a response to the client.
    pub client_write_ms: u64,
    /// Deadline for establishing a backend connection.
    pub backend_connect_ms: u64,
    /// Deadline for sending the request to and reading the whole response from a backend.
    pub backend_io_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            client_read_ms: 5000,
            client_write_ms: 5000,
            backend_connect_ms: 2000,
            backend_io_ms: 5000,
        }
    }
}

impl TimeoutConfig {
    /// Client read deadline.
    pub fn client_read(&self) -> Duration {
        Duration::from_millis(self.client_read_ms)
    }

    /// Client write deadline.
    pub fn client_write(&self) -> Duration {
        Duration::from_millis(self.client_write_ms)
    }

    /// Backend connect deadline.
    pub fn backend_connect(&self) -> Duration {
        Duration::from_millis(self.backend_connect_ms)
    }

    /// Backend exchange deadline.
    pub fn backend_io(&self) -> Duration {
        Duration::from_millis(self.backend_io_ms)
    }
}

/// Admission control and size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Concurrent connection workers; further connections wait to be admitted.
    pub max_connections: usize,
    /// Largest request (head and body) accepted from a client.
    pub max_request_bytes: usize,
    /// Extra route selections attempted when a backend refuses the connection.
    pub connect_retries: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            max_request_bytes: 64 * 1024,
            connect_retries: 1,
        }
    }
}

/// Request classification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Paths dropped without any response.
    pub noise_paths: Vec<String>,
    /// Path answered by the stats dashboard.
    pub dashboard_path: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            noise_paths: vec!["/favicon.ico".to_string()],
            dashboard_path: "/stats".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ProxyConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.backends.len(), 3);
        assert!(config.backends.iter().all(|b| b.weight == 3));
        assert_eq!(config.rate_limit.idle_after(), Duration::from_secs(30));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            listen = "0.0.0.0:9000"

            [[backends]]
            host = "10.0.0.1"
            port = 80
            weight = 2

            [[backends]]
            host = "10.0.0.2"
            port = 80

            [cache]
            ttl_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.listen, SocketAddr::from(([0, 0, 0, 0], 9000)));
        assert_eq!(config.backends[1].weight, 1);
        assert_eq!(config.cache.ttl_secs, 10);
        assert_eq!(config.cache.max_entries, 1024);
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_empty_pool() {
        let config = ProxyConfig {
            backends: Vec::new(),
            routes: Vec::new(),
            ..ProxyConfig::default()
        };
        assert_eq!(config.validate(), Err(CoreError::EmptyPool));
    }

    #[test]
    fn rejects_zero_weight() {
        let mut config = ProxyConfig::default();
        config.backends[2].weight = 0;
        assert!(matches!(config.validate(), Err(CoreError::ZeroWeight { index: 2, .. })));
    }

    #[test]
    fn rejects_route_to_missing_backend() {
        let mut config = ProxyConfig::default();
        config.routes[0].backend = 7;
        assert!(matches!(
            config.validate(),
            Err(CoreError::UnknownRouteTarget { index: 7, available: 3, .. })
        ));
    }

    #[test]
    fn rejects_zero_durations() {
        let mut config = ProxyConfig::default();
        config.cache.ttl_secs = 0;
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));

        let mut config = ProxyConfig::default();
        config.timeouts.backend_io_ms = 0;
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }
}
