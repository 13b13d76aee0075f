//! Read-only snapshots of engine state for the dashboard.

use std::time::Instant;

use serde::Serialize;

use crate::admission::RateLimiter;
use crate::cache::ResponseCache;
use crate::domain::pool::BackendPool;
use crate::domain::routing::RoutingPolicy;

/// Point-in-time view of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStats {
    /// Position in the configured pool.
    pub id: usize,
    /// `host:port`
    pub address: String,
    /// Rotation weight.
    pub weight: u32,
    /// Last known liveness.
    pub alive: bool,
    /// Requests forwarded so far.
    pub requests: u64,
}

/// A currently banned client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BannedClient {
    /// Client IP address.
    pub client: String,
    /// Seconds left on the ban, rounded up.
    pub remaining_secs: u64,
}

/// Everything the dashboard shows, captured in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Backends in configuration order.
    pub backends: Vec<BackendStats>,
    /// Entries currently held by the response cache.
    pub cache_entries: usize,
    /// Cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Clients with a rate limit record.
    pub tracked_clients: usize,
    /// Clients currently banned.
    pub banned: Vec<BannedClient>,
    /// Pinned requests that fell back to rotation.
    pub pinned_fallbacks: u64,
}

impl StatsSnapshot {
    /// Read the current state. Nothing is mutated.
    pub fn capture(
        pool: &BackendPool,
        policy: &RoutingPolicy,
        limiter: &RateLimiter,
        cache: &ResponseCache,
    ) -> Self {
        let now = Instant::now();
        Self {
            backends: pool
                .backends()
                .iter()
                .map(|b| BackendStats {
                    id: b.id.0,
                    address: b.address(),
                    weight: b.weight().get(),
                    alive: b.is_alive(),
                    requests: b.request_count(),
                })
                .collect(),
            cache_entries: cache.len(),
            cache_ttl_secs: cache.ttl().as_secs(),
            tracked_clients: limiter.tracked_clients(),
            banned: limiter
                .banned_clients(now)
                .into_iter()
                .map(|ban| BannedClient {
                    client: ban.client.to_string(),
                    remaining_secs: ban.remaining_secs(),
                })
                .collect(),
            pinned_fallbacks: policy.fallback_count(),
        }
    }

    /// Number of backends currently alive.
    pub fn alive_backends(&self) -> usize {
        self.backends.iter().filter(|b| b.alive).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn capture_reflects_engine_state() {
        let config = ProxyConfig::default();
        let pool = BackendPool::from_config(&config.backends).unwrap();
        let policy = RoutingPolicy::from_config(&config.routes, &pool).unwrap();
        let limiter = RateLimiter::from_config(&config.rate_limit);
        let cache = ResponseCache::from_config(&config.cache);

        pool.backends()[2].set_alive(false);
        pool.backends()[0].record_request();
        let client = IpAddr::V4(Ipv4Addr::LOCALHOST);
        for _ in 0..6 {
            limiter.check(client);
        }

        let snap = StatsSnapshot::capture(&pool, &policy, &limiter, &cache);
        assert_eq!(snap.backends.len(), 3);
        assert_eq!(snap.backends[0].requests, 1);
        assert_eq!(snap.backends[0].address, "127.0.0.1:9001");
        assert!(!snap.backends[2].alive);
        assert_eq!(snap.alive_backends(), 2);
        assert_eq!(snap.cache_ttl_secs, 4);
        assert_eq!(snap.tracked_clients, 1);
        assert_eq!(snap.banned.len(), 1);
        assert_eq!(snap.banned[0].client, "127.0.0.1");
        assert_eq!(snap.banned[0].remaining_secs, 30);
    }
}
