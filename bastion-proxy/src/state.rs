//! Shared state handed to every connection worker.

use std::sync::Arc;
use std::time::Duration;

use bastion_admin::SnapshotSource;
use bastion_core::admission::RateLimiter;
use bastion_core::cache::ResponseCache;
use bastion_core::config::{LimitsConfig, ProxyConfig, TimeoutConfig};
use bastion_core::domain::pool::BackendPool;
use bastion_core::domain::routing::RoutingPolicy;
use bastion_core::stats::StatsSnapshot;
use bastion_core::CoreError;
use bastion_filters::RequestFilter;

/// Engine components plus the per-connection settings.
///
/// Each component guards its own mutable state, so the struct itself is shared
/// as a plain `Arc<ProxyState>`.
#[derive(Debug)]
pub struct ProxyState {
    /// Shared with the health prober, which is its only liveness writer.
    pub pool: Arc<BackendPool>,
    pub policy: RoutingPolicy,
    pub limiter: RateLimiter,
    pub cache: ResponseCache,
    pub filter: RequestFilter,
    pub timeouts: TimeoutConfig,
    pub limits: LimitsConfig,
    /// Interval of the maintenance sweep.
    pub sweep_every: Duration,
    /// Idle time after which a rate limit record is dropped.
    pub client_idle_after: Duration,
}

impl ProxyState {
    /// Validate `config` and build every component from it.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let pool = BackendPool::from_config(&config.backends)?;
        let policy = RoutingPolicy::from_config(&config.routes, &pool)?;

        Ok(Self {
            pool: Arc::new(pool),
            policy,
            limiter: RateLimiter::from_config(&config.rate_limit),
            cache: ResponseCache::from_config(&config.cache),
            filter: RequestFilter::new(&config.filters),
            timeouts: config.timeouts.clone(),
            limits: config.limits.clone(),
            sweep_every: config.rate_limit.window(),
            client_idle_after: config.rate_limit.idle_after(),
        })
    }
}

impl SnapshotSource for ProxyState {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::capture(&self.pool, &self.policy, &self.limiter, &self.cache)
    }
}
