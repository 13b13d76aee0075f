//! The fixed backend pool and its weighted rotation.

use std::num::NonZeroU32;
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::domain::backend::{Backend, BackendId, SharedBackend};
use crate::error::CoreError;
use crate::load_balancer::weighted::WeightedDistribution;

/// Backends created once at start-up, plus the rotation table built from their weights.
///
/// The backend list is immutable after construction. Liveness and request counters
/// live inside each [`Backend`] as atomics, and the rotation cursor lives inside the
/// [`WeightedDistribution`], so the pool can be shared behind an `Arc` without locks.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<SharedBackend>,
    distribution: WeightedDistribution,
}

impl BackendPool {
    /// Build the pool from configuration, rejecting an empty list or zero weights.
    pub fn from_config(configs: &[BackendConfig]) -> Result<Self, CoreError> {
        if configs.is_empty() {
            return Err(CoreError::EmptyPool);
        }

        let backends = configs
            .iter()
            .enumerate()
            .map(|(index, cfg)| {
                let weight = NonZeroU32::new(cfg.weight).ok_or_else(|| CoreError::ZeroWeight {
                    index,
                    address: cfg.address(),
                })?;
                Ok(Arc::new(Backend::new(BackendId(index), cfg.host.clone(), cfg.port, weight)))
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(Self::new(backends))
    }

    /// Build the pool from already constructed backends.
    ///
    /// Backend ids are expected to match their position in `backends`.
    pub fn new(backends: Vec<SharedBackend>) -> Self {
        let distribution = WeightedDistribution::new(backends.iter().map(|b| b.weight()));
        Self {
            backends,
            distribution,
        }
    }

    /// All backends in configuration order.
    pub fn backends(&self) -> &[SharedBackend] {
        &self.backends
    }

    /// Look up a backend by id.
    pub fn get(&self, id: BackendId) -> Option<&SharedBackend> {
        self.backends.get(id.0)
    }

    /// Number of backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether the pool is empty. Never true for a pool built from configuration.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Number of backends currently marked alive.
    pub fn alive_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_alive()).count()
    }

    /// The rotation table.
    pub fn distribution(&self) -> &WeightedDistribution {
        &self.distribution
    }

    /// Dispense the next alive backend from the weighted rotation.
    ///
    /// Scans at most one full cycle; returns `None` when no backend is alive.
    pub fn pick_by_rotation(&self) -> Option<SharedBackend> {
        self.distribution
            .next_matching(|idx| self.backends[idx].is_alive())
            .map(|idx| Arc::clone(&self.backends[idx]))
    }
}
