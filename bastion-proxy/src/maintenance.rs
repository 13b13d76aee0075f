//! Periodic cleanup of expired cache entries and idle rate limit records.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::state::ProxyState;

/// What one sweep removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    pub expired_entries: usize,
    pub evicted_clients: usize,
}

pub fn spawn_maintenance(state: Arc<ProxyState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(state.sweep_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            interval.tick().await;
            let report = sweep(&state, Instant::now());
            if report != SweepReport::default() {
                tracing::debug!(
                    expired_entries = report.expired_entries,
                    evicted_clients = report.evicted_clients,
                    "maintenance sweep"
                );
            }
        }
    })
}

pub fn sweep(state: &ProxyState, now: Instant) -> SweepReport {
    SweepReport {
        expired_entries: state.cache.purge_expired(now),
        evicted_clients: state.limiter.evict_idle(now, state.client_idle_after),
    }
}
