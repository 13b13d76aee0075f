//! Background prober for active TCP health checks.

use std::sync::Arc;
use std::time::Duration;

use bastion_core::config::HealthConfig;
use bastion_core::domain::backend::Backend;
use bastion_core::domain::pool::BackendPool;
use tokio::net::TcpStream;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};

/// Spawns a background Tokio task that probes every backend on a fixed interval
/// and updates its atomic liveness flag.
///
/// The first cycle runs immediately. The prober is the only writer of liveness
/// and shares nothing else with connection workers.
pub fn spawn_health_checker(pool: Arc<BackendPool>, config: HealthConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(config.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            probe_all(&pool, config.timeout()).await;
        }
    })
}

/// Probe all backends concurrently and record the results.
pub async fn probe_all(pool: &BackendPool, timeout: Duration) {
    let mut probes = JoinSet::new();
    for backend in pool.backends() {
        let backend = Arc::clone(backend);
        probes.spawn(async move {
            let alive = probe(&backend, timeout).await;
            (backend, alive)
        });
    }

    while let Some(result) = probes.join_next().await {
        match result {
            Ok((backend, alive)) => record(&backend, alive),
            Err(e) => tracing::error!(error = %e, "health probe task failed"),
        }
    }
}

/// A plain TCP connect: success within `timeout` means alive.
pub async fn probe(backend: &Backend, timeout: Duration) -> bool {
    matches!(
        time::timeout(timeout, TcpStream::connect((backend.host(), backend.port()))).await,
        Ok(Ok(_))
    )
}

/// Store the probe result, logging only on a state change.
fn record(backend: &Backend, alive: bool) {
    let was_alive = backend.set_alive(alive);
    match (was_alive, alive) {
        (true, false) => tracing::warn!(
            backend = %backend.address(),
            id = %backend.id,
            "backend is DOWN"
        ),
        (false, true) => tracing::info!(
            backend = %backend.address(),
            id = %backend.id,
            "backend is back ONLINE"
        ),
        _ => {}
    }
}
