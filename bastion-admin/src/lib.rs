//! Bastion admin surface
//!
//! A read-only view over the load balancer's state: an HTML dashboard that the
//! proxy serves in-band on its stats path, and an optional separate HTTP listener
//! exposing the same snapshot as HTML and JSON plus a liveness endpoint.

pub mod dashboard;
pub mod server;

use bastion_core::stats::StatsSnapshot;

/// Anything that can produce a consistent stats snapshot on demand.
pub trait SnapshotSource: Send + Sync {
    /// Capture the current state. Must not mutate anything.
    fn snapshot(&self) -> StatsSnapshot;
}
