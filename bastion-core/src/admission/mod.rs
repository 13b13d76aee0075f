//! Per-client admission control.

pub mod limiter;

pub use limiter::{BanEntry, RateDecision, RateLimiter};
