//! Error types for the core crate.

use thiserror::Error;

/// Errors raised while building core state from configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The backend list is empty.
    #[error("backend pool must contain at least one backend")]
    EmptyPool,

    /// A backend was configured with a weight of zero.
    #[error("backend {index} ({address}) has weight 0; weights must be >= 1")]
    ZeroWeight {
        /// Position of the backend in the configured list.
        index: usize,
        /// `host:port` of the offending backend.
        address: String,
    },

    /// A route rule points at a backend index that does not exist.
    #[error("route '{prefix}' targets backend {index}, but only {available} backends are configured")]
    UnknownRouteTarget {
        /// Path prefix of the rule.
        prefix: String,
        /// Backend index the rule refers to.
        index: usize,
        /// Number of configured backends.
        available: usize,
    },

    /// Any other invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
