//! Bastion Core functionality.
//!
//! This crate contains the domain models, configuration definitions, and the
//! decision engine that power the Bastion load balancer: weighted rotation over
//! a fixed backend pool, path-pinned routing, per-client rate limiting and a
//! short-lived response cache. Nothing in here touches a socket.

pub mod admission;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod load_balancer;
pub mod stats;

pub use error::CoreError;
