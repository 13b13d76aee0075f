//! Load balancing primitives.

pub mod weighted;
