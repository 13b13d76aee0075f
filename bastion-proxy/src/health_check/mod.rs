//! Active backend health checking.

pub mod prober;
