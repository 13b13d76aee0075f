//! Domain models shared by every Bastion component.

pub mod backend;
pub mod pool;
pub mod request;
pub mod routing;
