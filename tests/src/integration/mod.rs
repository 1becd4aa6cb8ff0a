//! Cross-crate integration flows.

pub mod cluster;
pub mod realtime;
pub mod routing;
