//! Adapters layer: concrete implementations of the driven ports.

pub mod acl_source;
pub mod broadcast_provider;
pub mod plugin_host;

pub use acl_source::{JsonFileAclSource, NoAclSource, StaticAclSource};
pub use broadcast_provider::{BroadcastProvider, BrokerEnvelope, BrokerLink};
pub use plugin_host::PluginHost;
