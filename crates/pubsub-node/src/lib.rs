//! # Pubsub Node
//!
//! Server process hosting the messaging core and its realtime endpoint.
//!
//! ```text
//! PluginHost ──load/unload──→ ExternalProviderRegistry ──→ MessagingCore
//!     │                                                       ▲
//!     └──────load/unload──→ TransportRegistry ──→ RealtimeProtocolHandler
//!                                  │
//!                           WebSocketTransport ⇄ clients (/ws)
//! ```

pub mod config;
pub mod runtime;

pub use config::{load_config, NodeConfig};
pub use runtime::NodeRuntime;
