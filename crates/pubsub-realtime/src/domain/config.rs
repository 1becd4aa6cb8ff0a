//! Realtime handler and WebSocket transport configuration.

use pubsub_core::{BusError, BusResult};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Default transport the handler attaches to.
pub const DEFAULT_TRANSPORT_NAME: &str = "websocket";

/// Default maximum inbound frame size (1MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default WebSocket port
pub const DEFAULT_PORT: u16 = 8546;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RealtimeConfig {
    /// Name of the transport unit, as registered with the host
    pub transport_name: String,
    /// Maximum inbound frame size in bytes
    pub max_message_size: usize,
    /// Listen address of the WebSocket server
    pub bind_address: SocketAddr,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            transport_name: DEFAULT_TRANSPORT_NAME.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
        }
    }
}

impl RealtimeConfig {
    pub fn validate(&self) -> BusResult<()> {
        if self.transport_name.trim().is_empty() {
            return Err(BusError::Configuration(
                "transportName cannot be empty".into(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(BusError::Configuration(
                "maxMessageSize cannot be 0".into(),
            ));
        }
        Ok(())
    }
}
