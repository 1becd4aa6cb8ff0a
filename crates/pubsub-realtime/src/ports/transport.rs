//! Realtime transport ports.
//!
//! A transport owns the client connections; the protocol handler plugs
//! into it as a [`ConnectionHandler`] and answers through
//! [`RealtimeTransport::send`].

use async_trait::async_trait;
use pubsub_core::{BusResult, Identity, Named, NamedRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifies one client connection for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle returned by [`RealtimeTransport::add_handler`].
pub type HandlerId = u64;

/// An open client connection and the identity the host resolved for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
}

impl Connection {
    pub fn new(identity: Identity) -> Self {
        Self {
            id: ConnectionId::new(),
            identity,
        }
    }
}

/// Receives inbound traffic of a transport.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// A JSON frame arrived on `connection`.
    async fn on_message(&self, connection: &Connection, frame: Value);

    /// `connection` is gone. Called once per connection.
    async fn on_disconnect(&self, connection: ConnectionId);
}

/// Connection-oriented duplex transport, loaded by the host as a named unit.
#[async_trait]
pub trait RealtimeTransport: Named + Send + Sync {
    fn add_handler(&self, handler: Arc<dyn ConnectionHandler>) -> HandlerId;

    /// Returns false if the handler was not attached.
    fn remove_handler(&self, id: HandlerId) -> bool;

    /// Send a frame to one connection.
    ///
    /// # Errors
    ///
    /// `Transport` if the connection is unknown or closed.
    async fn send(&self, connection: ConnectionId, frame: Value) -> BusResult<()>;
}

/// Registry of realtime transports, keyed by transport name.
pub type TransportRegistry = NamedRegistry<dyn RealtimeTransport>;
