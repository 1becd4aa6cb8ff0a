//! Realtime handler errors.

use crate::ports::transport::ConnectionId;
use pubsub_core::BusError;
use thiserror::Error;

pub type RealtimeResult<T> = Result<T, RealtimeError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    /// Rejected by the messaging core
    #[error(transparent)]
    Bus(#[from] BusError),

    /// `unsubscribe` for a topic the connection never subscribed to
    #[error("Not subscribed to topic {topic:?}")]
    NotSubscribed { topic: String },

    /// Push to a connection whose session is gone
    #[error("Connection {connection} is closed")]
    ConnectionClosed { connection: ConnectionId },

    /// The transport unit is not loaded
    #[error("No realtime transport {name:?} active")]
    NoTransport { name: String },
}
