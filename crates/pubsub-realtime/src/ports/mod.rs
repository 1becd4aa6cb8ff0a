//! Ports layer: the realtime transport seam.

pub mod transport;

pub use transport::{
    Connection, ConnectionHandler, ConnectionId, HandlerId, RealtimeTransport, TransportRegistry,
};
