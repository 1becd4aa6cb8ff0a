//! # pubsub-realtime
//!
//! Remote access to the pubsub bus over a duplex realtime transport.
//!
//! ## Architecture
//!
//! ```text
//! client ⇄ WebSocketTransport ──ConnectionHandler──→ RealtimeProtocolHandler ──MessagingApi──→ bus
//!                ▲                                            │
//!                └──────────── RealtimeTransport::send ───────┘
//! ```
//!
//! ## Protocol
//!
//! Clients send `{messageId, command, topic[, message]}` with `command` one
//! of `subscribe`, `unsubscribe`, `publish`, and get `{messageId, success}`
//! or `{messageId, error, message}` back. Deliveries for their
//! subscriptions arrive as `{remoteMessage: true, topic, message}`.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod error;
pub mod handler;
pub mod ports;
pub mod ws;

// Re-exports for public API
pub use domain::config::RealtimeConfig;
pub use domain::protocol::{ClientCommand, Command};
pub use error::{RealtimeError, RealtimeResult};
pub use handler::RealtimeProtocolHandler;
pub use ports::{
    Connection, ConnectionHandler, ConnectionId, HandlerId, RealtimeTransport, TransportRegistry,
};
pub use ws::{router, WebSocketTransport};
