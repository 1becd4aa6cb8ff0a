//! Domain layer: wire protocol, sessions and configuration.

pub mod config;
pub mod protocol;
pub mod session;

pub use config::{RealtimeConfig, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_TRANSPORT_NAME};
pub use protocol::{error_response, push_message, success_response, ClientCommand, Command};
pub use session::{Session, SessionSubscription};
