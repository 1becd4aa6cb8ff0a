//! WebSocket transport adapter (axum).

pub mod router;
pub mod transport;

pub use router::{identity_from_headers, router, ROLES_HEADER, USER_HEADER, WS_PATH};
pub use transport::WebSocketTransport;
