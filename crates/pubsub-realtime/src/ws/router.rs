//! HTTP surface of the WebSocket transport.
//!
//! The host's authentication layer runs in front of this router and passes
//! the resolved identity in request headers.

use crate::ws::transport::WebSocketTransport;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use pubsub_core::Identity;
use std::sync::Arc;
use tracing::warn;

/// Authenticated username.
pub const USER_HEADER: &str = "x-auth-user";

/// Comma-separated roles of the authenticated user.
pub const ROLES_HEADER: &str = "x-auth-roles";

/// Path the WebSocket endpoint is served on.
pub const WS_PATH: &str = "/ws";

pub fn router(transport: Arc<WebSocketTransport>) -> Router {
    Router::new()
        .route(WS_PATH, get(upgrade))
        .with_state(transport)
}

async fn upgrade(
    State(transport): State<Arc<WebSocketTransport>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(identity) = identity_from_headers(&headers) else {
        warn!("Rejected WebSocket upgrade without identity");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    ws.on_upgrade(move |socket| transport.serve_socket(socket, identity))
}

/// Identity carried by the request, if any.
pub fn identity_from_headers(headers: &HeaderMap) -> Option<Identity> {
    let username = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())?;

    let roles: Vec<&str> = headers
        .get(ROLES_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|roles| {
            roles
                .split(',')
                .map(str::trim)
                .filter(|role| !role.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(Identity::new(username, roles))
}
