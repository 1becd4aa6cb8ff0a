//! WebSocket realtime transport.
//!
//! Each socket gets a writer task fed by an unbounded channel, so `send`
//! never waits on a slow client. The read loop decodes JSON frames and hands
//! them to the attached [`ConnectionHandler`]s in arrival order.
//!
//! Security features:
//! - Message size limit (default 1MB), oversized frames are dropped
//! - Connections only exist for identities resolved at upgrade time

use crate::domain::config::RealtimeConfig;
use crate::ports::transport::{
    Connection, ConnectionHandler, ConnectionId, HandlerId, RealtimeTransport,
};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use pubsub_core::{BusError, BusResult, Identity, Named};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// What the read loop does with one inbound WebSocket message.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    Frame(Value),
    Ping(Vec<u8>),
    Close,
    Skip,
}

pub struct WebSocketTransport {
    name: String,
    max_message_size: usize,
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    handlers: RwLock<Vec<(HandlerId, Arc<dyn ConnectionHandler>)>>,
    next_handler: AtomicU64,
}

impl WebSocketTransport {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            name: config.transport_name.clone(),
            max_message_size: config.max_message_size,
            connections: DashMap::new(),
            handlers: RwLock::new(Vec::new()),
            next_handler: AtomicU64::new(1),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Drive one upgraded socket until it closes.
    pub async fn serve_socket(self: Arc<Self>, socket: WebSocket, identity: Identity) {
        let connection = Connection::new(identity);
        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        self.connections.insert(connection.id, tx.clone());

        info!(
            connection_id = %connection.id,
            user = %connection.identity.username,
            "New WebSocket connection"
        );

        let connection_id = connection.id;
        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    debug!(connection_id = %connection_id, error = %e, "WebSocket write failed");
                    break;
                }
            }
        });

        while let Some(result) = stream.next().await {
            let message = match result {
                Ok(message) => message,
                Err(e) => {
                    warn!(connection_id = %connection.id, error = %e, "WebSocket error");
                    break;
                }
            };

            match self.decode(&connection, message) {
                Inbound::Frame(frame) => self.dispatch(&connection, frame).await,
                Inbound::Ping(data) => {
                    if tx.send(Message::Pong(data)).is_err() {
                        break;
                    }
                }
                Inbound::Close => {
                    debug!(connection_id = %connection.id, "WebSocket close received");
                    break;
                }
                Inbound::Skip => {}
            }
        }

        self.connections.remove(&connection.id);
        drop(tx);
        writer.abort();

        let handlers = self.snapshot();
        for handler in handlers {
            handler.on_disconnect(connection.id).await;
        }

        info!(connection_id = %connection.id, "WebSocket connection closed");
    }

    pub(crate) fn decode(&self, connection: &Connection, message: Message) -> Inbound {
        let bytes = match &message {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) => data.as_slice(),
            Message::Ping(data) => return Inbound::Ping(data.clone()),
            Message::Pong(_) => return Inbound::Skip,
            Message::Close(_) => return Inbound::Close,
        };

        if bytes.len() > self.max_message_size {
            warn!(
                connection_id = %connection.id,
                size = bytes.len(),
                max = self.max_message_size,
                "Message exceeds size limit"
            );
            return Inbound::Skip;
        }

        match serde_json::from_slice(bytes) {
            Ok(frame) => Inbound::Frame(frame),
            Err(e) => {
                warn!(connection_id = %connection.id, error = %e, "Dropping non-JSON message");
                Inbound::Skip
            }
        }
    }

    async fn dispatch(&self, connection: &Connection, frame: Value) {
        let handlers = self.snapshot();
        if handlers.is_empty() {
            debug!(connection_id = %connection.id, "No handler attached, dropping message");
        }
        for handler in handlers {
            handler.on_message(connection, frame.clone()).await;
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn ConnectionHandler>> {
        self.handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }
}

impl Named for WebSocketTransport {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl RealtimeTransport for WebSocketTransport {
    fn add_handler(&self, handler: Arc<dyn ConnectionHandler>) -> HandlerId {
        let id = self.next_handler.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().push((id, handler));
        id
    }

    fn remove_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    async fn send(&self, connection: ConnectionId, frame: Value) -> BusResult<()> {
        let sender = self
            .connections
            .get(&connection)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BusError::transport(format!("unknown connection {connection}")))?;

        sender.send(Message::Text(frame.to_string())).map_err(|_| {
            error!(connection_id = %connection, "WebSocket writer gone");
            BusError::transport(format!("connection {connection} closed"))
        })
    }
}
