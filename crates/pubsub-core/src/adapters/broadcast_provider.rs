//! # Broadcast Provider
//!
//! In-process [`ExternalProvider`] over a shared `tokio::sync::broadcast`
//! channel. Every bus instance attached to the same [`BrokerLink`] receives
//! every message sent on it, its own included, which is the fan-out an
//! external broker gives a cluster of servers.
//!
//! Useful for embedding several bus instances in one process and as a
//! stand-in broker in tests.

use crate::domain::registry::Named;
use crate::error::{BusError, BusResult};
use crate::ports::outbound::{ExternalProvider, InboundListener, ListenerId};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default number of in-flight envelopes per link.
pub const DEFAULT_LINK_CAPACITY: usize = 1024;

/// A message crossing the broker link.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerEnvelope {
    pub topic: String,
    pub payload: Value,
    /// Sent through `send_external`
    pub external: bool,
}

/// The shared "broker" several providers attach to.
#[derive(Debug, Clone)]
pub struct BrokerLink {
    sender: broadcast::Sender<BrokerEnvelope>,
}

impl BrokerLink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LINK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Number of providers currently attached.
    pub fn attached(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Raw feed of everything crossing the link.
    pub fn tap(&self) -> broadcast::Receiver<BrokerEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for BrokerLink {
    fn default() -> Self {
        Self::new()
    }
}

type ListenerTable = Arc<RwLock<Vec<(ListenerId, InboundListener)>>>;

pub struct BroadcastProvider {
    name: String,
    link: BrokerLink,
    listeners: ListenerTable,
    next_listener: AtomicU64,
    pump: JoinHandle<()>,
}

impl BroadcastProvider {
    /// Attach a provider named `name` to `link`.
    ///
    /// Spawns the inbound pump, so it must be called inside a tokio runtime.
    pub fn new(name: impl Into<String>, link: &BrokerLink) -> Self {
        let name = name.into();
        let listeners: ListenerTable = Arc::new(RwLock::new(Vec::new()));
        let pump = tokio::spawn(pump(
            name.clone(),
            link.sender.subscribe(),
            Arc::clone(&listeners),
        ));

        Self {
            name,
            link: link.clone(),
            listeners,
            next_listener: AtomicU64::new(1),
            pump,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn send(&self, topic: &str, payload: &Value, external: bool) -> BusResult<()> {
        let envelope = BrokerEnvelope {
            topic: topic.to_string(),
            payload: payload.clone(),
            external,
        };
        self.link
            .sender
            .send(envelope)
            .map(|receivers| {
                debug!(provider = %self.name, topic, external, receivers, "Sent on broker link");
            })
            .map_err(|_| BusError::provider(format!("broker link of {} is closed", self.name)))
    }
}

impl Drop for BroadcastProvider {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(
    name: String,
    mut receiver: broadcast::Receiver<BrokerEnvelope>,
    listeners: ListenerTable,
) {
    loop {
        let envelope = match receiver.recv().await {
            Ok(envelope) => envelope,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(provider = %name, skipped, "Broker link lagged, messages dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let snapshot: Vec<InboundListener> = listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(&envelope.topic, &envelope.payload);
        }
    }
}

impl Named for BroadcastProvider {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl ExternalProvider for BroadcastProvider {
    fn add_listener(&self, listener: InboundListener) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    async fn send_internal(&self, topic: &str, payload: &Value) -> BusResult<()> {
        self.send(topic, payload, false)
    }

    async fn send_external(&self, topic: &str, payload: &Value) -> BusResult<()> {
        self.send(topic, payload, true)
    }
}
