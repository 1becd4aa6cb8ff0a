//! Shared test fixtures: bus construction, recording subscribers and a
//! recording external provider.

use async_trait::async_trait;
use parking_lot::Mutex;
use pubsub_core::{
    BusConfig, BusResult, ExternalProvider, ExternalProviderRegistry, Identity, InboundListener,
    ListenerId, MessageCallback, MessagingCore, Named, PluginHost, TopicAclChecker,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub type Received = mpsc::UnboundedReceiver<(String, Value)>;

pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(500);
pub const SILENCE: Duration = Duration::from_millis(50);

/// A bus with its host and provider registry.
pub struct TestBus {
    pub core: MessagingCore,
    pub host: Arc<PluginHost>,
    pub providers: Arc<ExternalProviderRegistry>,
}

impl TestBus {
    pub fn new(config: BusConfig, acl: TopicAclChecker) -> Self {
        let host = Arc::new(PluginHost::new());
        let providers = Arc::new(ExternalProviderRegistry::new());
        let core = MessagingCore::new(config, Arc::new(acl), Arc::clone(&providers), host.clone())
            .unwrap();
        Self {
            core,
            host,
            providers,
        }
    }

    pub fn local() -> Self {
        Self::new(BusConfig::default(), TopicAclChecker::disabled())
    }
}

/// `externalProviderName = name`, `externalTopics = ["external", "what/ever"]`.
pub fn clustered_config(name: &str) -> BusConfig {
    BusConfig {
        external_provider_name: Some(name.to_string()),
        external_topics: vec!["external".into(), "what/ever".into()],
        ..BusConfig::default()
    }
}

pub fn user(name: &str) -> Identity {
    Identity::new(name, ["User"])
}

/// Subscriber forwarding every delivery into a channel.
pub fn recorder() -> (MessageCallback, Received) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = MessageCallback::new(move |payload, topic| {
        tx.send((topic.to_string(), payload.clone()))
            .map_err(|e| e.to_string().into())
    });
    (callback, rx)
}

pub async fn next(rx: &mut Received) -> (String, Value) {
    timeout(RECEIVE_TIMEOUT, rx.recv())
        .await
        .expect("timeout waiting for delivery")
        .expect("subscriber channel closed")
}

pub async fn nothing(rx: &mut Received) {
    assert!(
        timeout(SILENCE, rx.recv()).await.is_err(),
        "unexpected delivery"
    );
}

/// External provider recording what it is asked to send. `inject` plays
/// the broker delivering a message to every attached listener.
pub struct RecordingProvider {
    name: String,
    pub internal: Mutex<Vec<(String, Value)>>,
    pub external: Mutex<Vec<(String, Value)>>,
    listeners: Mutex<Vec<(ListenerId, InboundListener)>>,
    next_listener: AtomicU64,
}

impl RecordingProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            internal: Mutex::new(Vec::new()),
            external: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        })
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn inject(&self, topic: &str, payload: Value) {
        let listeners: Vec<InboundListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(topic, &payload);
        }
    }
}

impl Named for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl ExternalProvider for RecordingProvider {
    fn add_listener(&self, listener: InboundListener) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    async fn send_internal(&self, topic: &str, payload: &Value) -> BusResult<()> {
        self.internal.lock().push((topic.to_string(), payload.clone()));
        Ok(())
    }

    async fn send_external(&self, topic: &str, payload: &Value) -> BusResult<()> {
        self.external.lock().push((topic.to_string(), payload.clone()));
        Ok(())
    }
}
