//! # Messaging Core
//!
//! Owns the subscription table, enforces topic validation, privacy and ACL
//! on every subscribe, publish **and** delivery, and keeps the active
//! external provider in sync with the host's plugin lifecycle.
//!
//! ## Routing
//!
//! ```text
//!                   ┌──────────── provider active ────────────┐
//! publish(topic) ───┤  external topic → send_external          │──→ broker ──→ listener ─┐
//!                   │  other topics   → send_internal          │                         │
//!                   └──────────── no provider ────────────────┘                         │
//!                      external topic → NoProvider                                      │
//!                      other topics   → deferred local delivery ─────────────────────────┤
//!                                                                                       ▼
//!                                   snapshot subscriptions → match → privacy → ACL → callback
//! ```
//!
//! ## Hot swap
//!
//! With a provider name configured, the core arms one-shot load/unload
//! callbacks on the host's lifecycle notifier. Each callback swaps the
//! active provider reference (re-attaching the inbound listener while
//! started) and re-arms itself. Subscriptions are never touched by a swap.
//!
//! ## Delivery ordering
//!
//! Local delivery runs on a spawned task. Subscribers of one publish are
//! called in subscription order, but there is no ordering across publishes,
//! and a subscriber that unsubscribes after `publish` returned may or may
//! not still receive that message.

use crate::acl_checker::TopicAclChecker;
use crate::domain::config::BusConfig;
use crate::domain::identity::{Identity, PrivateTopicPolicy};
use crate::domain::subscription::{MessageCallback, Subscription};
use crate::domain::topic::{is_under_prefix, is_valid_topic, matches};
use crate::error::{BusError, BusResult};
use crate::ports::inbound::MessagingApi;
use crate::ports::outbound::{
    watch_lifecycle, ExternalProvider, ExternalProviderRegistry, InboundListener, LifecycleEvent,
    LifecycleNotifier, ListenerId,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Counters describing bus activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStatistics {
    /// Publishes accepted (locally scheduled or handed to the provider)
    pub messages_published: u64,
    /// Callbacks that returned `Ok`. Push-style subscribers return once
    /// the message is handed to their transport.
    pub messages_delivered: u64,
    /// Callbacks that returned an error or panicked
    pub delivery_failures: u64,
    /// Current size of the subscription table
    pub active_subscriptions: usize,
    /// Whether an external provider is currently active
    pub provider_active: bool,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Started/stopped state and the provider the bus is bridged to.
#[derive(Default)]
struct ProviderLink {
    started: bool,
    active: Option<Arc<dyn ExternalProvider>>,
    listener: Option<ListenerId>,
}

impl ProviderLink {
    fn attach(&mut self, core: &Weak<CoreInner>) {
        if let Some(provider) = &self.active {
            let id = provider.add_listener(inbound_listener(core.clone()));
            info!(provider = provider.name(), "Attached inbound listener");
            self.listener = Some(id);
        }
    }

    fn detach(&mut self) {
        if let (Some(provider), Some(id)) = (&self.active, self.listener.take()) {
            provider.remove_listener(id);
            info!(provider = provider.name(), "Detached inbound listener");
        }
    }
}

struct CoreInner {
    config: BusConfig,
    privacy: PrivateTopicPolicy,
    acl: Arc<TopicAclChecker>,
    providers: Arc<ExternalProviderRegistry>,
    subscriptions: RwLock<Vec<Subscription>>,
    link: Mutex<ProviderLink>,
    counters: Counters,
    /// Handle to ourselves for listeners and lifecycle callbacks
    this: Weak<CoreInner>,
}

/// The topic bus. Cheap to clone; clones share one bus.
#[derive(Clone)]
pub struct MessagingCore {
    inner: Arc<CoreInner>,
}

impl MessagingCore {
    /// Create a bus.
    ///
    /// # Errors
    ///
    /// `Configuration` if the private base topic or an external topic prefix
    /// is not a valid topic.
    pub fn new(
        config: BusConfig,
        acl: Arc<TopicAclChecker>,
        providers: Arc<ExternalProviderRegistry>,
        notifier: Arc<dyn LifecycleNotifier>,
    ) -> BusResult<Self> {
        config.validate()?;

        let inner = Arc::new_cyclic(|this| CoreInner {
            privacy: PrivateTopicPolicy::new(config.user_private_base_topic.clone()),
            config,
            acl,
            providers,
            subscriptions: RwLock::new(Vec::new()),
            link: Mutex::new(ProviderLink::default()),
            counters: Counters::default(),
            this: this.clone(),
        });

        if let Some(name) = inner.config.external_provider_name.clone() {
            inner.provider_loaded(&name);
            watch_provider(notifier, name, Arc::downgrade(&inner));
        }

        Ok(Self { inner })
    }

    /// Start receiving messages from the active provider. Idempotent.
    pub fn start_listeners(&self) {
        let mut link = self.inner.link.lock();
        if link.started {
            return;
        }
        link.started = true;
        link.attach(&self.inner.this);
        info!("Messaging core started");
    }

    /// Stop receiving messages from the provider. Idempotent.
    pub fn stop_listeners(&self) {
        let mut link = self.inner.link.lock();
        if !link.started {
            return;
        }
        link.detach();
        link.started = false;
        info!("Messaging core stopped");
    }

    pub fn is_started(&self) -> bool {
        self.inner.link.lock().started
    }

    /// Name of the provider messages are currently bridged through.
    pub fn active_provider(&self) -> Option<String> {
        self.inner
            .link
            .lock()
            .active
            .as_ref()
            .map(|provider| provider.name().to_string())
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.read().len()
    }

    pub fn statistics(&self) -> BusStatistics {
        let counters = &self.inner.counters;
        BusStatistics {
            messages_published: counters.published.load(Ordering::Relaxed),
            messages_delivered: counters.delivered.load(Ordering::Relaxed),
            delivery_failures: counters.failed.load(Ordering::Relaxed),
            active_subscriptions: self.subscription_count(),
            provider_active: self.inner.link.lock().active.is_some(),
        }
    }

    /// Deliver `payload` to local subscribers right now, as if it had just
    /// arrived from the broker. Returns the number of callbacks that ran
    /// successfully.
    pub async fn deliver(&self, topic: &str, payload: &Value) -> usize {
        self.inner.deliver(topic, payload).await
    }

    #[cfg(test)]
    fn insert_subscription_unchecked(&self, subscription: Subscription) {
        self.inner.subscriptions.write().push(subscription);
    }
}

impl std::fmt::Debug for MessagingCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingCore")
            .field("config", &self.inner.config)
            .field("subscriptions", &self.subscription_count())
            .field("provider", &self.active_provider())
            .finish()
    }
}

impl CoreInner {
    fn is_external_topic(&self, topic: &str) -> bool {
        self.config
            .external_topics
            .iter()
            .any(|prefix| is_under_prefix(topic, prefix))
    }

    fn active_provider(&self) -> Option<Arc<dyn ExternalProvider>> {
        self.link.lock().active.clone()
    }

    fn provider_loaded(&self, name: &str) {
        let provider = self.providers.find(name);
        let mut link = self.link.lock();
        if link.started {
            link.detach();
        }
        link.active = provider;
        match &link.active {
            Some(_) => info!(provider = name, "External provider active"),
            None => warn!(provider = name, "External provider not registered"),
        }
        if link.started {
            link.attach(&self.this);
        }
    }

    fn provider_unloaded(&self, name: &str) {
        let mut link = self.link.lock();
        if link.started {
            link.detach();
        }
        link.active = None;
        info!(provider = name, "External provider gone, falling back to local delivery");
    }

    async fn deliver(&self, topic: &str, payload: &Value) -> usize {
        // external topics never reach local subscribers, wildcards included
        if self.is_external_topic(topic) {
            debug!(topic, "Not delivering external topic locally");
            return 0;
        }

        let snapshot = self.subscriptions.read().clone();
        let mut delivered = 0;

        for subscription in snapshot.iter().filter(|s| matches(&s.pattern, topic)) {
            let owner = &subscription.owner;

            if !self.privacy.permits(topic, owner) {
                debug!(topic, user = %owner.username, "Skipping delivery of foreign private topic");
                continue;
            }

            match self.acl.allowed(topic, owner).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(topic, user = %owner.username, "ACL denies delivery");
                    continue;
                }
                Err(e) => {
                    warn!(topic, user = %owner.username, error = %e, "ACL check failed, skipping delivery");
                    continue;
                }
            }

            let outcome = catch_unwind(AssertUnwindSafe(|| {
                subscription.callback.invoke(payload, topic)
            }));
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(BusError::delivery(e.to_string())),
                Err(_) => Some(BusError::delivery("subscriber panicked")),
            };

            match failure {
                None => {
                    delivered += 1;
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Some(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        topic,
                        pattern = %subscription.pattern,
                        user = %owner.username,
                        callback = %subscription.callback.id(),
                        error = %e,
                        "Subscriber failed"
                    );
                }
            }
        }

        debug!(topic, delivered, "Delivered message");
        delivered
    }

    fn schedule_delivery(&self, topic: String, payload: Value) {
        let Some(core) = self.this.upgrade() else {
            return;
        };
        spawn_delivery(core, topic, payload);
    }
}

fn spawn_delivery(core: Arc<CoreInner>, topic: String, payload: Value) {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                core.deliver(&topic, &payload).await;
            });
        }
        Err(_) => warn!(topic = %topic, "No async runtime, dropping message"),
    }
}

/// Listener handed to the provider: re-enters the delivery path.
fn inbound_listener(core: Weak<CoreInner>) -> InboundListener {
    Arc::new(move |topic: &str, payload: &Value| {
        if let Some(core) = core.upgrade() {
            spawn_delivery(core, topic.to_string(), payload.clone());
        }
    })
}

/// Keep the active provider in sync with the host's load/unload events of
/// `name` for as long as the core is alive.
fn watch_provider(notifier: Arc<dyn LifecycleNotifier>, name: String, core: Weak<CoreInner>) {
    let (weak, watched) = (core.clone(), name.clone());
    watch_lifecycle(
        Arc::clone(&notifier),
        LifecycleEvent::Load,
        name.clone(),
        Arc::new(move || match weak.upgrade() {
            Some(inner) => {
                inner.provider_loaded(&watched);
                true
            }
            None => false,
        }),
    );

    let watched = name.clone();
    watch_lifecycle(
        notifier,
        LifecycleEvent::Unload,
        name,
        Arc::new(move || match core.upgrade() {
            Some(inner) => {
                inner.provider_unloaded(&watched);
                true
            }
            None => false,
        }),
    );
}

#[async_trait]
impl MessagingApi for MessagingCore {
    async fn subscribe(
        &self,
        identity: &Identity,
        topic: &str,
        callback: MessageCallback,
    ) -> BusResult<()> {
        let inner = &self.inner;

        if !is_valid_topic(topic, true) {
            return Err(BusError::invalid_topic(topic));
        }
        if inner.is_external_topic(topic) {
            return Err(BusError::permission_denied(
                topic,
                "external topics cannot be subscribed to",
            ));
        }
        if !inner.privacy.permits(topic, identity) {
            return Err(BusError::permission_denied(
                topic,
                "private topic of another user",
            ));
        }
        if !inner.acl.allowed(topic, identity).await? {
            return Err(BusError::permission_denied(topic, "denied by topic ACL"));
        }

        let mut subscriptions = inner.subscriptions.write();
        subscriptions.retain(|s| !s.is_keyed_by(topic, callback.id()));
        debug!(topic, user = %identity.username, callback = %callback.id(), "Subscribed");
        subscriptions.push(Subscription::new(topic, identity.clone(), callback));

        Ok(())
    }

    async fn unsubscribe(&self, topic: &str, callback: &MessageCallback) -> BusResult<()> {
        let mut subscriptions = self.inner.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| !s.is_keyed_by(topic, callback.id()));
        if subscriptions.len() != before {
            debug!(topic, callback = %callback.id(), "Unsubscribed");
        }
        Ok(())
    }

    async fn publish(&self, identity: &Identity, topic: &str, payload: Value) -> BusResult<()> {
        let inner = &self.inner;

        if !is_valid_topic(topic, false) {
            return Err(BusError::invalid_topic(topic));
        }
        if !inner.acl.allowed(topic, identity).await? {
            return Err(BusError::permission_denied(topic, "denied by topic ACL"));
        }

        let external = inner.is_external_topic(topic);
        match inner.active_provider() {
            Some(provider) if external => provider.send_external(topic, &payload).await?,
            Some(provider) => provider.send_internal(topic, &payload).await?,
            None if external => return Err(BusError::no_provider(topic)),
            None => inner.schedule_delivery(topic.to_string(), payload),
        }

        inner.counters.published.fetch_add(1, Ordering::Relaxed);
        debug!(topic, user = %identity.username, external, "Published");
        Ok(())
    }

    fn user_private_topic(&self, identity: &Identity) -> String {
        self.inner.privacy.topic_for(identity)
    }
}
