//! Driven Ports (SPI - Outbound)
//!
//! Collaborators the messaging core depends on: the external broker
//! provider, the host's plugin lifecycle notifications and the ACL rule
//! source.

use crate::domain::acl::AclRuleSet;
use crate::domain::registry::{Named, NamedRegistry};
use crate::error::BusResult;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Handle returned by [`ExternalProvider::add_listener`].
pub type ListenerId = u64;

/// Receives messages arriving from the external broker as `(topic, payload)`.
pub type InboundListener = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Bridge to an external broker for multi-instance fan-out.
///
/// `send_internal` carries ordinary topics so other instances of the bus see
/// them too; `send_external` carries topics under the configured external
/// prefixes. Both are echoed back through the listeners of every attached
/// instance, the sender included.
#[async_trait]
pub trait ExternalProvider: Named + Send + Sync {
    /// Attach a listener for inbound messages.
    fn add_listener(&self, listener: InboundListener) -> ListenerId;

    /// Detach a listener. Returns false if it was not attached.
    fn remove_listener(&self, id: ListenerId) -> bool;

    async fn send_internal(&self, topic: &str, payload: &Value) -> BusResult<()>;

    async fn send_external(&self, topic: &str, payload: &Value) -> BusResult<()>;
}

/// Registry of external providers, keyed by provider name.
pub type ExternalProviderRegistry = NamedRegistry<dyn ExternalProvider>;

/// One-shot lifecycle callback.
pub type LifecycleCallback = Box<dyn FnOnce() + Send>;

/// Host plugin lifecycle notifications.
///
/// Callbacks fire once, on the next matching event only. Consumers that
/// need every event re-arm from inside the callback.
pub trait LifecycleNotifier: Send + Sync {
    fn on_next_load(&self, name: &str, callback: LifecycleCallback);

    fn on_next_unload(&self, name: &str, callback: LifecycleCallback);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Load,
    Unload,
}

/// Run `handler` on every `event` of unit `name` by re-arming the one-shot
/// callback after each run. Stops re-arming once `handler` returns false.
pub fn watch_lifecycle<F>(
    notifier: Arc<dyn LifecycleNotifier>,
    event: LifecycleEvent,
    name: String,
    handler: Arc<F>,
) where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let rearm = Arc::clone(&notifier);
    let watched = name.clone();
    let callback: LifecycleCallback = Box::new(move || {
        if handler() {
            watch_lifecycle(rearm, event, watched, handler);
        }
    });

    match event {
        LifecycleEvent::Load => notifier.on_next_load(&name, callback),
        LifecycleEvent::Unload => notifier.on_next_unload(&name, callback),
    }
}

/// Where topic ACL rules come from.
#[async_trait]
pub trait AclRuleSource: Send + Sync {
    /// Load the rule set. `Ok(None)` means the source does not exist.
    async fn load(&self) -> BusResult<Option<AclRuleSet>>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}
