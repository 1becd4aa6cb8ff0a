//! Driving Ports (API - Inbound)
//!
//! The messaging API used by local callers and the realtime protocol
//! handler.

use crate::domain::identity::Identity;
use crate::domain::subscription::MessageCallback;
use crate::error::BusResult;
use async_trait::async_trait;
use serde_json::Value;

/// Primary messaging API.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Subscribe `callback` to a topic or wildcard pattern on behalf of
    /// `identity`.
    ///
    /// Re-subscribing the same `(topic, callback)` pair replaces the
    /// existing entry.
    ///
    /// # Errors
    ///
    /// - `InvalidTopic` for malformed patterns
    /// - `PermissionDenied` for external topics, another user's private
    ///   topic or an ACL denial
    async fn subscribe(
        &self,
        identity: &Identity,
        topic: &str,
        callback: MessageCallback,
    ) -> BusResult<()>;

    /// Remove a subscription. Unknown subscriptions are a no-op.
    async fn unsubscribe(&self, topic: &str, callback: &MessageCallback) -> BusResult<()>;

    /// Publish `payload` to a concrete topic.
    ///
    /// Local delivery is deferred: a successful return means the message was
    /// accepted, not that subscribers have run.
    ///
    /// # Errors
    ///
    /// - `InvalidTopic` for malformed or wildcard topics
    /// - `PermissionDenied` on ACL denial
    /// - `NoProvider` for external topics without an active provider
    /// - `Provider` if the active provider fails to send
    async fn publish(&self, identity: &Identity, topic: &str, payload: Value) -> BusResult<()>;

    /// The private topic owned by `identity`.
    fn user_private_topic(&self, identity: &Identity) -> String;
}
