//! Per-connection session state.

use pubsub_core::{Identity, MessageCallback};

/// A topic a connection subscribed to and the callback registered for it.
#[derive(Debug, Clone)]
pub struct SessionSubscription {
    pub topic: String,
    pub callback: MessageCallback,
}

/// Created on a connection's first message, dropped on disconnect.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub subscriptions: Vec<SessionSubscription>,
}

impl Session {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            subscriptions: Vec::new(),
        }
    }

    pub fn find(&self, topic: &str) -> Option<&SessionSubscription> {
        self.subscriptions.iter().find(|s| s.topic == topic)
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.find(topic).is_some()
    }

    pub fn add(&mut self, topic: impl Into<String>, callback: MessageCallback) {
        self.subscriptions.push(SessionSubscription {
            topic: topic.into(),
            callback,
        });
    }

    /// Remove and return the entry for `topic`.
    pub fn remove(&mut self, topic: &str) -> Option<SessionSubscription> {
        let index = self.subscriptions.iter().position(|s| s.topic == topic)?;
        Some(self.subscriptions.remove(index))
    }

    pub fn topics(&self) -> Vec<String> {
        self.subscriptions.iter().map(|s| s.topic.clone()).collect()
    }
}
