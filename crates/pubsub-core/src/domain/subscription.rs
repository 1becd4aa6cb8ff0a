//! Subscriptions and subscriber callbacks.

use crate::domain::identity::Identity;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Error a subscriber callback may return.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

type CallbackFn = dyn Fn(&Value, &str) -> Result<(), CallbackError> + Send + Sync;

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a callback. Clones share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb-{}", self.0)
    }
}

/// A subscriber's message handler, invoked as `(payload, topic)`.
#[derive(Clone)]
pub struct MessageCallback {
    id: CallbackId,
    func: Arc<CallbackFn>,
}

impl MessageCallback {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Value, &str) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        Self {
            id: CallbackId(NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed)),
            func: Arc::new(func),
        }
    }

    pub fn id(&self) -> CallbackId {
        self.id
    }

    pub fn invoke(&self, payload: &Value, topic: &str) -> Result<(), CallbackError> {
        (self.func)(payload, topic)
    }
}

impl fmt::Debug for MessageCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageCallback").field(&self.id).finish()
    }
}

/// A live subscription. Unique per `(pattern, callback id)`.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub pattern: String,
    pub owner: Identity,
    pub callback: MessageCallback,
}

impl Subscription {
    pub fn new(pattern: impl Into<String>, owner: Identity, callback: MessageCallback) -> Self {
        Self {
            pattern: pattern.into(),
            owner,
            callback,
        }
    }

    pub fn is_keyed_by(&self, pattern: &str, callback: CallbackId) -> bool {
        self.pattern == pattern && self.callback.id() == callback
    }
}
