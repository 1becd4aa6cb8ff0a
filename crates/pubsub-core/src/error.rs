//! Error types for the messaging core.

use thiserror::Error;

/// Result type alias for messaging operations
pub type BusResult<T> = Result<T, BusError>;

/// Messaging core errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Malformed topic or pattern (slash placement, leading wildcard,
    /// wildcard where none is allowed)
    #[error("Invalid topic: {topic:?}")]
    InvalidTopic { topic: String },

    /// ACL denial, external-topic subscription or another user's private topic
    #[error("Permission denied on topic {topic:?}: {reason}")]
    PermissionDenied { topic: String, reason: String },

    /// External-topic publish without an active provider
    #[error("No external provider active to publish {topic:?}")]
    NoProvider { topic: String },

    /// Malformed realtime command
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A subscriber callback failed
    #[error("Delivery to subscriber failed: {0}")]
    Delivery(String),

    /// The active external provider failed to send
    #[error("External provider error: {0}")]
    Provider(String),

    /// Realtime transport failed to send
    #[error("Transport error: {0}")]
    Transport(String),

    /// ACL source exists but could not be read or parsed
    #[error("ACL source error: {0}")]
    AclSource(String),

    /// Invalid construction-time configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BusError {
    pub fn invalid_topic(topic: impl Into<String>) -> Self {
        Self::InvalidTopic {
            topic: topic.into(),
        }
    }

    pub fn permission_denied(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    pub fn no_provider(topic: impl Into<String>) -> Self {
        Self::NoProvider {
            topic: topic.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn acl_source(msg: impl Into<String>) -> Self {
        Self::AclSource(msg.into())
    }
}

impl From<crate::domain::config::ConfigError> for BusError {
    fn from(err: crate::domain::config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
