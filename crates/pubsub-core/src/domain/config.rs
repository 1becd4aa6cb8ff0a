//! Messaging core configuration.
//!
//! Field names follow the host's camelCase configuration keys:
//!
//! ```toml
//! externalProviderName = "redis"
//! externalTopics = ["external", "what/ever"]
//! userPrivateBaseTopic = "user"
//! enableWebSockets = true
//! topicACL = "/etc/pubsub/topic-acl.json"
//! ```

use crate::domain::topic::is_valid_topic;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Default base topic for per-user private topics.
pub const DEFAULT_USER_PRIVATE_BASE_TOPIC: &str = "user";

/// Static configuration of one bus instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BusConfig {
    /// Name of the external provider to activate (None = no clustering)
    pub external_provider_name: Option<String>,
    /// Topic prefixes routed through `send_external`
    pub external_topics: Vec<String>,
    /// Base of the per-user private topics
    pub user_private_base_topic: String,
    /// Whether the realtime protocol handler is constructed at all
    pub enable_web_sockets: bool,
    /// Location of the topic ACL rule file
    #[serde(rename = "topicACL")]
    pub topic_acl: Option<PathBuf>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            external_provider_name: None,
            external_topics: Vec::new(),
            user_private_base_topic: DEFAULT_USER_PRIVATE_BASE_TOPIC.to_string(),
            enable_web_sockets: true,
            topic_acl: None,
        }
    }
}

impl BusConfig {
    /// Validate the topic-shaped settings.
    ///
    /// A bus must never start with a private base or an external prefix
    /// that could not be published to.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_topic(&self.user_private_base_topic, false) {
            return Err(ConfigError::InvalidPrivateTopic(
                self.user_private_base_topic.clone(),
            ));
        }

        if let Some(bad) = self
            .external_topics
            .iter()
            .find(|topic| !is_valid_topic(topic, false))
        {
            return Err(ConfigError::InvalidExternalTopic(bad.clone()));
        }

        if matches!(&self.external_provider_name, Some(name) if name.trim().is_empty()) {
            return Err(ConfigError::EmptyProviderName);
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The user-private base topic is not a valid topic
    #[error("userPrivateBaseTopic {0:?} is not a valid topic")]
    InvalidPrivateTopic(String),

    /// An external topic prefix is not a valid topic
    #[error("external topic {0:?} is not a valid topic")]
    InvalidExternalTopic(String),

    /// externalProviderName is set but blank
    #[error("externalProviderName must not be blank")]
    EmptyProviderName,

    /// File I/O error
    #[error("failed to read {path}: {error}")]
    Io { path: String, error: String },

    /// Parse error
    #[error("failed to parse config: {0}")]
    Parse(String),
}
