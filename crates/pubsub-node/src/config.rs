//! Node configuration: a TOML file with `[bus]` and `[realtime]` sections,
//! plus environment overrides.
//!
//! ```toml
//! [bus]
//! externalProviderName = "broker"
//! externalTopics = ["external"]
//! userPrivateBaseTopic = "user"
//! enableWebSockets = true
//! topicACL = "/etc/pubsub/topic-acl.json"
//!
//! [realtime]
//! transportName = "websocket"
//! maxMessageSize = 1048576
//! bindAddress = "0.0.0.0:8546"
//! ```

use pubsub_core::{BusConfig, ConfigError};
use pubsub_realtime::RealtimeConfig;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PUBSUB_CONFIG";
pub const EXTERNAL_PROVIDER_ENV: &str = "PUBSUB_EXTERNAL_PROVIDER";
pub const TOPIC_ACL_ENV: &str = "PUBSUB_TOPIC_ACL";
pub const BIND_ENV: &str = "PUBSUB_BIND";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub bus: BusConfig,
    pub realtime: RealtimeConfig,
}

impl NodeConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io {
                path: path.display().to_string(),
                error: e.to_string(),
            }),
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `PUBSUB_*` overrides looked up through `var`.
    pub fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = var(EXTERNAL_PROVIDER_ENV) {
            info!(provider = %provider, "External provider from environment");
            self.bus.external_provider_name = Some(provider);
        }
        if let Some(acl) = var(TOPIC_ACL_ENV) {
            self.bus.topic_acl = Some(PathBuf::from(acl));
        }
        if let Some(bind) = var(BIND_ENV) {
            match bind.parse() {
                Ok(addr) => self.realtime.bind_address = addr,
                Err(_) => warn!(value = %bind, "{} is not a socket address, ignored", BIND_ENV),
            }
        }
    }
}

/// Config file path: first CLI argument, else `PUBSUB_CONFIG`.
pub fn config_path<I>(mut args: I, env: Option<OsString>) -> Option<PathBuf>
where
    I: Iterator<Item = OsString>,
{
    args.nth(1).or(env).map(PathBuf::from)
}

/// Resolve, load and override the configuration from the process
/// environment.
pub fn load_config() -> Result<NodeConfig, ConfigError> {
    let mut config = match config_path(std::env::args_os(), std::env::var_os(CONFIG_ENV)) {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            NodeConfig::load(path)?
        }
        None => NodeConfig::default(),
    };
    config.apply_env_overrides(|name| std::env::var(name).ok());
    config.bus.validate()?;
    Ok(config)
}
