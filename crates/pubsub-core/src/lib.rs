//! # pubsub-core
//!
//! Topic-based publish/subscribe messaging for a server process.
//!
//! ## Overview
//!
//! - **Topics**: `/`-separated paths with MQTT-style `+` and `#` wildcards
//! - **Private topics**: `<base>/<username>/...`, subscribable by their owner only
//! - **Topic ACL**: JSON rule file mapping topic patterns to roles, first match wins
//! - **External provider**: optional broker bridge for multi-instance fan-out,
//!   hot-swapped as the host loads and unloads it
//!
//! ## Architecture
//!
//! ```text
//! callers ──MessagingApi──→ MessagingCore ──ExternalProvider──→ broker
//!                               │    ▲                            │
//!                               │    └────── inbound listener ────┘
//!                               ├── TopicAclChecker ──AclRuleSource──→ topic-acl.json
//!                               └── LifecycleNotifier (host plugin events)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use pubsub_core::{BusConfig, Identity, MessageCallback, MessagingApi, MessagingCore};
//!
//! let core = MessagingCore::new(config, acl, providers, host)?;
//! core.start_listeners();
//! core.subscribe(&identity, "chat/+", MessageCallback::new(|msg, topic| {
//!     println!("{topic}: {msg}");
//!     Ok(())
//! })).await?;
//! core.publish(&identity, "chat/general", json!({"text": "hi"})).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod acl_checker;
pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

// Re-exports for public API
pub use acl_checker::TopicAclChecker;
pub use adapters::{
    BroadcastProvider, BrokerEnvelope, BrokerLink, JsonFileAclSource, NoAclSource, PluginHost,
    StaticAclSource,
};
pub use domain::{
    AclRule, AclRuleSet, AllowSpec, BusConfig, CallbackError, CallbackId, ConfigError, Identity,
    MessageCallback, Named, NamedRegistry, PrivateTopicPolicy, Subscription,
};
pub use error::{BusError, BusResult};
pub use ports::{
    watch_lifecycle, AclRuleSource, ExternalProvider, ExternalProviderRegistry, InboundListener,
    LifecycleCallback, LifecycleEvent, LifecycleNotifier, ListenerId, MessagingApi,
};
pub use service::{BusStatistics, MessagingCore};
