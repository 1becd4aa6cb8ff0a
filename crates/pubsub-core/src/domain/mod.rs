//! Domain layer: pure topic logic, rules and configuration.

pub mod acl;
pub mod config;
pub mod identity;
pub mod registry;
pub mod subscription;
pub mod topic;

pub use acl::{AclRule, AclRuleSet, AllowSpec, RESERVED_KEY_MARKER};
pub use config::{BusConfig, ConfigError};
pub use identity::{Identity, PrivateTopicPolicy};
pub use registry::{Named, NamedRegistry};
pub use subscription::{CallbackError, CallbackId, MessageCallback, Subscription};
