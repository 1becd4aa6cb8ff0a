//! Ports layer (hexagonal architecture).

pub mod inbound;
pub mod outbound;

pub use inbound::MessagingApi;
pub use outbound::{
    watch_lifecycle, AclRuleSource, ExternalProvider, ExternalProviderRegistry, InboundListener,
    LifecycleCallback, LifecycleEvent, LifecycleNotifier, ListenerId,
};
