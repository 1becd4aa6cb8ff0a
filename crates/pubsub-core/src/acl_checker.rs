//! # Topic ACL Checker
//!
//! Answers "may this identity use this topic" against a lazily loaded,
//! memoized rule set.
//!
//! ## Fail-open when the source is missing
//!
//! If the rule source does not exist, the checker logs a warning once and
//! allows **every** identity on **every** topic for the rest of the process
//! lifetime. Deployments relying on topic ACLs for security must make sure
//! the configured source exists. A source that exists but cannot be parsed
//! is an error instead, and loading is retried on the next check.

use crate::adapters::acl_source::{NoAclSource, StaticAclSource};
use crate::domain::acl::AclRuleSet;
use crate::domain::identity::Identity;
use crate::error::BusResult;
use crate::ports::outbound::AclRuleSource;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub struct TopicAclChecker {
    source: Arc<dyn AclRuleSource>,
    /// `Some(None)` once the source turned out to be absent
    rules: OnceCell<Option<Arc<AclRuleSet>>>,
}

impl TopicAclChecker {
    pub fn new(source: Arc<dyn AclRuleSource>) -> Self {
        Self {
            source,
            rules: OnceCell::new(),
        }
    }

    /// Checker with no rule source: everything is allowed.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoAclSource))
    }

    /// Checker over an in-memory rule set.
    pub fn from_rules(rules: AclRuleSet) -> Self {
        Self::new(Arc::new(StaticAclSource::new(rules)))
    }

    /// Is `identity` permitted on `topic`?
    pub async fn allowed(&self, topic: &str, identity: &Identity) -> BusResult<bool> {
        let rules = self.rules.get_or_try_init(|| self.load_rules()).await?;

        Ok(match rules {
            Some(rules) => rules.allowed(topic, identity),
            None => true,
        })
    }

    async fn load_rules(&self) -> BusResult<Option<Arc<AclRuleSet>>> {
        match self.source.load().await? {
            Some(rules) => {
                info!(
                    source = %self.source.describe(),
                    rules = rules.len(),
                    "Loaded topic ACL"
                );
                Ok(Some(Arc::new(rules)))
            }
            None => {
                warn!(
                    source = %self.source.describe(),
                    "Topic ACL source not found; ACL disabled, all topics open to everyone"
                );
                Ok(None)
            }
        }
    }

    /// True once a load has completed (with or without rules).
    pub fn is_loaded(&self) -> bool {
        self.rules.initialized()
    }

    /// False if the source turned out to be missing. `None` before first load.
    pub fn is_enforcing(&self) -> Option<bool> {
        self.rules.get().map(Option::is_some)
    }
}

impl std::fmt::Debug for TopicAclChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicAclChecker")
            .field("source", &self.source.describe())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
