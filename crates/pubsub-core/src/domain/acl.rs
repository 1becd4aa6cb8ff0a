//! # Topic ACL Rules
//!
//! A rule set maps topic patterns to allow/deny role lists:
//!
//! ```json
//! {
//!   "_comment": "keys starting with '_' are metadata, not rules",
//!   "admin/#": { "allow": ["Admin"] },
//!   "foo/bar/#": { "allow": ["Role5", "GroupX"], "deny": ["Banned"] },
//!   "news/+": { "allow": "any" },
//!   "locked/#": {}
//! }
//! ```
//!
//! Evaluation uses the **first** rule (in file order) whose pattern matches
//! the topic. No matching rule means allowed. A matching rule allows an
//! identity if its `allow` matches and its `deny` does not; a rule without
//! `allow` denies everyone.

use crate::domain::identity::Identity;
use crate::domain::topic::{is_valid_topic, matches};
use crate::error::{BusError, BusResult};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Keys starting with this marker are ignored when building the rule list.
pub const RESERVED_KEY_MARKER: char = '_';

/// Who a rule lets through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowSpec {
    /// Every identity
    Any,
    /// Identities holding at least one of these roles
    Roles(Vec<String>),
}

/// One topic-pattern rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclRule {
    pub pattern: String,
    pub allow: Option<AllowSpec>,
    pub deny: Option<Vec<String>>,
}

impl AclRule {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            allow: None,
            deny: None,
        }
    }

    pub fn allow_any(mut self) -> Self {
        self.allow = Some(AllowSpec::Any);
        self
    }

    pub fn allow_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow = Some(AllowSpec::Roles(roles.into_iter().map(Into::into).collect()));
        self
    }

    pub fn deny_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// `allow` matches and `deny` does not.
    pub fn permits(&self, identity: &Identity) -> bool {
        let allow_match = match &self.allow {
            Some(AllowSpec::Any) => true,
            Some(AllowSpec::Roles(roles)) => identity.has_any_role(roles),
            None => false,
        };
        let deny_match = self
            .deny
            .as_ref()
            .is_some_and(|roles| identity.has_any_role(roles));

        allow_match && !deny_match
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAllow {
    Keyword(String),
    Roles(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    allow: Option<RawAllow>,
    #[serde(default)]
    deny: Option<Vec<String>>,
}

/// Ordered rule list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclRuleSet {
    rules: Vec<AclRule>,
}

impl AclRuleSet {
    pub fn new(rules: Vec<AclRule>) -> Self {
        Self { rules }
    }

    /// Parse a JSON rule document.
    pub fn from_json_str(content: &str) -> BusResult<Self> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| BusError::acl_source(format!("invalid JSON: {}", e)))?;
        Self::from_json(value)
    }

    /// Build from an already parsed JSON object, keeping key order.
    pub fn from_json(value: Value) -> BusResult<Self> {
        let Value::Object(entries) = value else {
            return Err(BusError::acl_source("rule document must be a JSON object"));
        };
        Self::from_entries(entries)
    }

    fn from_entries(entries: Map<String, Value>) -> BusResult<Self> {
        let mut rules = Vec::with_capacity(entries.len());

        for (pattern, body) in entries {
            if pattern.starts_with(RESERVED_KEY_MARKER) {
                continue;
            }
            if !is_valid_topic(&pattern, true) {
                return Err(BusError::acl_source(format!(
                    "rule pattern {:?} is not a valid topic",
                    pattern
                )));
            }

            let raw: RawRule = serde_json::from_value(body).map_err(|e| {
                BusError::acl_source(format!("rule {:?} is malformed: {}", pattern, e))
            })?;

            let allow = match raw.allow {
                None => None,
                Some(RawAllow::Roles(roles)) => Some(AllowSpec::Roles(roles)),
                Some(RawAllow::Keyword(keyword)) if keyword == "any" => Some(AllowSpec::Any),
                Some(RawAllow::Keyword(keyword)) => {
                    return Err(BusError::acl_source(format!(
                        "rule {:?}: allow must be \"any\" or a role list, got {:?}",
                        pattern, keyword
                    )));
                }
            };

            rules.push(AclRule {
                pattern,
                allow,
                deny: raw.deny,
            });
        }

        Ok(Self { rules })
    }

    /// First rule whose pattern matches `topic`.
    pub fn first_match(&self, topic: &str) -> Option<&AclRule> {
        self.rules.iter().find(|rule| matches(&rule.pattern, topic))
    }

    /// Open by default: no matching rule means allowed.
    pub fn allowed(&self, topic: &str, identity: &Identity) -> bool {
        self.first_match(topic)
            .map_or(true, |rule| rule.permits(identity))
    }

    pub fn rules(&self) -> &[AclRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
