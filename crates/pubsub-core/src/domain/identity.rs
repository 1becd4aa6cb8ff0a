//! Authenticated identities and per-user private topics.

use crate::domain::topic::SEPARATOR;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An already-authenticated caller, as resolved by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Login name.
    pub username: String,
    /// Role memberships.
    #[serde(default)]
    pub roles: HashSet<String>,
}

impl Identity {
    /// Create an identity from a username and its roles.
    pub fn new<I, S>(username: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            username: username.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// True if the identity holds at least one of `roles`.
    pub fn has_any_role<'a, I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        roles.into_iter().any(|role| self.roles.contains(role))
    }

    /// Username reduced to one topic segment: wildcard characters and
    /// separators are stripped. Empty for an empty username, whose private
    /// topic is then invalid and cannot be subscribed to.
    pub fn sanitized_username(&self) -> String {
        self.username
            .chars()
            .filter(|c| !matches!(*c, '+' | '#' | SEPARATOR))
            .collect()
    }
}

/// Ownership rules for topics under the user-private base topic.
///
/// `<base>/<user>` and everything below it belong to `<user>` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateTopicPolicy {
    base: String,
}

impl PrivateTopicPolicy {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// The private topic of `identity`.
    pub fn topic_for(&self, identity: &Identity) -> String {
        format!("{}{}{}", self.base, SEPARATOR, identity.sanitized_username())
    }

    /// Owner segment of a private topic, `None` if the topic is not private.
    pub fn owner_of<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let rest = topic.strip_prefix(self.base.as_str())?;
        let rest = rest.strip_prefix(SEPARATOR)?;
        rest.split(SEPARATOR).next()
    }

    /// True unless `topic` is somebody else's private topic.
    pub fn permits(&self, topic: &str, identity: &Identity) -> bool {
        match self.owner_of(topic) {
            Some(owner) => owner == identity.sanitized_username(),
            None => true,
        }
    }
}
