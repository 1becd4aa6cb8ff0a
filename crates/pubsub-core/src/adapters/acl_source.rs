//! ACL rule source adapters.

use crate::domain::acl::AclRuleSet;
use crate::error::{BusError, BusResult};
use crate::ports::outbound::AclRuleSource;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Rules read from a JSON file. A missing file means "no ACL".
#[derive(Debug, Clone)]
pub struct JsonFileAclSource {
    path: PathBuf,
}

impl JsonFileAclSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AclRuleSource for JsonFileAclSource {
    async fn load(&self) -> BusResult<Option<AclRuleSet>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BusError::acl_source(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        AclRuleSet::from_json_str(&content).map(Some)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Rules held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticAclSource {
    rules: AclRuleSet,
}

impl StaticAclSource {
    pub fn new(rules: AclRuleSet) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl AclRuleSource for StaticAclSource {
    async fn load(&self) -> BusResult<Option<AclRuleSet>> {
        Ok(Some(self.rules.clone()))
    }

    fn describe(&self) -> String {
        format!("<static: {} rules>", self.rules.len())
    }
}

/// No rule source configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAclSource;

#[async_trait]
impl AclRuleSource for NoAclSource {
    async fn load(&self) -> BusResult<Option<AclRuleSet>> {
        Ok(None)
    }

    fn describe(&self) -> String {
        "<none>".into()
    }
}
