use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::store::{Database, StoreError};

pub const RESOURCES_ENABLED: &str = "resources_enabled";

/// Read-only feature flag lookup.
#[async_trait]
pub trait FeatureFlags: Send + Sync {
    /// `None` when the flag is unknown.
    async fn is_enabled(&self, key: &str) -> Result<Option<bool>, StoreError>;

    /// Every flag, sorted by key.
    async fn all(&self) -> Result<Vec<(String, bool)>, StoreError>;
}

/// Flags persisted in the flags table of the [`Database`].
#[derive(Clone)]
pub struct StoreFeatureFlags {
    db: Arc<Database>,
}

impl StoreFeatureFlags {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FeatureFlags for StoreFeatureFlags {
    async fn is_enabled(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }
        Ok(self.db.read()?.flag(key))
    }

    async fn all(&self) -> Result<Vec<(String, bool)>, StoreError> {
        Ok(self
            .db
            .read()?
            .flags()
            .map(|(key, enabled)| (key.to_string(), enabled))
            .collect())
    }
}

/// Fixed flag set, handy for wiring tests and tools.
#[derive(Debug, Clone, Default)]
pub struct StaticFeatureFlags {
    flags: BTreeMap<String, bool>,
}

impl StaticFeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, enabled: bool) -> Self {
        self.flags.insert(key.to_string(), enabled);
        self
    }
}

#[async_trait]
impl FeatureFlags for StaticFeatureFlags {
    async fn is_enabled(&self, key: &str) -> Result<Option<bool>, StoreError> {
        Ok(self.flags.get(key.trim()).copied())
    }

    async fn all(&self) -> Result<Vec<(String, bool)>, StoreError> {
        Ok(self
            .flags
            .iter()
            .map(|(key, enabled)| (key.clone(), *enabled))
            .collect())
    }
}
