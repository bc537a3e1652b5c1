use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Consent flag. Holds "agreed" or "denied".
pub const CONSENT_KEY: &str = "analytics.consent";
/// Pseudonymous installation identifier.
pub const ANALYTICS_ID_KEY: &str = "analytics.id";
/// Identifier carried over from the previous vendor integration.
pub const LEGACY_ID_KEY: &str = "analytics.legacyId";
/// Set to "true" once the one-time identity merge has run.
pub const IDENTITY_MERGED_KEY: &str = "analytics.identityMerged";
/// Vendor-issued id of the last deletion regulation.
pub const DELETION_REGULATION_ID_KEY: &str = "analytics.deletionRegulationId";
/// UTC date (day/month/year) of the last deletion request.
pub const DELETION_REQUEST_DATE_KEY: &str = "analytics.deletionRequestDate";

/// Device key-value storage for analytics preferences and identity
/// bookkeeping.
///
/// Absence of a key means "never set". There is no schema versioning; each
/// key is an independent string value.
#[async_trait]
pub trait PreferenceStore: Debug {
    /// Read a stored value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// A local in-memory store. Not for production use!
///
/// # Warning
/// This in-memory store should only be used for test purposes, it will not
/// survive a process restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    store: Arc<Mutex<BTreeMap<String, String>>>,
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.try_lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store
            .try_lock()?
            .insert(key.to_owned(), value.to_owned());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn absent_key_is_never_set() {
        let store = MemoryStore::default();
        assert_eq!(None, store.get(CONSENT_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn set_replaces_previous_value() {
        let store = MemoryStore::default();
        store.set(ANALYTICS_ID_KEY, "0xaa").await.unwrap();
        store.set(ANALYTICS_ID_KEY, "0xbb").await.unwrap();
        assert_eq!(Some("0xbb".to_owned()), store.get(ANALYTICS_ID_KEY).await.unwrap());
    }
}
