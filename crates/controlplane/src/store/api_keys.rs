//! In-memory API-key index: per-API key maps plus the external-key
//! fingerprint index the data-plane policy engine consults in O(1).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;

use gatehouse_domain::model::{ApiKey, ApiKeySource};

#[derive(Default)]
struct Inner {
    /// api id → key id → key
    by_api: HashMap<String, HashMap<String, ApiKey>>,
    /// api id → index key (SHA-256 of plain) → key id
    external_index: HashMap<String, HashMap<String, String>>,
}

/// Invariant maintained here: `external_index` points at exactly the
/// external-source keys present in `by_api`; never dangling.
#[derive(Default)]
pub struct ApiKeyStore {
    inner: RwLock<Inner>,
    /// Bumped on every key mutation; versions the key sub-snapshot.
    resource_version: AtomicI64,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a key. A previous entry with the same
    /// `(api_id, id)` — rotation — gets its external-index entry removed
    /// before the new one lands so the index never leaks stale
    /// fingerprints.
    pub fn insert(&self, key: ApiKey) {
        let mut inner = self.inner.write();
        let api_keys = inner.by_api.entry(key.api_id.clone()).or_default();
        let prior = api_keys.insert(key.id.clone(), key.clone());

        if let Some(prior) = prior {
            if let Some(old_index) = prior.index_key {
                if let Some(idx) = inner.external_index.get_mut(&key.api_id) {
                    idx.remove(&old_index);
                }
            }
        }
        if key.source == ApiKeySource::External {
            if let Some(index_key) = &key.index_key {
                inner
                    .external_index
                    .entry(key.api_id.clone())
                    .or_default()
                    .insert(index_key.clone(), key.id.clone());
            }
        }
    }

    /// Remove a key from every index. Returns the removed key.
    pub fn remove(&self, api_id: &str, key_id: &str) -> Option<ApiKey> {
        let mut inner = self.inner.write();
        let api_keys = inner.by_api.get_mut(api_id)?;
        let removed = api_keys.remove(key_id)?;
        if api_keys.is_empty() {
            inner.by_api.remove(api_id);
        }
        if let Some(index_key) = &removed.index_key {
            if let Some(idx) = inner.external_index.get_mut(api_id) {
                idx.remove(index_key);
                if idx.is_empty() {
                    inner.external_index.remove(api_id);
                }
            }
        }
        Some(removed)
    }

    /// Drop every key of an API (API deletion). Returns the removed keys.
    pub fn remove_all_for_api(&self, api_id: &str) -> Vec<ApiKey> {
        let mut inner = self.inner.write();
        inner.external_index.remove(api_id);
        inner
            .by_api
            .remove(api_id)
            .map(|m| m.into_values().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, api_id: &str, key_id: &str) -> Option<ApiKey> {
        self.inner
            .read()
            .by_api
            .get(api_id)
            .and_then(|m| m.get(key_id))
            .cloned()
    }

    pub fn get_by_api(&self, api_id: &str) -> Vec<ApiKey> {
        let inner = self.inner.read();
        let mut out: Vec<ApiKey> = inner
            .by_api
            .get(api_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn find_by_name(&self, api_id: &str, name: &str) -> Option<ApiKey> {
        self.inner
            .read()
            .by_api
            .get(api_id)
            .and_then(|m| m.values().find(|k| k.name == name))
            .cloned()
    }

    /// O(1) lookup by SHA-256 fingerprint of the plain key.
    pub fn external_lookup(&self, api_id: &str, index_key: &str) -> Option<String> {
        self.inner
            .read()
            .external_index
            .get(api_id)
            .and_then(|m| m.get(index_key))
            .cloned()
    }

    /// Every key across every API, for the snapshot.
    pub fn all(&self) -> Vec<ApiKey> {
        let inner = self.inner.read();
        let mut out: Vec<ApiKey> = inner
            .by_api
            .values()
            .flat_map(|m| m.values().cloned())
            .collect();
        out.sort_by(|a, b| (a.api_id.clone(), a.name.clone()).cmp(&(b.api_id.clone(), b.name.clone())));
        out
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_api.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bump_version(&self) -> i64 {
        self.resource_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn resource_version(&self) -> i64 {
        self.resource_version.load(Ordering::SeqCst)
    }
}
