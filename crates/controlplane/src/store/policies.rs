//! Derived-policy index: one record per API, keyed by id and by the
//! `apiName:version:context` composite.

use std::collections::HashMap;

use parking_lot::RwLock;

use gatehouse_domain::model::StoredPolicyConfig;

#[derive(Default)]
struct Inner {
    by_id: HashMap<String, StoredPolicyConfig>,
    /// composite key → id
    by_composite: HashMap<String, String>,
}

#[derive(Default)]
pub struct PolicyStore {
    inner: RwLock<Inner>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. When the record existed under a different
    /// composite key (context or version changed) the old composite entry
    /// is dropped first.
    pub fn upsert(&self, cfg: StoredPolicyConfig) {
        let mut inner = self.inner.write();
        let old_key = inner.by_id.get(&cfg.id).map(|p| p.composite_key());
        if let Some(old_key) = old_key {
            if old_key != cfg.composite_key() {
                inner.by_composite.remove(&old_key);
            }
        }
        inner.by_composite.insert(cfg.composite_key(), cfg.id.clone());
        inner.by_id.insert(cfg.id.clone(), cfg);
    }

    /// Remove by id; a no-op for unknown ids.
    pub fn delete(&self, id: &str) -> Option<StoredPolicyConfig> {
        let mut inner = self.inner.write();
        let cfg = inner.by_id.remove(id)?;
        inner.by_composite.remove(&cfg.composite_key());
        Some(cfg)
    }

    pub fn get(&self, id: &str) -> Option<StoredPolicyConfig> {
        self.inner.read().by_id.get(id).cloned()
    }

    pub fn get_by_composite(
        &self,
        api_name: &str,
        api_version: &str,
        context: &str,
    ) -> Option<StoredPolicyConfig> {
        let inner = self.inner.read();
        let key = gatehouse_domain::model::composite_key(api_name, api_version, context);
        let id = inner.by_composite.get(&key)?;
        inner.by_id.get(id).cloned()
    }

    /// All derived records, sorted by `(api_name, api_version)` the way the
    /// list endpoint returns them.
    pub fn list(&self) -> Vec<StoredPolicyConfig> {
        let inner = self.inner.read();
        let mut out: Vec<StoredPolicyConfig> = inner.by_id.values().cloned().collect();
        out.sort_by(|a, b| {
            (a.api_name.as_str(), a.api_version.as_str())
                .cmp(&(b.api_name.as_str(), b.api_version.as_str()))
        });
        out
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, name: &str, version: &str, context: &str) -> StoredPolicyConfig {
        StoredPolicyConfig {
            id: id.into(),
            api_name: name.into(),
            api_version: version.into(),
            context: context.into(),
            chains: vec![],
        }
    }

    #[test]
    fn upsert_and_composite_lookup() {
        let store = PolicyStore::new();
        store.upsert(sample("a-policies", "Orders", "1.0.0", "/orders"));

        assert!(store.get("a-policies").is_some());
        assert!(store
            .get_by_composite("Orders", "1.0.0", "/orders")
            .is_some());
    }

    #[test]
    fn upsert_with_changed_composite_drops_old_key() {
        let store = PolicyStore::new();
        store.upsert(sample("a-policies", "Orders", "1.0.0", "/orders"));
        store.upsert(sample("a-policies", "Orders", "2.0.0", "/orders"));

        assert!(store.get_by_composite("Orders", "1.0.0", "/orders").is_none());
        assert!(store.get_by_composite("Orders", "2.0.0", "/orders").is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_removes_both_indexes() {
        let store = PolicyStore::new();
        store.upsert(sample("a-policies", "Orders", "1.0.0", "/orders"));
        store.delete("a-policies");

        assert!(store.get("a-policies").is_none());
        assert!(store.get_by_composite("Orders", "1.0.0", "/orders").is_none());
        assert!(store.delete("a-policies").is_none());
    }

    #[test]
    fn list_is_sorted_by_name_then_version() {
        let store = PolicyStore::new();
        store.upsert(sample("b", "Billing", "2.0.0", "/b2"));
        store.upsert(sample("a", "Billing", "1.0.0", "/b1"));
        store.upsert(sample("c", "Auth", "1.0.0", "/a"));

        let names: Vec<_> = store
            .list()
            .into_iter()
            .map(|p| format!("{} {}", p.api_name, p.api_version))
            .collect();
        assert_eq!(names, vec!["Auth 1.0.0", "Billing 1.0.0", "Billing 2.0.0"]);
    }
}
