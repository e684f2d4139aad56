//! Generic `(type, id)`-addressed cache for referenced resources pushed
//! over the secondary xDS channel (LLM provider templates and friends).

use std::collections::HashMap;

use parking_lot::RwLock;

use gatehouse_domain::model::LazyResource;

#[derive(Default)]
pub struct LazyResourceStore {
    inner: RwLock<HashMap<(String, String), LazyResource>>,
}

impl LazyResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, resource: LazyResource) {
        self.inner.write().insert(resource.key(), resource);
    }

    pub fn get(&self, resource_type: &str, id: &str) -> Option<LazyResource> {
        self.inner
            .read()
            .get(&(resource_type.to_owned(), id.to_owned()))
            .cloned()
    }

    pub fn remove(&self, resource_type: &str, id: &str) -> Option<LazyResource> {
        self.inner
            .write()
            .remove(&(resource_type.to_owned(), id.to_owned()))
    }

    pub fn list(&self) -> Vec<LazyResource> {
        let inner = self.inner.read();
        let mut out: Vec<LazyResource> = inner.values().cloned().collect();
        out.sort_by(|a, b| a.key().cmp(&b.key()));
        out
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(rt: &str, id: &str) -> LazyResource {
        let mut data = serde_json::Map::new();
        data.insert("id".into(), serde_json::Value::String(id.into()));
        LazyResource {
            resource_type: rt.into(),
            id: id.into(),
            data,
        }
    }

    #[test]
    fn upsert_is_unique_per_type_and_id() {
        let store = LazyResourceStore::new();
        store.upsert(resource("template", "t1"));
        store.upsert(resource("template", "t1"));
        store.upsert(resource("certificate", "t1"));

        assert_eq!(store.len(), 2);
        assert!(store.get("template", "t1").is_some());
        assert!(store.get("certificate", "t1").is_some());

        store.remove("template", "t1");
        assert!(store.get("template", "t1").is_none());
        assert_eq!(store.len(), 1);
    }
}
