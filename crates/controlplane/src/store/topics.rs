//! Topic bookkeeping for WebSub-kind resources: which topics each config
//! currently has registered at the hub.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

/// Thread-safe `config id → set<topic>` map. Removing the last topic of a
/// config drops the config's inner set entirely.
#[derive(Default)]
pub struct TopicManager {
    inner: RwLock<HashMap<String, HashSet<String>>>,
}

impl TopicManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the topic was not already present.
    pub fn add(&self, config_id: &str, topic: &str) -> bool {
        self.inner
            .write()
            .entry(config_id.to_owned())
            .or_default()
            .insert(topic.to_owned())
    }

    /// Returns true when the topic was present.
    pub fn remove(&self, config_id: &str, topic: &str) -> bool {
        let mut map = self.inner.write();
        let Some(topics) = map.get_mut(config_id) else {
            return false;
        };
        let removed = topics.remove(topic);
        if topics.is_empty() {
            map.remove(config_id);
        }
        removed
    }

    pub fn remove_all_for_config(&self, config_id: &str) {
        self.inner.write().remove(config_id);
    }

    /// Replace a config's topic set wholesale.
    pub fn set_for_config(&self, config_id: &str, topics: HashSet<String>) {
        let mut map = self.inner.write();
        if topics.is_empty() {
            map.remove(config_id);
        } else {
            map.insert(config_id.to_owned(), topics);
        }
    }

    pub fn get_all_by_config(&self, config_id: &str) -> Vec<String> {
        self.inner
            .read()
            .get(config_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, config_id: &str, topic: &str) -> bool {
        self.inner
            .read()
            .get(config_id)
            .is_some_and(|set| set.contains(topic))
    }

    /// Number of unique topics across all configs.
    pub fn count(&self) -> usize {
        let map = self.inner.read();
        let mut unique: HashSet<&str> = HashSet::new();
        for topics in map.values() {
            for t in topics {
                unique.insert(t.as_str());
            }
        }
        unique.len()
    }

    pub fn count_for_config(&self, config_id: &str) -> usize {
        self.inner
            .read()
            .get(config_id)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Union of every config's topics.
    pub fn get_all(&self) -> HashSet<String> {
        let map = self.inner.read();
        let mut all = HashSet::new();
        for topics in map.values() {
            all.extend(topics.iter().cloned());
        }
        all
    }
}
