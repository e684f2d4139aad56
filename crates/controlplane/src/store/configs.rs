//! The primary in-memory index of all stored configurations.
//!
//! One writer lock guards the record map and every secondary index so a
//! reader never observes a half-applied mutation. Reads hand out owned
//! clones; nothing outside this module can mutate a stored record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;

use gatehouse_domain::model::{
    name_version_key, ConfigKind, StoredConfig, StoredLlmProviderTemplate,
};
use gatehouse_domain::{Error, Result};

use super::topics::TopicManager;
use crate::websub::derive_topics;

#[derive(Default)]
struct Indexes {
    by_id: HashMap<String, StoredConfig>,
    /// handle → id
    by_handle: HashMap<String, String>,
    /// `display_name:version` → id
    by_name_version: HashMap<String, String>,
    /// handle → labels, kept in lockstep with handle changes
    labels_by_handle: HashMap<String, HashMap<String, String>>,
    templates: HashMap<String, StoredLlmProviderTemplate>,
    /// template handle → id
    template_by_handle: HashMap<String, String>,
}

pub struct ConfigStore {
    inner: RwLock<Indexes>,
    /// Mirror of the snapshot version for lock-free reads; writes happen
    /// inside the writer lock (the snapshotter is the only writer).
    snapshot_version: AtomicI64,
    topics: TopicManager,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Indexes::default()),
            snapshot_version: AtomicI64::new(0),
            topics: TopicManager::new(),
        }
    }

    // ── Configurations ──────────────────────────────────────────────

    /// Insert a new record. `Conflict` when the handle or the
    /// `(display_name, version)` pair is taken. WebSub kinds get their
    /// derived topic set registered in the topic manager.
    pub fn add(&self, cfg: StoredConfig) -> Result<()> {
        let mut idx = self.inner.write();
        if idx.by_handle.contains_key(&cfg.handle) {
            return Err(Error::Conflict(format!(
                "handle {:?} already exists",
                cfg.handle
            )));
        }
        let nv_key = cfg.name_version_key();
        if idx.by_name_version.contains_key(&nv_key) {
            return Err(Error::Conflict(format!(
                "{} version {} already exists",
                cfg.display_name, cfg.version
            )));
        }

        idx.by_handle.insert(cfg.handle.clone(), cfg.id.clone());
        idx.by_name_version.insert(nv_key, cfg.id.clone());
        if !cfg.labels.is_empty() {
            idx.labels_by_handle
                .insert(cfg.handle.clone(), cfg.labels.clone());
        }
        if cfg.kind == ConfigKind::WebSubApi {
            self.topics.set_for_config(&cfg.id, derive_topics(&cfg));
        }
        idx.by_id.insert(cfg.id.clone(), cfg);
        Ok(())
    }

    /// Replace an existing record. `NotFound` when the id is unknown;
    /// `Conflict` when changed identifying fields collide with another
    /// record. Secondary indexes mutate only after uniqueness holds.
    pub fn update(&self, cfg: StoredConfig) -> Result<()> {
        let mut idx = self.inner.write();
        let prior = idx
            .by_id
            .get(&cfg.id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("configuration {}", cfg.id)))?;

        let nv_key = cfg.name_version_key();
        if cfg.handle != prior.handle {
            if let Some(other) = idx.by_handle.get(&cfg.handle) {
                if other != &cfg.id {
                    return Err(Error::Conflict(format!(
                        "handle {:?} already exists",
                        cfg.handle
                    )));
                }
            }
        }
        if nv_key != prior.name_version_key() {
            if let Some(other) = idx.by_name_version.get(&nv_key) {
                if other != &cfg.id {
                    return Err(Error::Conflict(format!(
                        "{} version {} already exists",
                        cfg.display_name, cfg.version
                    )));
                }
            }
        }

        // Uniqueness verified; now move the secondary indexes.
        if cfg.handle != prior.handle {
            idx.by_handle.remove(&prior.handle);
            idx.labels_by_handle.remove(&prior.handle);
        }
        idx.by_handle.insert(cfg.handle.clone(), cfg.id.clone());
        if nv_key != prior.name_version_key() {
            idx.by_name_version.remove(&prior.name_version_key());
        }
        idx.by_name_version.insert(nv_key, cfg.id.clone());
        if cfg.labels.is_empty() {
            idx.labels_by_handle.remove(&cfg.handle);
        } else {
            idx.labels_by_handle
                .insert(cfg.handle.clone(), cfg.labels.clone());
        }
        if cfg.kind == ConfigKind::WebSubApi {
            self.topics.set_for_config(&cfg.id, derive_topics(&cfg));
        }
        idx.by_id.insert(cfg.id.clone(), cfg);
        Ok(())
    }

    /// Remove a record and every index entry derived from it.
    pub fn delete(&self, id: &str) -> Result<StoredConfig> {
        let mut idx = self.inner.write();
        let cfg = idx
            .by_id
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("configuration {id}")))?;
        idx.by_handle.remove(&cfg.handle);
        idx.by_name_version.remove(&cfg.name_version_key());
        idx.labels_by_handle.remove(&cfg.handle);
        self.topics.remove_all_for_config(id);
        Ok(cfg)
    }

    /// Apply a snapshot-status transition in place and return the updated
    /// record. `None` when the record no longer exists (deleted in-flight).
    pub fn apply_status<F>(&self, id: &str, f: F) -> Option<StoredConfig>
    where
        F: FnOnce(&mut StoredConfig),
    {
        let mut idx = self.inner.write();
        let cfg = idx.by_id.get_mut(id)?;
        f(cfg);
        Some(cfg.clone())
    }

    pub fn get(&self, id: &str) -> Option<StoredConfig> {
        self.inner.read().by_id.get(id).cloned()
    }

    pub fn get_by_handle(&self, handle: &str) -> Option<StoredConfig> {
        let idx = self.inner.read();
        let id = idx.by_handle.get(handle)?;
        idx.by_id.get(id).cloned()
    }

    pub fn get_by_name_version(&self, display_name: &str, version: &str) -> Option<StoredConfig> {
        let idx = self.inner.read();
        let id = idx
            .by_name_version
            .get(&name_version_key(display_name, version))?;
        idx.by_id.get(id).cloned()
    }

    pub fn get_all_by_kind(&self, kind: ConfigKind) -> Vec<StoredConfig> {
        let idx = self.inner.read();
        let mut out: Vec<StoredConfig> = idx
            .by_id
            .values()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.handle.cmp(&b.handle));
        out
    }

    pub fn get_by_kind_and_handle(&self, kind: ConfigKind, handle: &str) -> Option<StoredConfig> {
        self.get_by_handle(handle).filter(|c| c.kind == kind)
    }

    pub fn get_by_kind_name_and_version(
        &self,
        kind: ConfigKind,
        display_name: &str,
        version: &str,
    ) -> Option<StoredConfig> {
        self.get_by_name_version(display_name, version)
            .filter(|c| c.kind == kind)
    }

    pub fn all(&self) -> Vec<StoredConfig> {
        let idx = self.inner.read();
        let mut out: Vec<StoredConfig> = idx.by_id.values().cloned().collect();
        out.sort_by(|a, b| a.handle.cmp(&b.handle));
        out
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labels_for(&self, handle: &str) -> Option<HashMap<String, String>> {
        self.inner.read().labels_by_handle.get(handle).cloned()
    }

    // ── LLM provider templates ──────────────────────────────────────

    pub fn add_template(&self, tpl: StoredLlmProviderTemplate) -> Result<()> {
        let mut idx = self.inner.write();
        if idx.template_by_handle.contains_key(&tpl.handle) {
            return Err(Error::Conflict(format!(
                "template handle {:?} already exists",
                tpl.handle
            )));
        }
        idx.template_by_handle
            .insert(tpl.handle.clone(), tpl.id.clone());
        idx.templates.insert(tpl.id.clone(), tpl);
        Ok(())
    }

    pub fn update_template(&self, tpl: StoredLlmProviderTemplate) -> Result<()> {
        let mut idx = self.inner.write();
        let prior = idx
            .templates
            .get(&tpl.id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("template {}", tpl.id)))?;
        if tpl.handle != prior.handle {
            if let Some(other) = idx.template_by_handle.get(&tpl.handle) {
                if other != &tpl.id {
                    return Err(Error::Conflict(format!(
                        "template handle {:?} already exists",
                        tpl.handle
                    )));
                }
            }
            idx.template_by_handle.remove(&prior.handle);
        }
        idx.template_by_handle
            .insert(tpl.handle.clone(), tpl.id.clone());
        idx.templates.insert(tpl.id.clone(), tpl);
        Ok(())
    }

    pub fn delete_template(&self, id: &str) -> Result<StoredLlmProviderTemplate> {
        let mut idx = self.inner.write();
        let tpl = idx
            .templates
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("template {id}")))?;
        idx.template_by_handle.remove(&tpl.handle);
        Ok(tpl)
    }

    pub fn get_template(&self, id: &str) -> Option<StoredLlmProviderTemplate> {
        self.inner.read().templates.get(id).cloned()
    }

    pub fn get_template_by_handle(&self, handle: &str) -> Option<StoredLlmProviderTemplate> {
        let idx = self.inner.read();
        let id = idx.template_by_handle.get(handle)?;
        idx.templates.get(id).cloned()
    }

    pub fn list_templates(&self) -> Vec<StoredLlmProviderTemplate> {
        let idx = self.inner.read();
        let mut out: Vec<StoredLlmProviderTemplate> = idx.templates.values().cloned().collect();
        out.sort_by(|a, b| a.handle.cmp(&b.handle));
        out
    }

    // ── Snapshot version / topics ───────────────────────────────────

    /// Next snapshot version. Taken inside the writer lock so the version
    /// and the state it describes move together; only the snapshotter
    /// calls this.
    pub fn next_snapshot_version(&self) -> i64 {
        let _guard = self.inner.write();
        self.snapshot_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Lock-free read of the current snapshot version.
    pub fn snapshot_version(&self) -> i64 {
        self.snapshot_version.load(Ordering::SeqCst)
    }

    pub fn topics(&self) -> &TopicManager {
        &self.topics
    }
}
