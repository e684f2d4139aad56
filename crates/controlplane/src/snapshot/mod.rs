//! The snapshotter: the single writer of the snapshot version. Serializes
//! the current store state, pushes it to the data plane through a
//! [`SnapshotSink`], and fires the deployment-status callback for every
//! record the push affected.

mod publisher;

pub use publisher::XdsPublisher;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use gatehouse_domain::model::{
    ApiKey, LazyResource, StoredCertificate, StoredConfig, StoredPolicyConfig,
};
use gatehouse_domain::{Error, Result};

use crate::store::{ApiKeyStore, CertificateStore, ConfigStore, LazyResourceStore, PolicyStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshot document + seams
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One data-plane configuration revision. The xDS adapter translates this
/// into its wire resources; the policy-engine sidecar consumes the policy
/// and API-key sub-snapshots; lazy resources go out on the secondary
/// channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub version: i64,
    pub apis: Vec<StoredConfig>,
    pub policies: Vec<StoredPolicyConfig>,
    pub api_keys: Vec<ApiKey>,
    pub api_key_resource_version: i64,
    pub certificates: Vec<StoredCertificate>,
    pub lazy_resources: Vec<LazyResource>,
    pub generated_at: DateTime<Utc>,
}

/// Where snapshots go. The production implementation fans out over a
/// broadcast channel to the xDS adapters; tests record or fail.
#[async_trait::async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn publish(&self, snapshot: &ConfigSnapshot) -> Result<()>;
}

/// Invoked once per affected record after a push attempt. Registered by
/// the deployment service at construction time; the registration-through-
/// interface breaks the snapshotter↔store-mutation cycle.
pub trait StatusCallback: Send + Sync {
    fn on_deploy_status(&self, config_id: &str, success: bool, version: i64, correlation_id: &str);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshotter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Snapshotter {
    configs: Arc<ConfigStore>,
    api_keys: Arc<ApiKeyStore>,
    policies: Arc<PolicyStore>,
    certificates: Arc<CertificateStore>,
    lazy: Arc<LazyResourceStore>,
    sink: Arc<dyn SnapshotSink>,
    callback: RwLock<Option<Arc<dyn StatusCallback>>>,
    push_timeout: Duration,
    /// Serializes update cycles: version assignment, push, callbacks.
    update_lock: tokio::sync::Mutex<()>,
    /// `id → updated_at` as of the last successful push; drives the
    /// appeared-or-changed set the callback fires for.
    pushed_state: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Snapshotter {
    pub fn new(
        configs: Arc<ConfigStore>,
        api_keys: Arc<ApiKeyStore>,
        policies: Arc<PolicyStore>,
        certificates: Arc<CertificateStore>,
        lazy: Arc<LazyResourceStore>,
        sink: Arc<dyn SnapshotSink>,
        push_timeout: Duration,
    ) -> Self {
        Self {
            configs,
            api_keys,
            policies,
            certificates,
            lazy,
            sink,
            callback: RwLock::new(None),
            push_timeout,
            update_lock: tokio::sync::Mutex::new(()),
            pushed_state: Mutex::new(HashMap::new()),
        }
    }

    /// Register the status callback. Must happen before the first update;
    /// done by the deployment service during bootstrap.
    pub fn set_status_callback(&self, cb: Arc<dyn StatusCallback>) {
        *self.callback.write() = Some(cb);
    }

    pub fn current_version(&self) -> i64 {
        self.configs.snapshot_version()
    }

    /// Build and push a new snapshot.
    ///
    /// Cancellation before the version is assigned aborts without
    /// incrementing; cancellation mid-push counts as a failed push
    /// (`success=false` to every affected record). Callbacks fire after
    /// all internal locks are released, in deterministic record order.
    pub async fn update_snapshot(
        &self,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<i64> {
        let _cycle = self.update_lock.lock().await;

        if cancel.is_cancelled() {
            return Err(Error::Internal("snapshot update cancelled".into()));
        }

        let version = self.configs.next_snapshot_version();
        let snapshot = self.build(version);

        let affected = self.affected_records(&snapshot);

        let pushed = tokio::select! {
            result = tokio::time::timeout(self.push_timeout, self.sink.publish(&snapshot)) => {
                match result {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        tracing::error!(version, correlation_id, error = %e, "snapshot push failed");
                        false
                    }
                    Err(_) => {
                        tracing::error!(version, correlation_id, "snapshot push timed out");
                        false
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::warn!(version, correlation_id, "snapshot push cancelled");
                false
            }
        };

        if pushed {
            let mut state = self.pushed_state.lock();
            state.retain(|id, _| snapshot.apis.iter().any(|c| &c.id == id));
            for cfg in &snapshot.apis {
                state.insert(cfg.id.clone(), cfg.updated_at);
            }
        }

        let callback = self.callback.read().clone();
        if let Some(cb) = callback {
            for id in &affected {
                cb.on_deploy_status(id, pushed, version, correlation_id);
            }
        } else if !affected.is_empty() {
            tracing::warn!(version, "no status callback registered");
        }

        tracing::info!(
            version,
            correlation_id,
            apis = snapshot.apis.len(),
            policies = snapshot.policies.len(),
            api_keys = snapshot.api_keys.len(),
            affected = affected.len(),
            success = pushed,
            "snapshot cycle complete"
        );

        if pushed {
            Ok(version)
        } else {
            Err(Error::Internal(format!("snapshot {version} push failed")))
        }
    }

    fn build(&self, version: i64) -> ConfigSnapshot {
        ConfigSnapshot {
            version,
            apis: self.configs.all(),
            policies: self.policies.list(),
            api_keys: self.api_keys.all(),
            api_key_resource_version: self.api_keys.resource_version(),
            certificates: self.certificates.list(),
            lazy_resources: self.lazy.list(),
            generated_at: Utc::now(),
        }
    }

    /// Records that appeared or changed since the last successful push,
    /// in stable id order.
    fn affected_records(&self, snapshot: &ConfigSnapshot) -> Vec<String> {
        let state = self.pushed_state.lock();
        let mut affected: Vec<String> = snapshot
            .apis
            .iter()
            .filter(|cfg| state.get(&cfg.id) != Some(&cfg.updated_at))
            .map(|cfg| cfg.id.clone())
            .collect();
        affected.sort();
        affected
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
