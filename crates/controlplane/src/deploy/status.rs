//! The deployment-status callback the snapshotter fires after each push
//! attempt. Applies the transition to the in-memory store first (it is
//! authoritative for reads) and then best-effort to the database.

use std::sync::Arc;

use chrono::Utc;

use gatehouse_domain::model::DeploymentStatus;
use gatehouse_storage::PersistentStorage;

use crate::snapshot::StatusCallback;
use crate::store::ConfigStore;

pub struct DeployStatusCallback {
    configs: Arc<ConfigStore>,
    storage: Arc<PersistentStorage>,
}

impl DeployStatusCallback {
    pub fn new(configs: Arc<ConfigStore>, storage: Arc<PersistentStorage>) -> Self {
        Self { configs, storage }
    }
}

impl StatusCallback for DeployStatusCallback {
    fn on_deploy_status(&self, config_id: &str, success: bool, version: i64, correlation_id: &str) {
        let updated = self.configs.apply_status(config_id, |cfg| {
            if success {
                // deployed_version is monotone; a late callback for an
                // older snapshot must not roll it back.
                if version >= cfg.deployed_version {
                    cfg.status = DeploymentStatus::Deployed;
                    cfg.deployed_at = Some(Utc::now());
                    cfg.deployed_version = version;
                }
            } else {
                cfg.status = DeploymentStatus::Failed;
                cfg.deployed_at = None;
                cfg.deployed_version = 0;
            }
        });

        let Some(cfg) = updated else {
            // Deleted in-flight; nothing to record.
            tracing::debug!(config_id, version, correlation_id, "status callback for missing record");
            return;
        };

        if let Err(e) = self.storage.set_deployment_status(
            config_id,
            cfg.status,
            cfg.deployed_at,
            cfg.deployed_version,
        ) {
            // The in-memory store stays authoritative; the row converges on
            // the next snapshot cycle.
            tracing::warn!(
                config_id,
                version,
                correlation_id,
                error = %e,
                "failed to persist deployment status"
            );
        }

        tracing::info!(
            config_id,
            success,
            version,
            correlation_id,
            status = %cfg.status,
            "deployment status applied"
        );
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_domain::model::ConfigKind;

    use super::*;
    use crate::store::tests_fixtures::stored_config;

    fn setup() -> (Arc<ConfigStore>, Arc<PersistentStorage>, DeployStatusCallback) {
        let configs = Arc::new(ConfigStore::new());
        let storage = Arc::new(PersistentStorage::open_in_memory().expect("open"));
        let cb = DeployStatusCallback::new(configs.clone(), storage.clone());
        (configs, storage, cb)
    }

    #[test]
    fn success_marks_deployed_in_store_and_db() {
        let (configs, storage, cb) = setup();
        let cfg = stored_config(ConfigKind::RestApi, "orders-1", "Orders", "1.0.0");
        let id = cfg.id.clone();
        storage.insert_deployment(&cfg).expect("db insert");
        configs.add(cfg).expect("add");

        cb.on_deploy_status(&id, true, 3, "corr");

        let mem = configs.get(&id).expect("record");
        assert_eq!(mem.status, DeploymentStatus::Deployed);
        assert_eq!(mem.deployed_version, 3);
        assert!(mem.deployed_at.is_some());

        let row = storage.get_deployment(&id).expect("get").expect("row");
        assert_eq!(row.status, DeploymentStatus::Deployed);
        assert_eq!(row.deployed_version, 3);
    }

    #[test]
    fn failure_marks_failed_and_resets_version() {
        let (configs, storage, cb) = setup();
        let cfg = stored_config(ConfigKind::RestApi, "orders-1", "Orders", "1.0.0");
        let id = cfg.id.clone();
        storage.insert_deployment(&cfg).expect("db insert");
        configs.add(cfg).expect("add");

        cb.on_deploy_status(&id, true, 3, "corr");
        cb.on_deploy_status(&id, false, 4, "corr");

        let mem = configs.get(&id).expect("record");
        assert_eq!(mem.status, DeploymentStatus::Failed);
        assert_eq!(mem.deployed_version, 0);
        assert!(mem.deployed_at.is_none());
    }

    /// Per-record deployed_version sequences under successful pushes are
    /// strictly monotone: a late, older callback is ignored.
    #[test]
    fn stale_success_does_not_roll_back_version() {
        let (configs, storage, cb) = setup();
        let cfg = stored_config(ConfigKind::RestApi, "orders-1", "Orders", "1.0.0");
        let id = cfg.id.clone();
        storage.insert_deployment(&cfg).expect("db insert");
        configs.add(cfg).expect("add");

        cb.on_deploy_status(&id, true, 5, "corr");
        cb.on_deploy_status(&id, true, 4, "corr");

        assert_eq!(configs.get(&id).expect("record").deployed_version, 5);
    }

    #[test]
    fn missing_record_is_ignored() {
        let (_configs, _storage, cb) = setup();
        // No panic, no insert.
        cb.on_deploy_status("ghost", true, 1, "corr");
    }
}
