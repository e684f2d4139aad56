//! Post-deploy notification to an upstream control plane. After a
//! successful mutation a per-record watcher polls the store until the
//! record reaches `Deployed`, then issues exactly one notification.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_domain::config::NotifierConfig;
use gatehouse_domain::model::{DeploymentStatus, StoredConfig};
use gatehouse_domain::{Error, Result};

use crate::store::ConfigStore;

/// The upstream control-plane client. `is_connected` gates watcher spawns
/// so a standalone deployment never polls for nothing.
#[async_trait::async_trait]
pub trait ControlPlaneClient: Send + Sync {
    fn is_connected(&self) -> bool;
    async fn notify_deployed(&self, cfg: &StoredConfig) -> Result<()>;
}

pub struct HttpControlPlaneClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpControlPlaneClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl ControlPlaneClient for HttpControlPlaneClient {
    fn is_connected(&self) -> bool {
        !self.base_url.is_empty()
    }

    async fn notify_deployed(&self, cfg: &StoredConfig) -> Result<()> {
        let url = format!("{}/notifications/deployments", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "id": cfg.id,
                "handle": cfg.handle,
                "kind": cfg.kind,
                "deployedVersion": cfg.deployed_version,
                "deployedAt": cfg.deployed_at,
            }))
            .send()
            .await
            .map_err(|e| Error::Http(format!("notify {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "notify {url}: status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

pub struct DeploymentNotifier {
    client: Arc<dyn ControlPlaneClient>,
    configs: Arc<ConfigStore>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl DeploymentNotifier {
    pub fn new(
        client: Arc<dyn ControlPlaneClient>,
        configs: Arc<ConfigStore>,
        config: &NotifierConfig,
    ) -> Self {
        Self {
            client,
            configs,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
        }
    }

    /// Spawn the per-record watcher. A no-op when no upstream is connected.
    /// Watchers are independent; no ordering across records.
    pub fn spawn_watch(self: &Arc<Self>, config_id: String, correlation_id: String) {
        if !self.client.is_connected() {
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.watch(&config_id, &correlation_id).await;
        });
    }

    async fn watch(&self, config_id: &str, correlation_id: &str) {
        let deadline = tokio::time::Instant::now() + self.poll_timeout;
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(config_id, correlation_id, "deploy watch timed out");
                return;
            }

            let Some(cfg) = self.configs.get(config_id) else {
                tracing::debug!(config_id, correlation_id, "watched record disappeared");
                return;
            };
            match cfg.status {
                DeploymentStatus::Pending => continue,
                DeploymentStatus::Failed => {
                    tracing::warn!(config_id, correlation_id, "deployment failed; not notifying");
                    return;
                }
                DeploymentStatus::Deployed => {
                    if let Err(e) = self.client.notify_deployed(&cfg).await {
                        tracing::warn!(config_id, correlation_id, error = %e, "deploy notification failed");
                    } else {
                        tracing::info!(config_id, correlation_id, "upstream notified of deployment");
                    }
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_domain::model::ConfigKind;
    use parking_lot::Mutex;

    use super::*;
    use crate::store::tests_fixtures::stored_config;

    #[derive(Default)]
    struct RecordingClient {
        connected: bool,
        notified: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ControlPlaneClient for RecordingClient {
        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn notify_deployed(&self, cfg: &StoredConfig) -> Result<()> {
            self.notified.lock().push(cfg.id.clone());
            Ok(())
        }
    }

    fn notifier_with(
        connected: bool,
        configs: Arc<ConfigStore>,
    ) -> (Arc<DeploymentNotifier>, Arc<RecordingClient>) {
        let client = Arc::new(RecordingClient {
            connected,
            notified: Mutex::new(vec![]),
        });
        let config = NotifierConfig {
            base_url: Some("http://upstream.local".into()),
            poll_interval_ms: 10,
            poll_timeout_secs: 1,
        };
        let notifier = Arc::new(DeploymentNotifier::new(client.clone(), configs, &config));
        (notifier, client)
    }

    #[tokio::test]
    async fn notifies_once_when_record_deploys() {
        let configs = Arc::new(ConfigStore::new());
        let cfg = stored_config(ConfigKind::RestApi, "orders-1", "Orders", "1.0.0");
        let id = cfg.id.clone();
        configs.add(cfg).expect("add");

        let (notifier, client) = notifier_with(true, configs.clone());
        notifier.spawn_watch(id.clone(), "corr".into());

        // Flip to Deployed after a couple of poll intervals.
        tokio::time::sleep(Duration::from_millis(30)).await;
        configs.apply_status(&id, |c| {
            c.status = DeploymentStatus::Deployed;
            c.deployed_version = 1;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.notified.lock().clone(), vec![id]);
    }

    #[tokio::test]
    async fn failed_deployment_is_not_notified() {
        let configs = Arc::new(ConfigStore::new());
        let cfg = stored_config(ConfigKind::RestApi, "orders-1", "Orders", "1.0.0");
        let id = cfg.id.clone();
        configs.add(cfg).expect("add");
        configs.apply_status(&id, |c| c.status = DeploymentStatus::Failed);

        let (notifier, client) = notifier_with(true, configs);
        notifier.spawn_watch(id, "corr".into());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(client.notified.lock().is_empty());
    }

    #[tokio::test]
    async fn disconnected_client_spawns_nothing() {
        let configs = Arc::new(ConfigStore::new());
        let (notifier, client) = notifier_with(false, configs);
        notifier.spawn_watch("any".into(), "corr".into());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(client.notified.lock().is_empty());
    }
}
