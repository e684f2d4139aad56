//! WebSub topic reconciliation: derives the topic set of a WebSub-kind
//! resource, diffs it against the bookkeeping in [`TopicManager`], and
//! drives the hub over HTTP.

mod hub;

pub use hub::{HttpHubClient, HubClient};

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;

use gatehouse_domain::model::StoredConfig;
use gatehouse_domain::{Error, Result};

use crate::store::TopicManager;

/// Hub calls within one register/unregister group run concurrently, but
/// bounded so a channel-heavy resource cannot spawn unbounded tasks.
const MAX_HUB_CONCURRENCY: usize = 16;

/// Topic name for one channel: the context with `{version}` substituted
/// and slashes collapsed to underscores, then the channel name.
///
/// `/orders/{version}` + version `1.0.0` + channel `created`
/// → `orders_1.0.0_created`.
pub fn derive_topics(cfg: &StoredConfig) -> HashSet<String> {
    let context = cfg.context.as_deref().unwrap_or("");
    let prefix = context
        .replace("{version}", &cfg.version)
        .trim_matches('/')
        .replace('/', "_");
    cfg.source_configuration
        .channels
        .iter()
        .map(|ch| {
            if prefix.is_empty() {
                ch.name.clone()
            } else {
                format!("{prefix}_{}", ch.name)
            }
        })
        .collect()
}

pub struct TopicReconciler {
    hub: Arc<dyn HubClient>,
}

impl TopicReconciler {
    pub fn new(hub: Arc<dyn HubClient>) -> Self {
        Self { hub }
    }

    /// Diff the derived topic set of `cfg` against the topic manager's
    /// current state for this config: `(to_register, to_unregister)`.
    pub fn topics_for_update(
        &self,
        cfg: &StoredConfig,
        topics: &TopicManager,
    ) -> (Vec<String>, Vec<String>) {
        let desired = derive_topics(cfg);
        let current: HashSet<String> = topics.get_all_by_config(&cfg.id).into_iter().collect();

        let mut to_register: Vec<String> = desired.difference(&current).cloned().collect();
        let mut to_unregister: Vec<String> = current.difference(&desired).cloned().collect();
        to_register.sort();
        to_unregister.sort();
        (to_register, to_unregister)
    }

    /// Every topic currently registered for `cfg`, for deletion paths.
    pub fn topics_for_delete(&self, cfg: &StoredConfig, topics: &TopicManager) -> Vec<String> {
        let mut out = topics.get_all_by_config(&cfg.id);
        out.sort();
        out
    }

    /// Run the register and unregister groups in parallel, each call in
    /// parallel within its group. Every failure is counted; the whole call
    /// waits for completion and fails when either counter is non-zero.
    pub async fn execute(&self, to_register: &[String], to_unregister: &[String]) -> Result<()> {
        let register_failures = Arc::new(AtomicUsize::new(0));
        let unregister_failures = Arc::new(AtomicUsize::new(0));

        let register = {
            let register_failures = register_failures.clone();
            let hub = self.hub.clone();
            futures_util::stream::iter(to_register).for_each_concurrent(
                MAX_HUB_CONCURRENCY,
                move |topic| -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
                    let register_failures = register_failures.clone();
                    let hub = hub.clone();
                    Box::pin(async move {
                        if let Err(e) = hub.register(topic).await {
                            tracing::warn!(topic = %topic, error = %e, "topic registration failed");
                            register_failures.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                },
            )
        };
        let unregister = {
            let unregister_failures = unregister_failures.clone();
            let hub = self.hub.clone();
            futures_util::stream::iter(to_unregister).for_each_concurrent(
                MAX_HUB_CONCURRENCY,
                move |topic| -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
                    let unregister_failures = unregister_failures.clone();
                    let hub = hub.clone();
                    Box::pin(async move {
                        if let Err(e) = hub.unregister(topic).await {
                            tracing::warn!(topic = %topic, error = %e, "topic deregistration failed");
                            unregister_failures.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                },
            )
        };
        tokio::join!(register, unregister);

        let failed_registers = register_failures.load(Ordering::SeqCst);
        let failed_unregisters = unregister_failures.load(Ordering::SeqCst);
        if failed_registers > 0 || failed_unregisters > 0 {
            return Err(Error::Internal(format!(
                "hub reconciliation failed: {failed_registers} registrations, \
                 {failed_unregisters} deregistrations"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashSet;

    use parking_lot::Mutex;

    use super::*;

    /// Hub double that records calls and fails the configured topics.
    #[derive(Default)]
    pub struct ScriptedHub {
        pub fail_topics: HashSet<String>,
        pub registered: Mutex<Vec<String>>,
        pub unregistered: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl HubClient for ScriptedHub {
        async fn register(&self, topic: &str) -> Result<()> {
            if self.fail_topics.contains(topic) {
                return Err(Error::Http(format!("hub rejected {topic}")));
            }
            self.registered.lock().push(topic.to_owned());
            Ok(())
        }

        async fn unregister(&self, topic: &str) -> Result<()> {
            if self.fail_topics.contains(topic) {
                return Err(Error::Http(format!("hub rejected {topic}")));
            }
            self.unregistered.lock().push(topic.to_owned());
            Ok(())
        }
    }
}
