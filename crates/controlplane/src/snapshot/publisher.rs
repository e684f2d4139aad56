//! In-process snapshot fan-out. The xDS adapter (and the policy-engine
//! sidecar bridge) subscribe here; the wire encoding is theirs.

use std::sync::Arc;

use tokio::sync::broadcast;

use gatehouse_domain::Result;

use super::{ConfigSnapshot, SnapshotSink};

pub struct XdsPublisher {
    tx: broadcast::Sender<Arc<ConfigSnapshot>>,
}

impl Default for XdsPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl XdsPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ConfigSnapshot>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait::async_trait]
impl SnapshotSink for XdsPublisher {
    async fn publish(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        // No subscribers yet is not a failure; consumers replay from the
        // next snapshot once connected.
        match self.tx.send(Arc::new(snapshot.clone())) {
            Ok(receivers) => {
                tracing::debug!(version = snapshot.version, receivers, "snapshot published");
            }
            Err(_) => {
                tracing::debug!(version = snapshot.version, "snapshot published (no subscribers)");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_snapshots() {
        let publisher = XdsPublisher::new();
        let mut rx = publisher.subscribe();

        let snapshot = ConfigSnapshot {
            version: 42,
            apis: vec![],
            policies: vec![],
            api_keys: vec![],
            api_key_resource_version: 0,
            certificates: vec![],
            lazy_resources: vec![],
            generated_at: Utc::now(),
        };
        publisher.publish(&snapshot).await.expect("publish");

        let received = rx.recv().await.expect("receive");
        assert_eq!(received.version, 42);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let publisher = XdsPublisher::new();
        let snapshot = ConfigSnapshot {
            version: 1,
            apis: vec![],
            policies: vec![],
            api_keys: vec![],
            api_key_resource_version: 0,
            certificates: vec![],
            lazy_resources: vec![],
            generated_at: Utc::now(),
        };
        publisher.publish(&snapshot).await.expect("publish");
    }
}
