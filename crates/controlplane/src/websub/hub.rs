//! HTTP client for the WebSub hub.

use std::time::Duration;

use gatehouse_domain::config::EventGatewayConfig;
use gatehouse_domain::{Error, Result};

/// The two calls the reconciler makes against a hub. Object-safe so tests
/// can script failures.
#[async_trait::async_trait]
pub trait HubClient: Send + Sync {
    async fn register(&self, topic: &str) -> Result<()>;
    async fn unregister(&self, topic: &str) -> Result<()>;
}

pub struct HttpHubClient {
    client: reqwest::Client,
    hub_url: String,
    timeout: Duration,
}

impl HttpHubClient {
    pub fn new(config: &EventGatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            hub_url: config.hub_url.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    async fn call(&self, mode: &str, topic: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.hub_url)
            .timeout(self.timeout)
            .form(&[("hub.mode", mode), ("hub.topic", topic)])
            .send()
            .await
            .map_err(|e| Error::Http(format!("hub {mode} {topic}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "hub {mode} {topic}: status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl HubClient for HttpHubClient {
    async fn register(&self, topic: &str) -> Result<()> {
        self.call("register", topic).await
    }

    async fn unregister(&self, topic: &str) -> Result<()> {
        self.call("unregister", topic).await
    }
}
