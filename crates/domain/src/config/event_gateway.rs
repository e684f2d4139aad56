use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event gateway (WebSub hub)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where topic register/unregister calls go for WebSub-kind resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventGatewayConfig {
    #[serde(default = "d_hub_url")]
    pub hub_url: String,
    /// Per-call timeout for hub requests, in seconds.
    #[serde(default = "d_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for EventGatewayConfig {
    fn default() -> Self {
        Self {
            hub_url: d_hub_url(),
            timeout_seconds: d_timeout_seconds(),
        }
    }
}

fn d_hub_url() -> String {
    "http://127.0.0.1:9021/hub".into()
}
fn d_timeout_seconds() -> u64 {
    10
}
