use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Upstream control-plane notifier
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Optional callback to an upstream control plane after a resource
/// reaches `Deployed`. Disabled when `base_url` is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    /// How often the post-deploy watcher polls the store.
    #[serde(default = "d_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long the watcher waits for `Deployed` before giving up.
    #[serde(default = "d_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            poll_interval_ms: d_poll_interval_ms(),
            poll_timeout_secs: d_poll_timeout_secs(),
        }
    }
}

fn d_poll_interval_ms() -> u64 {
    500
}
fn d_poll_timeout_secs() -> u64 {
    30
}
