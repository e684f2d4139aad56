use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router (data-plane facing defaults)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Defaults the control plane projects into every route: the gateway host,
/// the virtual hosts a route is served on, and the system policies injected
/// into every policy chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "d_gateway_host")]
    pub gateway_host: String,
    /// Default vhosts for production traffic. Resources may override.
    #[serde(default = "d_main_vhosts")]
    pub main_vhosts: Vec<String>,
    /// Default vhosts for sandbox traffic. Used only when a resource
    /// declares a sandbox upstream.
    #[serde(default = "d_sandbox_vhosts")]
    pub sandbox_vhosts: Vec<String>,
    /// Policies injected into every chain regardless of what the resource
    /// declares (analytics, global rate limiting, ...). Order is preserved.
    #[serde(default)]
    pub system_policies: Vec<SystemPolicyConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            gateway_host: d_gateway_host(),
            main_vhosts: d_main_vhosts(),
            sandbox_vhosts: d_sandbox_vhosts(),
            system_policies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPolicyConfig {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Policy catalogue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The catalogue of policy definitions requests may reference. A request
/// referencing `(name, "v1")` resolves to the newest `v1.x.y` definition.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolicyCatalogConfig {
    #[serde(default)]
    pub definitions: Vec<PolicyDefinitionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDefinitionConfig {
    pub name: String,
    /// Full version, e.g. `v1.0.0`.
    pub version: String,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_gateway_host() -> String {
    "gateway.local".into()
}
fn d_main_vhosts() -> Vec<String> {
    vec!["localhost".into()]
}
fn d_sandbox_vhosts() -> Vec<String> {
    vec!["sandbox.localhost".into()]
}
