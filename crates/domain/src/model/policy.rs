use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Derived policy configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where a policy instance was attached when the chain was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyLevel {
    /// Declared on the API (or channel-less default).
    Api,
    /// Declared on the operation; overrides the API-level entry of the
    /// same name for that route.
    Route,
    /// Injected from server configuration, independent of user input.
    System,
}

/// One resolved policy occurrence inside a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyInstance {
    pub name: String,
    /// Fully-resolved version (`v1.0.0`), never the major shorthand.
    pub version: String,
    pub attached_to: PolicyLevel,
    pub enabled: bool,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_condition: Option<String>,
}

/// The ordered policy list for one (route, vhost) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyChain {
    /// Stable route key, identical to what the xDS translator emits.
    pub route_key: String,
    pub vhost: String,
    pub policies: Vec<PolicyInstance>,
}

/// Derived from a stored record after every successful mutation.
/// `id` is `<owner.id>-policies`; `(api_name, api_version, context)` is
/// unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPolicyConfig {
    pub id: String,
    pub api_name: String,
    pub api_version: String,
    pub context: String,
    pub chains: Vec<PolicyChain>,
}

impl StoredPolicyConfig {
    /// Id of the derived record owned by `owner_id`.
    pub fn id_for(owner_id: &str) -> String {
        format!("{owner_id}-policies")
    }

    pub fn composite_key(&self) -> String {
        composite_key(&self.api_name, &self.api_version, &self.context)
    }
}

pub fn composite_key(api_name: &str, api_version: &str, context: &str) -> String {
    format!("{api_name}:{api_version}:{context}")
}
