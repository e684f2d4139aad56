use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::declarative::ApiDeclaration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resource kind / deployment status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The resource family a stored configuration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigKind {
    RestApi,
    WebSubApi,
    Mcp,
    LlmProvider,
    LlmProxy,
}

impl ConfigKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKind::RestApi => "RestApi",
            ConfigKind::WebSubApi => "WebSubApi",
            ConfigKind::Mcp => "Mcp",
            ConfigKind::LlmProvider => "LlmProvider",
            ConfigKind::LlmProxy => "LlmProxy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RestApi" => Some(ConfigKind::RestApi),
            "WebSubApi" => Some(ConfigKind::WebSubApi),
            "Mcp" => Some(ConfigKind::Mcp),
            "LlmProvider" => Some(ConfigKind::LlmProvider),
            "LlmProxy" => Some(ConfigKind::LlmProxy),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a record relative to the data plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Deployed,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Deployed => "deployed",
            DeploymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeploymentStatus::Pending),
            "deployed" => Some(DeploymentStatus::Deployed),
            "failed" => Some(DeploymentStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stored configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The unit of orchestration: one declared resource, normalized and tracked
/// through its deployment lifecycle.
///
/// `handle` is unique across all kinds; `display_name:version` is unique
/// across records. `deployed_at` is set iff `status == Deployed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredConfig {
    /// Server-assigned stable identifier.
    pub id: String,
    /// User-chosen name, unique across all kinds.
    pub handle: String,
    pub kind: ConfigKind,
    pub display_name: String,
    pub version: String,
    pub context: Option<String>,
    /// Normalized form consumed by the xDS translator.
    pub configuration: serde_json::Value,
    /// Original declarative form as the client supplied it.
    pub source_configuration: ApiDeclaration,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deployed_at: Option<DateTime<Utc>>,
    /// Version of the last snapshot that included this record; 0 until the
    /// first successful push.
    pub deployed_version: i64,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl StoredConfig {
    /// Composite key for the `display_name:version` uniqueness index.
    pub fn name_version_key(&self) -> String {
        name_version_key(&self.display_name, &self.version)
    }
}

pub fn name_version_key(display_name: &str, version: &str) -> String {
    format!("{display_name}:{version}")
}
