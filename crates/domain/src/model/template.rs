use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reusable LLM-provider template referenced by provider and proxy
/// resources. `handle` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLlmProviderTemplate {
    pub id: String,
    pub handle: String,
    /// Opaque template document (model mappings, auth shape, defaults).
    pub configuration: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
