use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// API key
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
    Active,
    Revoked,
    Expired,
}

impl ApiKeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeyStatus::Active => "active",
            ApiKeyStatus::Revoked => "revoked",
            ApiKeyStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ApiKeyStatus::Active),
            "revoked" => Some(ApiKeyStatus::Revoked),
            "expired" => Some(ApiKeyStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for ApiKeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the plain key was minted here or by an upstream system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeySource {
    Local,
    External,
}

impl ApiKeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeySource::Local => "local",
            ApiKeySource::External => "external",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(ApiKeySource::Local),
            "external" => Some(ApiKeySource::External),
            _ => None,
        }
    }
}

/// An API key as stored: the plain form exists only in the create/rotate
/// response, `api_key` here is the hashed stored form.
///
/// Invariant: `source == External` implies `index_key` is set (SHA-256 of
/// the plain key, used for O(1) data-plane lookup).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: String,
    /// Unique per owning API.
    pub name: String,
    /// Stored (hashed) form; see the verification scheme prefixes.
    pub api_key: String,
    pub masked_api_key: String,
    pub api_id: String,
    /// Allowed operations, or `["*"]` for all.
    pub operations: Vec<String>,
    pub status: ApiKeyStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Provenance of `expires_at` when the client asked for a relative
    /// expiry, e.g. `("days", 30)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_duration: Option<i64>,
    pub source: ApiKeySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref_id: Option<String>,
    /// SHA-256 hex of the plain key; set only for external keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_key: Option<String>,
    #[serde(default)]
    pub display_name: String,
}

/// Mask a plain key for display: first four and last four characters with
/// a fixed-width filler, or all stars when the key is short.
pub fn mask_api_key(plain: &str) -> String {
    if plain.len() <= 8 {
        return "*".repeat(plain.len());
    }
    format!("{}****{}", &plain[..4], &plain[plain.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_keeps_ends() {
        assert_eq!(mask_api_key("gk_1234567890abcd"), "gk_1****abcd");
        assert_eq!(mask_api_key("short"), "*****");
    }
}
