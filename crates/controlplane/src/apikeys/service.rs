//! The API-key service. Every mutation keeps the dual-write invariant
//! (database row first, then the in-memory index) and ends by bumping the
//! key resource version and requesting a snapshot so the policy-engine
//! sidecar learns the change in the same deployment cycle.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use gatehouse_domain::model::{
    mask_api_key, ApiKey, ApiKeySource, ApiKeyStatus, ConfigKind, StoredConfig,
};
use gatehouse_domain::{Error, FieldError, Result};
use gatehouse_storage::PersistentStorage;

use super::hash::{generate_api_key, hash_api_key, sha256_hex, verify_api_key};
use crate::snapshot::Snapshotter;
use crate::store::{ApiKeyStore, ConfigStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiresIn {
    /// `minutes`, `hours` or `days`.
    pub unit: String,
    pub duration: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyParams {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Allowed operations; defaults to `["*"]`.
    #[serde(default)]
    pub operations: Option<Vec<String>>,
    #[serde(default)]
    pub expires_in: Option<ExpiresIn>,
    /// `local` (default) mints a key here; `external` accepts one.
    #[serde(default)]
    pub source: Option<ApiKeySource>,
    /// The externally-minted plain key. Required when `source=external`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub external_ref_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApiKeyParams {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub operations: Option<Vec<String>>,
    #[serde(default)]
    pub expires_in: Option<ExpiresIn>,
}

/// A created or regenerated key: the plain form leaves the service exactly
/// once, here.
#[derive(Debug)]
pub struct CreatedApiKey {
    pub key: ApiKey,
    pub plain: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ApiKeyService {
    storage: Arc<PersistentStorage>,
    configs: Arc<ConfigStore>,
    keys: Arc<ApiKeyStore>,
    snapshotter: Arc<Snapshotter>,
}

impl ApiKeyService {
    pub fn new(
        storage: Arc<PersistentStorage>,
        configs: Arc<ConfigStore>,
        keys: Arc<ApiKeyStore>,
        snapshotter: Arc<Snapshotter>,
    ) -> Self {
        Self {
            storage,
            configs,
            keys,
            snapshotter,
        }
    }

    /// Resolve the owning API of a key route. Keys hang off REST APIs.
    fn owning_api(&self, api_handle: &str) -> Result<StoredConfig> {
        self.configs
            .get_by_handle(api_handle)
            .filter(|c| matches!(c.kind, ConfigKind::RestApi | ConfigKind::WebSubApi))
            .ok_or_else(|| Error::NotFound(format!("api {api_handle}")))
    }

    pub async fn create(
        &self,
        api_handle: &str,
        params: CreateApiKeyParams,
        correlation_id: &str,
    ) -> Result<CreatedApiKey> {
        let api = self.owning_api(api_handle)?;
        let source = params.source.unwrap_or(ApiKeySource::Local);

        let mut errors: Vec<FieldError> = Vec::new();
        if params.name.trim().is_empty() {
            errors.push(FieldError::new("name", "name must not be empty"));
        }
        if source == ApiKeySource::External
            && params.api_key.as_deref().map_or(true, str::is_empty)
        {
            errors.push(FieldError::new(
                "apiKey",
                "external keys must supply the plain key",
            ));
        }
        if let Some(expires_in) = &params.expires_in {
            if expires_in_duration(expires_in).is_none() {
                errors.push(FieldError::new(
                    "expiresIn",
                    "unit must be minutes/hours/days with a positive duration",
                ));
            }
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        // An existing (api, name) pair rotates for external keys and
        // conflicts for local ones; rotation removes the previous entry
        // (and its fingerprint index) before the new insert.
        if let Some(existing) = self.keys.find_by_name(&api.id, &params.name) {
            if source == ApiKeySource::External && existing.source == ApiKeySource::External {
                self.storage.delete_api_key(&existing.id)?;
                self.keys.remove(&api.id, &existing.id);
            } else {
                return Err(Error::Conflict(format!(
                    "api key {:?} already exists for {api_handle}",
                    params.name
                )));
            }
        }

        let plain = match source {
            ApiKeySource::Local => generate_api_key(),
            // Presence checked above.
            ApiKeySource::External => params.api_key.clone().unwrap_or_default(),
        };

        let now = Utc::now();
        let (expires_at, expires_in_unit, expires_in_duration_v) = match &params.expires_in {
            Some(e) => {
                let delta = expires_in_duration(e)
                    .ok_or_else(|| Error::validation("expiresIn", "invalid expiry"))?;
                (Some(now + delta), Some(e.unit.clone()), Some(e.duration))
            }
            None => (None, None, None),
        };

        let key = ApiKey {
            id: uuid::Uuid::new_v4().to_string(),
            name: params.name.clone(),
            api_key: hash_api_key(&plain),
            masked_api_key: mask_api_key(&plain),
            api_id: api.id.clone(),
            operations: params
                .operations
                .filter(|ops| !ops.is_empty())
                .unwrap_or_else(|| vec!["*".into()]),
            status: ApiKeyStatus::Active,
            created_at: now,
            created_by: params.created_by.unwrap_or_else(|| "system".into()),
            updated_at: now,
            expires_at,
            expires_in_unit,
            expires_in_duration: expires_in_duration_v,
            source,
            external_ref_id: params.external_ref_id,
            index_key: (source == ApiKeySource::External).then(|| sha256_hex(&plain)),
            display_name: params.display_name.unwrap_or_default(),
        };

        self.storage.insert_api_key(&key)?;
        self.keys.insert(key.clone());

        tracing::info!(
            api = %api_handle,
            key = %key.name,
            source = %key.source.as_str(),
            correlation_id,
            "api key created"
        );
        self.notify_data_plane(correlation_id);
        Ok(CreatedApiKey { key, plain })
    }

    pub async fn update(
        &self,
        api_handle: &str,
        name: &str,
        params: UpdateApiKeyParams,
        correlation_id: &str,
    ) -> Result<ApiKey> {
        let api = self.owning_api(api_handle)?;
        let mut key = self
            .keys
            .find_by_name(&api.id, name)
            .ok_or_else(|| Error::NotFound(format!("api key {name}")))?;

        if key.status != ApiKeyStatus::Active {
            return Err(Error::OperationNotAllowed(format!(
                "api key {name} is {}; only active keys can be updated",
                key.status
            )));
        }

        if let Some(display_name) = params.display_name {
            key.display_name = display_name;
        }
        if let Some(operations) = params.operations {
            if operations.is_empty() {
                return Err(Error::validation("operations", "must not be empty"));
            }
            key.operations = operations;
        }
        if let Some(expires_in) = params.expires_in {
            let delta = expires_in_duration(&expires_in)
                .ok_or_else(|| Error::validation("expiresIn", "invalid expiry"))?;
            key.expires_at = Some(Utc::now() + delta);
            key.expires_in_unit = Some(expires_in.unit);
            key.expires_in_duration = Some(expires_in.duration);
        }
        key.updated_at = Utc::now();

        self.storage.update_api_key(&key)?;
        self.keys.insert(key.clone());

        self.notify_data_plane(correlation_id);
        Ok(key)
    }

    /// Mint a new plain key for an existing local key, keeping its id and
    /// metadata. External keys rotate through create instead; their plain
    /// form is not ours to mint.
    pub async fn regenerate(
        &self,
        api_handle: &str,
        name: &str,
        correlation_id: &str,
    ) -> Result<CreatedApiKey> {
        let api = self.owning_api(api_handle)?;
        let mut key = self
            .keys
            .find_by_name(&api.id, name)
            .ok_or_else(|| Error::NotFound(format!("api key {name}")))?;

        if key.source == ApiKeySource::External {
            return Err(Error::OperationNotAllowed(
                "external keys are rotated by re-creating them with a new plain key".into(),
            ));
        }
        if key.status != ApiKeyStatus::Active {
            return Err(Error::OperationNotAllowed(format!(
                "api key {name} is {}; only active keys can be regenerated",
                key.status
            )));
        }

        let plain = generate_api_key();
        key.api_key = hash_api_key(&plain);
        key.masked_api_key = mask_api_key(&plain);
        key.updated_at = Utc::now();

        self.storage.update_api_key(&key)?;
        self.keys.insert(key.clone());

        tracing::info!(api = %api_handle, key = %name, correlation_id, "api key regenerated");
        self.notify_data_plane(correlation_id);
        Ok(CreatedApiKey { key, plain })
    }

    /// Revoke by name — the authoritative revocation path.
    pub async fn revoke(&self, api_handle: &str, name: &str, correlation_id: &str) -> Result<()> {
        let api = self.owning_api(api_handle)?;
        let key = self
            .keys
            .find_by_name(&api.id, name)
            .ok_or_else(|| Error::NotFound(format!("api key {name}")))?;
        self.revoke_key(&api.id, key, correlation_id)
    }

    /// Inline-validation helper: revoke whichever stored key the presented
    /// plain form verifies against. Returns false when nothing matches.
    /// Never used by the REST surface for revocation-by-name.
    pub fn revoke_by_plain(&self, api_id: &str, plain: &str, correlation_id: &str) -> bool {
        let candidate = self
            .keys
            .get_by_api(api_id)
            .into_iter()
            .find(|k| verify_api_key(&k.api_key, plain));
        match candidate {
            Some(key) => self.revoke_key(api_id, key, correlation_id).is_ok(),
            None => false,
        }
    }

    fn revoke_key(&self, api_id: &str, mut key: ApiKey, correlation_id: &str) -> Result<()> {
        key.status = ApiKeyStatus::Revoked;
        key.updated_at = Utc::now();
        self.storage.update_api_key(&key)?;
        // Revoked keys leave the in-memory indexes entirely; the row stays
        // for audit.
        self.keys.remove(api_id, &key.id);

        tracing::info!(api_id, key = %key.name, correlation_id, "api key revoked");
        self.notify_data_plane(correlation_id);
        Ok(())
    }

    pub fn list(&self, api_handle: &str) -> Result<Vec<ApiKey>> {
        let api = self.owning_api(api_handle)?;
        Ok(self.keys.get_by_api(&api.id))
    }

    /// Bump the key resource version and push a snapshot so the data plane
    /// sees the key change in this deployment cycle.
    fn notify_data_plane(&self, correlation_id: &str) {
        self.keys.bump_version();
        let snapshotter = Arc::clone(&self.snapshotter);
        let correlation_id = correlation_id.to_owned();
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            if let Err(e) = snapshotter.update_snapshot(&correlation_id, &cancel).await {
                tracing::warn!(correlation_id, error = %e, "key snapshot update failed");
            }
        });
    }
}

fn expires_in_duration(expires_in: &ExpiresIn) -> Option<Duration> {
    if expires_in.duration <= 0 {
        return None;
    }
    match expires_in.unit.as_str() {
        "minutes" => Some(Duration::minutes(expires_in.duration)),
        "hours" => Some(Duration::hours(expires_in.duration)),
        "days" => Some(Duration::days(expires_in.duration)),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
