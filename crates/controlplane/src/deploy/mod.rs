//! End-to-end resource lifecycle: parse → validate → transform →
//! dual-write → snapshot, with WebSub reconciliation and post-deploy
//! notification hanging off the successful paths.
//!
//! The dual-write protocol writes the database first and the in-memory
//! store second, rolling the database back best-effort when the in-memory
//! insert loses a uniqueness race. Anything visible in memory is durable.

mod parse;
mod status;
mod transform;
mod validate;

pub use parse::parse_declaration;
pub use status::DeployStatusCallback;
pub use transform::normalize;
pub use validate::validate_declaration;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use gatehouse_domain::config::RouterConfig;
use gatehouse_domain::model::{
    ApiDeclaration, ConfigKind, DeploymentStatus, LazyResource, StoredCertificate, StoredConfig,
    StoredLlmProviderTemplate, StoredPolicyConfig,
};
use gatehouse_domain::{Error, FieldError, Result};
use gatehouse_storage::PersistentStorage;

use crate::notifier::DeploymentNotifier;
use crate::policy::PolicyBuilder;
use crate::snapshot::Snapshotter;
use crate::store::{ApiKeyStore, CertificateStore, ConfigStore, LazyResourceStore, PolicyStore};
use crate::websub::{derive_topics, TopicReconciler};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// List filters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilters {
    pub display_name: Option<String>,
    pub version: Option<String>,
    pub context: Option<String>,
    pub status: Option<String>,
}

impl ListFilters {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.version.is_none()
            && self.context.is_none()
            && self.status.is_none()
    }

    fn matches(&self, cfg: &StoredConfig) -> bool {
        if let Some(name) = &self.display_name {
            if &cfg.display_name != name {
                return false;
            }
        }
        if let Some(version) = &self.version {
            if &cfg.version != version {
                return false;
            }
        }
        if let Some(context) = &self.context {
            if cfg.context.as_deref() != Some(context.as_str()) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if cfg.status.as_str() != status {
                return false;
            }
        }
        true
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Deployment service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct DeploymentService {
    storage: Arc<PersistentStorage>,
    configs: Arc<ConfigStore>,
    keys: Arc<ApiKeyStore>,
    policies: Arc<PolicyStore>,
    certificates: Arc<CertificateStore>,
    lazy: Arc<LazyResourceStore>,
    builder: PolicyBuilder,
    router: RouterConfig,
    reconciler: TopicReconciler,
    snapshotter: Arc<Snapshotter>,
    notifier: Option<Arc<DeploymentNotifier>>,
}

/// Kinds served by the `/apis` surface; the other kinds have their own
/// id-addressed routes.
const API_KINDS: [ConfigKind; 2] = [ConfigKind::RestApi, ConfigKind::WebSubApi];

impl DeploymentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<PersistentStorage>,
        configs: Arc<ConfigStore>,
        keys: Arc<ApiKeyStore>,
        policies: Arc<PolicyStore>,
        certificates: Arc<CertificateStore>,
        lazy: Arc<LazyResourceStore>,
        builder: PolicyBuilder,
        router: RouterConfig,
        reconciler: TopicReconciler,
        snapshotter: Arc<Snapshotter>,
        notifier: Option<Arc<DeploymentNotifier>>,
    ) -> Self {
        Self {
            storage,
            configs,
            keys,
            policies,
            certificates,
            lazy,
            builder,
            router,
            reconciler,
            snapshotter,
            notifier,
        }
    }

    // ── Create ──────────────────────────────────────────────────────

    pub async fn create(
        &self,
        body: &[u8],
        content_type: Option<&str>,
        correlation_id: &str,
    ) -> Result<StoredConfig> {
        let decl = parse_declaration(body, content_type)?;
        self.create_declared(decl, correlation_id).await
    }

    pub async fn create_declared(
        &self,
        decl: ApiDeclaration,
        correlation_id: &str,
    ) -> Result<StoredConfig> {
        validate_declaration(&decl)?;

        let now = Utc::now();
        let cfg = StoredConfig {
            id: uuid::Uuid::new_v4().to_string(),
            handle: decl.effective_handle(),
            kind: decl.kind,
            display_name: decl.name.clone(),
            version: decl.version.clone(),
            context: decl.context.clone(),
            configuration: normalize(&decl, &self.router),
            labels: decl.labels.clone(),
            source_configuration: decl,
            status: DeploymentStatus::Pending,
            created_at: now,
            updated_at: now,
            deployed_at: None,
            deployed_version: 0,
        };

        // Dual-write: database first, then memory; roll the row back when
        // the in-memory insert loses the uniqueness race.
        self.storage.insert_deployment(&cfg)?;
        if let Err(e) = self.configs.add(cfg.clone()) {
            if let Err(rollback) = self.storage.delete_deployment(&cfg.id) {
                tracing::warn!(
                    id = %cfg.id,
                    correlation_id,
                    error = %rollback,
                    "dual-write rollback failed; row will re-import on restart"
                );
            }
            return Err(e);
        }

        // WebSub registration completes the commit; a hub failure leaves
        // the record written (Pending) and rolls back only the topic
        // bookkeeping so a retry re-registers everything.
        if cfg.kind == ConfigKind::WebSubApi {
            let mut to_register: Vec<String> = derive_topics(&cfg).into_iter().collect();
            to_register.sort();
            if let Err(e) = self.reconciler.execute(&to_register, &[]).await {
                self.configs.topics().set_for_config(&cfg.id, HashSet::new());
                return Err(e);
            }
        }

        tracing::info!(
            id = %cfg.id,
            handle = %cfg.handle,
            kind = %cfg.kind,
            correlation_id,
            "resource created"
        );
        self.finish_mutation(&cfg, correlation_id);
        Ok(cfg)
    }

    // ── Update ──────────────────────────────────────────────────────

    pub async fn update_by_handle(
        &self,
        kind: ConfigKind,
        handle: &str,
        body: &[u8],
        content_type: Option<&str>,
        correlation_id: &str,
    ) -> Result<StoredConfig> {
        let existing = self
            .configs
            .get_by_kind_and_handle(kind, handle)
            .ok_or_else(|| Error::NotFound(format!("{kind} {handle}")))?;
        let decl = parse_declaration(body, content_type)?;
        self.update_existing(existing, decl, correlation_id).await
    }

    pub async fn update_by_id(
        &self,
        kind: ConfigKind,
        id: &str,
        body: &[u8],
        content_type: Option<&str>,
        correlation_id: &str,
    ) -> Result<StoredConfig> {
        let existing = self
            .configs
            .get(id)
            .filter(|c| c.kind == kind)
            .ok_or_else(|| Error::NotFound(format!("{kind} {id}")))?;
        let decl = parse_declaration(body, content_type)?;
        self.update_existing(existing, decl, correlation_id).await
    }

    async fn update_existing(
        &self,
        existing: StoredConfig,
        decl: ApiDeclaration,
        correlation_id: &str,
    ) -> Result<StoredConfig> {
        validate_declaration(&decl)?;
        if decl.kind != existing.kind {
            return Err(Error::OperationNotAllowed(format!(
                "kind cannot change from {} to {}",
                existing.kind, decl.kind
            )));
        }

        let now = Utc::now();
        let cfg = StoredConfig {
            id: existing.id.clone(),
            handle: decl.effective_handle(),
            kind: decl.kind,
            display_name: decl.name.clone(),
            version: decl.version.clone(),
            context: decl.context.clone(),
            configuration: normalize(&decl, &self.router),
            labels: decl.labels.clone(),
            source_configuration: decl,
            status: DeploymentStatus::Pending,
            created_at: existing.created_at,
            updated_at: now,
            deployed_at: None,
            deployed_version: 0,
        };

        // The hub diff must be computed against the pre-update topic state.
        let websub_plan = if cfg.kind == ConfigKind::WebSubApi {
            let prev: HashSet<String> = self
                .configs
                .topics()
                .get_all_by_config(&cfg.id)
                .into_iter()
                .collect();
            let (to_register, to_unregister) =
                self.reconciler.topics_for_update(&cfg, self.configs.topics());
            Some((prev, to_register, to_unregister))
        } else {
            None
        };

        self.storage.update_deployment(&cfg)?;
        if let Err(e) = self.configs.update(cfg.clone()) {
            if let Err(rollback) = self.storage.update_deployment(&existing) {
                tracing::warn!(
                    id = %cfg.id,
                    correlation_id,
                    error = %rollback,
                    "dual-write rollback failed; row diverges until next write"
                );
            }
            return Err(e);
        }

        if let Some((prev, to_register, to_unregister)) = websub_plan {
            if let Err(e) = self.reconciler.execute(&to_register, &to_unregister).await {
                // Keep the written record (it reflects intent) but restore
                // the topic bookkeeping so a retried update re-diffs.
                self.configs.topics().set_for_config(&cfg.id, prev);
                return Err(e);
            }
        }

        tracing::info!(
            id = %cfg.id,
            handle = %cfg.handle,
            kind = %cfg.kind,
            correlation_id,
            "resource updated"
        );
        self.finish_mutation(&cfg, correlation_id);
        Ok(cfg)
    }

    // ── Delete ──────────────────────────────────────────────────────

    pub async fn delete_by_handle(
        &self,
        kind: ConfigKind,
        handle: &str,
        correlation_id: &str,
    ) -> Result<()> {
        let existing = self
            .configs
            .get_by_kind_and_handle(kind, handle)
            .ok_or_else(|| Error::NotFound(format!("{kind} {handle}")))?;
        self.delete_record(existing, correlation_id).await
    }

    pub async fn delete_by_id(
        &self,
        kind: ConfigKind,
        id: &str,
        correlation_id: &str,
    ) -> Result<()> {
        let existing = self
            .configs
            .get(id)
            .filter(|c| c.kind == kind)
            .ok_or_else(|| Error::NotFound(format!("{kind} {id}")))?;
        self.delete_record(existing, correlation_id).await
    }

    async fn delete_record(&self, existing: StoredConfig, correlation_id: &str) -> Result<()> {
        // Deregister before dropping durable state: a hub failure keeps the
        // record (and the operator's ability to retry) intact.
        if existing.kind == ConfigKind::WebSubApi {
            let topics = self
                .reconciler
                .topics_for_delete(&existing, self.configs.topics());
            self.reconciler.execute(&[], &topics).await?;
        }

        self.storage.delete_deployment(&existing.id)?;
        if self.configs.delete(&existing.id).is_err() {
            tracing::warn!(id = %existing.id, "record vanished from memory during delete");
        }
        let removed_keys = self.keys.remove_all_for_api(&existing.id);
        if !removed_keys.is_empty() {
            self.keys.bump_version();
        }
        self.policies.delete(&StoredPolicyConfig::id_for(&existing.id));

        tracing::info!(
            id = %existing.id,
            handle = %existing.handle,
            kind = %existing.kind,
            correlation_id,
            "resource deleted"
        );
        self.request_snapshot(correlation_id);
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn get_by_handle(&self, kind: ConfigKind, handle: &str) -> Result<StoredConfig> {
        self.configs
            .get_by_kind_and_handle(kind, handle)
            .ok_or_else(|| Error::NotFound(format!("{kind} {handle}")))
    }

    pub fn get_by_id(&self, kind: ConfigKind, id: &str) -> Result<StoredConfig> {
        self.configs
            .get(id)
            .filter(|c| c.kind == kind)
            .ok_or_else(|| Error::NotFound(format!("{kind} {id}")))
    }

    pub fn get_by_name_version(
        &self,
        kind: ConfigKind,
        display_name: &str,
        version: &str,
    ) -> Result<StoredConfig> {
        self.configs
            .get_by_kind_name_and_version(kind, display_name, version)
            .ok_or_else(|| Error::NotFound(format!("{kind} {display_name}/{version}")))
    }

    /// List a kind; any present filter switches to a linear scan.
    pub fn list(&self, kind: ConfigKind, filters: &ListFilters) -> Vec<StoredConfig> {
        let all = self.configs.get_all_by_kind(kind);
        if filters.is_empty() {
            return all;
        }
        all.into_iter().filter(|c| filters.matches(c)).collect()
    }

    /// Re-derive the policy record for a stored config (startup re-import
    /// path; mutations go through `finish_mutation`).
    pub fn rebuild_policies(&self, cfg: &StoredConfig) -> Option<StoredPolicyConfig> {
        self.builder.build(cfg)
    }

    // ── Shared tail of every successful mutation ────────────────────

    fn finish_mutation(&self, cfg: &StoredConfig, correlation_id: &str) {
        match self.builder.build(cfg) {
            Some(derived) => self.policies.upsert(derived),
            None => {
                self.policies.delete(&StoredPolicyConfig::id_for(&cfg.id));
            }
        }
        self.request_snapshot(correlation_id);
        if let Some(notifier) = &self.notifier {
            notifier.spawn_watch(cfg.id.clone(), correlation_id.to_owned());
        }
    }

    /// Ask for a new snapshot in the background. The push deadline inside
    /// the snapshotter bounds the work; the token is never cancelled here.
    pub fn request_snapshot(&self, correlation_id: &str) {
        let snapshotter = Arc::clone(&self.snapshotter);
        let correlation_id = correlation_id.to_owned();
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            if let Err(e) = snapshotter.update_snapshot(&correlation_id, &cancel).await {
                tracing::warn!(correlation_id, error = %e, "background snapshot update failed");
            }
        });
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The /apis surface (REST + WebSub kinds by handle)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl DeploymentService {
    pub async fn create_api(
        &self,
        body: &[u8],
        content_type: Option<&str>,
        correlation_id: &str,
    ) -> Result<StoredConfig> {
        let decl = parse_declaration(body, content_type)?;
        if !API_KINDS.contains(&decl.kind) {
            return Err(Error::validation(
                "kind",
                format!("{} is not deployable via /apis", decl.kind),
            ));
        }
        self.create_declared(decl, correlation_id).await
    }

    /// Create for an id-addressed kind route; the declaration must carry
    /// the route's kind.
    pub async fn create_kind(
        &self,
        expected: ConfigKind,
        body: &[u8],
        content_type: Option<&str>,
        correlation_id: &str,
    ) -> Result<StoredConfig> {
        let decl = parse_declaration(body, content_type)?;
        if decl.kind != expected {
            return Err(Error::validation(
                "kind",
                format!("expected {expected}, got {}", decl.kind),
            ));
        }
        self.create_declared(decl, correlation_id).await
    }

    pub fn get_api(&self, handle: &str) -> Result<StoredConfig> {
        self.configs
            .get_by_handle(handle)
            .filter(|c| API_KINDS.contains(&c.kind))
            .ok_or_else(|| Error::NotFound(format!("api {handle}")))
    }

    pub fn get_api_by_name_version(&self, display_name: &str, version: &str) -> Result<StoredConfig> {
        self.configs
            .get_by_name_version(display_name, version)
            .filter(|c| API_KINDS.contains(&c.kind))
            .ok_or_else(|| Error::NotFound(format!("api {display_name}/{version}")))
    }

    pub fn list_apis(&self, filters: &ListFilters) -> Vec<StoredConfig> {
        let mut out = Vec::new();
        for kind in API_KINDS {
            out.extend(self.list(kind, filters));
        }
        out.sort_by(|a, b| a.handle.cmp(&b.handle));
        out
    }

    pub async fn update_api(
        &self,
        handle: &str,
        body: &[u8],
        content_type: Option<&str>,
        correlation_id: &str,
    ) -> Result<StoredConfig> {
        let existing = self.get_api(handle)?;
        let decl = parse_declaration(body, content_type)?;
        self.update_existing(existing, decl, correlation_id).await
    }

    pub async fn delete_api(&self, handle: &str, correlation_id: &str) -> Result<()> {
        let existing = self.get_api(handle)?;
        self.delete_record(existing, correlation_id).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider templates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Declarative form of a provider template.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDeclaration {
    pub handle: String,
    pub configuration: serde_json::Value,
}

/// Templates travel to the data plane as lazy resources on the secondary
/// channel under this type tag.
pub const TEMPLATE_RESOURCE_TYPE: &str = "llm-provider-template";

impl DeploymentService {
    pub async fn create_template(
        &self,
        body: &[u8],
        content_type: Option<&str>,
        correlation_id: &str,
    ) -> Result<StoredLlmProviderTemplate> {
        let decl: TemplateDeclaration = parse::parse_body(body, content_type)?;
        if decl.handle.trim().is_empty() {
            return Err(Error::validation("handle", "handle must not be empty"));
        }

        let now = Utc::now();
        let template = StoredLlmProviderTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            handle: decl.handle,
            configuration: decl.configuration,
            created_at: now,
            updated_at: now,
        };

        self.storage.insert_template(&template)?;
        if let Err(e) = self.configs.add_template(template.clone()) {
            if let Err(rollback) = self.storage.delete_template(&template.id) {
                tracing::warn!(id = %template.id, error = %rollback, "template rollback failed");
            }
            return Err(e);
        }

        self.lazy.upsert(template_lazy_resource(&template));
        self.request_snapshot(correlation_id);
        Ok(template)
    }

    pub async fn update_template(
        &self,
        id: &str,
        body: &[u8],
        content_type: Option<&str>,
        correlation_id: &str,
    ) -> Result<StoredLlmProviderTemplate> {
        let existing = self
            .configs
            .get_template(id)
            .ok_or_else(|| Error::NotFound(format!("template {id}")))?;
        let decl: TemplateDeclaration = parse::parse_body(body, content_type)?;

        let template = StoredLlmProviderTemplate {
            id: existing.id.clone(),
            handle: decl.handle,
            configuration: decl.configuration,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };

        self.storage.update_template(&template)?;
        if let Err(e) = self.configs.update_template(template.clone()) {
            if let Err(rollback) = self.storage.update_template(&existing) {
                tracing::warn!(id = %template.id, error = %rollback, "template rollback failed");
            }
            return Err(e);
        }

        self.lazy.upsert(template_lazy_resource(&template));
        self.request_snapshot(correlation_id);
        Ok(template)
    }

    pub async fn delete_template(&self, id: &str, correlation_id: &str) -> Result<()> {
        // Referenced templates must outlive their referents.
        let referents: Vec<String> = self
            .configs
            .get_template(id)
            .map(|tpl| {
                self.configs
                    .all()
                    .into_iter()
                    .filter(|c| {
                        c.source_configuration.provider_template.as_deref() == Some(&tpl.handle)
                    })
                    .map(|c| c.handle)
                    .collect()
            })
            .unwrap_or_default();
        if !referents.is_empty() {
            return Err(Error::Conflict(format!(
                "template is referenced by {}",
                referents.join(", ")
            )));
        }

        self.storage.delete_template(id)?;
        let _ = self.configs.delete_template(id);
        self.lazy.remove(TEMPLATE_RESOURCE_TYPE, id);
        self.request_snapshot(correlation_id);
        Ok(())
    }

    pub fn get_template(
        &self,
        id: &str,
    ) -> Result<StoredLlmProviderTemplate> {
        self.configs
            .get_template(id)
            .ok_or_else(|| Error::NotFound(format!("template {id}")))
    }

    pub fn list_templates(&self) -> Vec<StoredLlmProviderTemplate> {
        self.configs.list_templates()
    }
}

/// The lazy-resource projection of a template, shared with the startup
/// re-import.
pub fn template_lazy_resource(
    template: &StoredLlmProviderTemplate,
) -> LazyResource {
    let mut data = serde_json::Map::new();
    data.insert("handle".into(), serde_json::Value::String(template.handle.clone()));
    data.insert("configuration".into(), template.configuration.clone());
    LazyResource {
        resource_type: TEMPLATE_RESOURCE_TYPE.into(),
        id: template.id.clone(),
        data,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Certificates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Declarative certificate upload. X.509 metadata is supplied by the
/// caller; the control plane does not parse PEM.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDeclaration {
    pub name: String,
    pub certificate: String,
    pub subject: String,
    pub issuer: String,
    pub not_before: chrono::DateTime<Utc>,
    pub not_after: chrono::DateTime<Utc>,
    #[serde(default = "default_cert_count")]
    pub cert_count: i64,
}

fn default_cert_count() -> i64 {
    1
}

impl DeploymentService {
    pub async fn create_certificate(
        &self,
        body: &[u8],
        content_type: Option<&str>,
        correlation_id: &str,
    ) -> Result<StoredCertificate> {
        let decl: CertificateDeclaration = parse::parse_body(body, content_type)?;
        let mut errors = Vec::new();
        if decl.name.trim().is_empty() {
            errors.push(FieldError::new("name", "name must not be empty"));
        }
        if !decl.certificate.contains("BEGIN CERTIFICATE") {
            errors.push(FieldError::new(
                "certificate",
                "body must be a PEM certificate bundle",
            ));
        }
        if decl.not_after <= decl.not_before {
            errors.push(FieldError::new(
                "notAfter",
                "notAfter must be later than notBefore",
            ));
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let now = Utc::now();
        let cert = StoredCertificate {
            id: uuid::Uuid::new_v4().to_string(),
            name: decl.name,
            certificate: decl.certificate.into_bytes(),
            subject: decl.subject,
            issuer: decl.issuer,
            not_before: decl.not_before,
            not_after: decl.not_after,
            cert_count: decl.cert_count,
            created_at: now,
            updated_at: now,
        };

        self.storage.insert_certificate(&cert)?;
        if let Err(e) = self.certificates.add(cert.clone()) {
            if let Err(rollback) = self.storage.delete_certificate(&cert.id) {
                tracing::warn!(id = %cert.id, error = %rollback, "certificate rollback failed");
            }
            return Err(e);
        }

        self.request_snapshot(correlation_id);
        Ok(cert)
    }

    pub async fn delete_certificate(&self, id: &str, correlation_id: &str) -> Result<()> {
        self.storage.delete_certificate(id)?;
        let _ = self.certificates.delete(id);
        self.request_snapshot(correlation_id);
        Ok(())
    }

    pub fn get_certificate(&self, id: &str) -> Result<StoredCertificate> {
        self.certificates
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("certificate {id}")))
    }

    pub fn list_certificates(&self) -> Vec<StoredCertificate> {
        self.certificates.list()
    }
}
