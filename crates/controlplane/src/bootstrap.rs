//! AppState construction and background-task spawning extracted from
//! `main.rs`. CLI commands share this so they can boot the full runtime
//! without an HTTP listener.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use gatehouse_domain::config::{Config, ConfigSeverity};
use gatehouse_domain::model::{ApiKeyStatus, DeploymentStatus};
use gatehouse_storage::PersistentStorage;

use crate::apikeys::ApiKeyService;
use crate::deploy::{template_lazy_resource, DeployStatusCallback, DeploymentService};
use crate::notifier::{DeploymentNotifier, HttpControlPlaneClient};
use crate::policy::PolicyBuilder;
use crate::snapshot::{Snapshotter, XdsPublisher};
use crate::state::AppState;
use crate::store::{ApiKeyStore, CertificateStore, ConfigStore, LazyResourceStore, PolicyStore};
use crate::websub::{HttpHubClient, TopicReconciler};

/// Validate config, initialize every subsystem, re-import the durable
/// state and return a fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Durable storage ──────────────────────────────────────────────
    let storage =
        Arc::new(PersistentStorage::open(&config.database).context("opening database")?);

    // ── In-memory stores ─────────────────────────────────────────────
    let configs = Arc::new(ConfigStore::new());
    let keys = Arc::new(ApiKeyStore::new());
    let policies = Arc::new(PolicyStore::new());
    let certificates = Arc::new(CertificateStore::new());
    let lazy = Arc::new(LazyResourceStore::new());

    // ── Snapshot plumbing ────────────────────────────────────────────
    let publisher = Arc::new(XdsPublisher::new());
    let snapshotter = Arc::new(Snapshotter::new(
        configs.clone(),
        keys.clone(),
        policies.clone(),
        certificates.clone(),
        lazy.clone(),
        publisher.clone(),
        Duration::from_secs(config.snapshot.effective_push_timeout_secs()),
    ));
    snapshotter.set_status_callback(Arc::new(DeployStatusCallback::new(
        configs.clone(),
        storage.clone(),
    )));

    // ── WebSub reconciler ────────────────────────────────────────────
    let reconciler = TopicReconciler::new(Arc::new(HttpHubClient::new(&config.event_gateway)));
    tracing::info!(
        hub = %config.event_gateway.hub_url,
        timeout_secs = config.event_gateway.timeout_seconds,
        "websub reconciler ready"
    );

    // ── Upstream notifier ────────────────────────────────────────────
    let notifier = config.notifier.base_url.as_ref().map(|url| {
        tracing::info!(upstream = %url, "deployment notifier enabled");
        Arc::new(DeploymentNotifier::new(
            Arc::new(HttpControlPlaneClient::new(url.clone())),
            configs.clone(),
            &config.notifier,
        ))
    });

    // ── Policy builder ───────────────────────────────────────────────
    let builder = PolicyBuilder::new(&config.policies, config.router.clone());
    tracing::info!(
        definitions = config.policies.definitions.len(),
        system_policies = config.router.system_policies.len(),
        "policy builder ready"
    );

    // ── Services ─────────────────────────────────────────────────────
    let deployments = Arc::new(DeploymentService::new(
        storage.clone(),
        configs.clone(),
        keys.clone(),
        policies.clone(),
        certificates.clone(),
        lazy.clone(),
        builder,
        config.router.clone(),
        reconciler,
        snapshotter.clone(),
        notifier,
    ));
    let api_keys = Arc::new(ApiKeyService::new(
        storage.clone(),
        configs.clone(),
        keys.clone(),
        snapshotter.clone(),
    ));

    // ── Re-import durable state ──────────────────────────────────────
    reimport(&storage, &configs, &keys, &policies, &certificates, &lazy, &deployments)
        .context("re-importing durable state")?;

    // ── API token (read once, hash for constant-time comparison) ─────
    let api_token_hash = {
        let env_var = &config.server.api_token_env;
        match std::env::var(env_var) {
            Ok(token) if !token.is_empty() => {
                tracing::info!(env_var = %env_var, "API bearer-token auth enabled");
                Some(Sha256::digest(token.as_bytes()).to_vec())
            }
            _ => {
                tracing::warn!(
                    env_var = %env_var,
                    "API bearer-token auth DISABLED — set {env_var} to enable"
                );
                None
            }
        }
    };

    Ok(AppState {
        config,
        started_at: Utc::now(),
        storage,
        configs,
        keys,
        policies,
        certificates,
        lazy,
        deployments,
        api_keys,
        snapshotter,
        publisher,
        api_token_hash,
    })
}

/// Load every durable record into the in-memory stores. Deployments come
/// back as `pending` so the first snapshot re-drives the data plane.
#[allow(clippy::too_many_arguments)]
fn reimport(
    storage: &PersistentStorage,
    configs: &ConfigStore,
    keys: &ApiKeyStore,
    policies: &PolicyStore,
    certificates: &CertificateStore,
    lazy: &LazyResourceStore,
    deployments: &DeploymentService,
) -> anyhow::Result<()> {
    let mut imported = 0usize;
    for mut cfg in storage.load_deployments()? {
        cfg.status = DeploymentStatus::Pending;
        cfg.deployed_at = None;
        cfg.deployed_version = 0;
        // Labels live only in the declarative document.
        cfg.labels = cfg.source_configuration.labels.clone();
        let id = cfg.id.clone();
        if let Err(e) = configs.add(cfg.clone()) {
            tracing::error!(id = %id, error = %e, "skipping conflicting durable record");
            continue;
        }
        if let Some(derived) = deployments.rebuild_policies(&cfg) {
            policies.upsert(derived);
        }
        imported += 1;
    }

    let mut key_count = 0usize;
    for key in storage.load_api_keys()? {
        // Revoked and expired keys stay out of the live index.
        if key.status == ApiKeyStatus::Active {
            keys.insert(key);
            key_count += 1;
        }
    }

    let mut template_count = 0usize;
    for template in storage.load_templates()? {
        if let Err(e) = configs.add_template(template.clone()) {
            tracing::error!(id = %template.id, error = %e, "skipping conflicting template");
            continue;
        }
        lazy.upsert(template_lazy_resource(&template));
        template_count += 1;
    }

    let mut cert_count = 0usize;
    for cert in storage.load_certificates()? {
        if let Err(e) = certificates.add(cert) {
            tracing::error!(error = %e, "skipping conflicting certificate");
            continue;
        }
        cert_count += 1;
    }

    tracing::info!(
        deployments = imported,
        api_keys = key_count,
        templates = template_count,
        certificates = cert_count,
        "durable state re-imported"
    );
    Ok(())
}

/// Publish the startup snapshot in the background.
///
/// Call this **after** [`build_app_state`] when running the server; CLI
/// one-shot commands skip it.
pub fn spawn_background_tasks(state: &AppState) {
    let snapshotter = state.snapshotter.clone();
    tokio::spawn(async move {
        let cancel = CancellationToken::new();
        match snapshotter.update_snapshot("startup", &cancel).await {
            Ok(version) => tracing::info!(version, "startup snapshot published"),
            Err(e) => tracing::warn!(error = %e, "startup snapshot failed; retried on next mutation"),
        }
    });
}
