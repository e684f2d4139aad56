use std::sync::Arc;

use chrono::{DateTime, Utc};

use gatehouse_domain::config::Config;
use gatehouse_storage::PersistentStorage;

use crate::apikeys::ApiKeyService;
use crate::deploy::DeploymentService;
use crate::snapshot::{Snapshotter, XdsPublisher};
use crate::store::{ApiKeyStore, CertificateStore, ConfigStore, LazyResourceStore, PolicyStore};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Config & storage** — immutable config, the durable store
/// - **In-memory stores** — the authoritative indexes
/// - **Services** — deployment and API-key orchestration
/// - **Snapshot plumbing** — snapshotter and the xDS fan-out
/// - **Security** — startup-computed token digest
#[derive(Clone)]
pub struct AppState {
    // ── Config & storage ──────────────────────────────────────────────
    pub config: Arc<Config>,
    pub started_at: DateTime<Utc>,
    pub storage: Arc<PersistentStorage>,

    // ── In-memory stores ──────────────────────────────────────────────
    pub configs: Arc<ConfigStore>,
    pub keys: Arc<ApiKeyStore>,
    pub policies: Arc<PolicyStore>,
    pub certificates: Arc<CertificateStore>,
    pub lazy: Arc<LazyResourceStore>,

    // ── Services ──────────────────────────────────────────────────────
    pub deployments: Arc<DeploymentService>,
    pub api_keys: Arc<ApiKeyService>,

    // ── Snapshot plumbing ─────────────────────────────────────────────
    pub snapshotter: Arc<Snapshotter>,
    /// The in-process snapshot fan-out xDS adapters subscribe to.
    pub publisher: Arc<XdsPublisher>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
