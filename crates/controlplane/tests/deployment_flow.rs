//! End-to-end deployment flows: dual-write, snapshot status callback,
//! WebSub reconciliation failure semantics.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use gatehouse_controlplane::apikeys::ApiKeyService;
use gatehouse_controlplane::deploy::{DeployStatusCallback, DeploymentService, ListFilters};
use gatehouse_controlplane::policy::PolicyBuilder;
use gatehouse_controlplane::snapshot::{ConfigSnapshot, SnapshotSink, Snapshotter};
use gatehouse_controlplane::store::{
    ApiKeyStore, CertificateStore, ConfigStore, LazyResourceStore, PolicyStore,
};
use gatehouse_controlplane::websub::{HubClient, TopicReconciler};
use gatehouse_domain::config::{PolicyCatalogConfig, PolicyDefinitionConfig, RouterConfig};
use gatehouse_domain::model::{ConfigKind, DeploymentStatus};
use gatehouse_domain::{Error, Result};
use gatehouse_storage::PersistentStorage;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Doubles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct RecordingSink {
    pushed: Mutex<Vec<ConfigSnapshot>>,
    fail: AtomicBool,
}

#[async_trait::async_trait]
impl SnapshotSink for RecordingSink {
    async fn publish(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Http("push refused".into()));
        }
        self.pushed.lock().push(snapshot.clone());
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedHub {
    fail_topics: Mutex<HashSet<String>>,
    registered: Mutex<Vec<String>>,
    unregistered: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl HubClient for ScriptedHub {
    async fn register(&self, topic: &str) -> Result<()> {
        if self.fail_topics.lock().contains(topic) {
            return Err(Error::Http(format!("hub refused {topic}")));
        }
        self.registered.lock().push(topic.to_owned());
        Ok(())
    }

    async fn unregister(&self, topic: &str) -> Result<()> {
        if self.fail_topics.lock().contains(topic) {
            return Err(Error::Http(format!("hub refused {topic}")));
        }
        self.unregistered.lock().push(topic.to_owned());
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fixture
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Fixture {
    service: DeploymentService,
    key_service: ApiKeyService,
    storage: Arc<PersistentStorage>,
    configs: Arc<ConfigStore>,
    keys: Arc<ApiKeyStore>,
    policies: Arc<PolicyStore>,
    sink: Arc<RecordingSink>,
    hub: Arc<ScriptedHub>,
}

fn fixture() -> Fixture {
    let storage = Arc::new(PersistentStorage::open_in_memory().expect("open db"));
    let configs = Arc::new(ConfigStore::new());
    let keys = Arc::new(ApiKeyStore::new());
    let policies = Arc::new(PolicyStore::new());
    let certificates = Arc::new(CertificateStore::new());
    let lazy = Arc::new(LazyResourceStore::new());

    let sink = Arc::new(RecordingSink::default());
    let snapshotter = Arc::new(Snapshotter::new(
        configs.clone(),
        keys.clone(),
        policies.clone(),
        certificates.clone(),
        lazy.clone(),
        sink.clone(),
        Duration::from_secs(10),
    ));
    snapshotter.set_status_callback(Arc::new(DeployStatusCallback::new(
        configs.clone(),
        storage.clone(),
    )));

    let catalog = PolicyCatalogConfig {
        definitions: vec![
            PolicyDefinitionConfig {
                name: "auth".into(),
                version: "v1.0.0".into(),
            },
            PolicyDefinitionConfig {
                name: "rateLimit".into(),
                version: "v1.0.0".into(),
            },
        ],
    };
    let router = RouterConfig::default();
    let hub = Arc::new(ScriptedHub::default());

    let service = DeploymentService::new(
        storage.clone(),
        configs.clone(),
        keys.clone(),
        policies.clone(),
        certificates,
        lazy,
        PolicyBuilder::new(&catalog, router.clone()),
        router,
        TopicReconciler::new(hub.clone()),
        snapshotter.clone(),
        None,
    );
    let key_service = ApiKeyService::new(
        storage.clone(),
        configs.clone(),
        keys.clone(),
        snapshotter,
    );

    Fixture {
        service,
        key_service,
        storage,
        configs,
        keys,
        policies,
        sink,
        hub,
    }
}

fn rest_body(name: &str, version: &str, handle: &str) -> Vec<u8> {
    serde_json::json!({
        "kind": "RestApi",
        "name": name,
        "version": version,
        "handle": handle,
        "context": "/orders/{version}",
        "endpoint": {"url": "http://orders.svc:8080"},
        "policies": [{"name": "auth", "version": "v1"}],
        "operations": [{"method": "GET", "path": "/list"}],
    })
    .to_string()
    .into_bytes()
}

fn websub_body(handle: &str, channels: &[&str]) -> Vec<u8> {
    serde_json::json!({
        "kind": "WebSubApi",
        "name": "Events",
        "version": "1.0.0",
        "handle": handle,
        "context": "/events/{version}",
        "channels": channels.iter().map(|c| serde_json::json!({"name": c})).collect::<Vec<_>>(),
    })
    .to_string()
    .into_bytes()
}

/// Poll until the record reaches the wanted status or the deadline hits.
async fn wait_for_status(configs: &ConfigStore, id: &str, status: DeploymentStatus) {
    for _ in 0..200 {
        if configs.get(id).map(|c| c.status) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("record {id} never reached {status}");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn create_flows_through_snapshot_to_deployed() {
    let f = fixture();

    let cfg = f
        .service
        .create_api(&rest_body("Orders", "1.0.0", "orders-1"), None, "corr-1")
        .await
        .expect("create");
    assert_eq!(cfg.status, DeploymentStatus::Pending);
    assert_eq!(cfg.deployed_version, 0);

    // The background snapshot cycle pushes and the callback lands.
    wait_for_status(&f.configs, &cfg.id, DeploymentStatus::Deployed).await;
    let deployed = f.configs.get(&cfg.id).expect("record");
    assert!(deployed.deployed_version >= 1);
    assert!(deployed.deployed_at.is_some());

    // Durable row followed.
    let row = f
        .storage
        .get_deployment(&cfg.id)
        .expect("get")
        .expect("row");
    assert_eq!(row.status, DeploymentStatus::Deployed);

    // The pushed snapshot carried the record and its derived policy.
    let pushed = f.sink.pushed.lock();
    let last = pushed.last().expect("at least one push");
    assert!(last.apis.iter().any(|a| a.id == cfg.id));
    assert!(last.policies.iter().any(|p| p.id == format!("{}-policies", cfg.id)));
}

/// A (name, version) conflict injected in the in-memory
/// store rolls the database write back; the id ends up in neither store.
#[tokio::test]
async fn dual_write_conflict_rolls_back_database() {
    let f = fixture();

    // Seed the in-memory store only (not the database) with a colliding
    // (display_name, version) pair under a different handle.
    let decl: gatehouse_domain::model::ApiDeclaration =
        serde_json::from_slice(&rest_body("Orders", "1.0.0", "orders-other")).expect("decl");
    let now = chrono::Utc::now();
    f.configs
        .add(gatehouse_domain::model::StoredConfig {
            id: "seeded".into(),
            handle: "orders-other".into(),
            kind: ConfigKind::RestApi,
            display_name: "Orders".into(),
            version: "1.0.0".into(),
            context: Some("/orders".into()),
            configuration: serde_json::json!({}),
            source_configuration: decl,
            status: DeploymentStatus::Pending,
            created_at: now,
            updated_at: now,
            deployed_at: None,
            deployed_version: 0,
            labels: Default::default(),
        })
        .expect("seed");

    let err = f
        .service
        .create_api(&rest_body("Orders", "1.0.0", "orders-1"), None, "corr-1")
        .await
        .expect_err("conflict");
    assert!(matches!(err, Error::Conflict(_)));

    // Neither store kept the rejected record.
    assert!(f.configs.get_by_handle("orders-1").is_none());
    assert!(f.storage.load_deployments().expect("load").is_empty());
}

/// A WebSub update whose hub registration partially fails
/// reports Internal, leaves the written record Pending, restores the
/// topic bookkeeping, and pushes no snapshot for the mutation.
#[tokio::test]
async fn websub_update_hub_failure_keeps_record_pending() {
    let f = fixture();

    let cfg = f
        .service
        .create_api(&websub_body("events-1", &["created"]), None, "corr-1")
        .await
        .expect("create");
    wait_for_status(&f.configs, &cfg.id, DeploymentStatus::Deployed).await;
    let pushes_before = f.sink.pushed.lock().len();

    // The update adds `updated` (register, will fail at the hub) and
    // drops nothing.
    f.hub
        .fail_topics
        .lock()
        .insert("events_1.0.0_updated".into());
    let err = f
        .service
        .update_api(
            "events-1",
            &websub_body("events-1", &["created", "updated"]),
            None,
            "corr-2",
        )
        .await
        .expect_err("hub failure");
    assert!(matches!(err, Error::Internal(_)));

    // The record was written (intent persisted) and stays Pending.
    let record = f.configs.get(&cfg.id).expect("record");
    assert_eq!(record.status, DeploymentStatus::Pending);
    let row = f
        .storage
        .get_deployment(&cfg.id)
        .expect("get")
        .expect("row");
    assert_eq!(row.status, DeploymentStatus::Pending);

    // Topic bookkeeping rolled back to the pre-update set.
    let topics = f.configs.topics().get_all_by_config(&cfg.id);
    assert_eq!(topics, vec!["events_1.0.0_created".to_string()]);

    // No snapshot was pushed for the failed mutation.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(f.sink.pushed.lock().len(), pushes_before);
}

#[tokio::test]
async fn websub_delete_deregisters_before_dropping_state() {
    let f = fixture();

    let cfg = f
        .service
        .create_api(&websub_body("events-1", &["created", "updated"]), None, "c1")
        .await
        .expect("create");
    wait_for_status(&f.configs, &cfg.id, DeploymentStatus::Deployed).await;

    f.service.delete_api("events-1", "c2").await.expect("delete");

    let mut unregistered = f.hub.unregistered.lock().clone();
    unregistered.sort();
    assert_eq!(
        unregistered,
        vec![
            "events_1.0.0_created".to_string(),
            "events_1.0.0_updated".to_string()
        ]
    );
    assert!(f.configs.get(&cfg.id).is_none());
    assert!(f.storage.load_deployments().expect("load").is_empty());
    assert_eq!(f.configs.topics().count(), 0);
}

/// A failing deregistration aborts the delete: durable row and record of
/// intent survive for the retry.
#[tokio::test]
async fn websub_delete_hub_failure_preserves_record() {
    let f = fixture();

    let cfg = f
        .service
        .create_api(&websub_body("events-1", &["created"]), None, "c1")
        .await
        .expect("create");
    wait_for_status(&f.configs, &cfg.id, DeploymentStatus::Deployed).await;

    f.hub
        .fail_topics
        .lock()
        .insert("events_1.0.0_created".into());
    let err = f.service.delete_api("events-1", "c2").await.expect_err("hub down");
    assert!(matches!(err, Error::Internal(_)));

    assert!(f.configs.get(&cfg.id).is_some());
    assert_eq!(f.storage.load_deployments().expect("load").len(), 1);
}

#[tokio::test]
async fn list_filters_trigger_linear_search() {
    let f = fixture();
    f.service
        .create_api(&rest_body("Orders", "1.0.0", "orders-1"), None, "c1")
        .await
        .expect("create");
    f.service
        .create_api(&rest_body("Billing", "2.0.0", "billing-2"), None, "c2")
        .await
        .expect("create");

    let all = f.service.list_apis(&ListFilters::default());
    assert_eq!(all.len(), 2);

    let filtered = f.service.list_apis(&ListFilters {
        display_name: Some("Orders".into()),
        ..Default::default()
    });
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].handle, "orders-1");

    let none = f.service.list_apis(&ListFilters {
        version: Some("9.9.9".into()),
        ..Default::default()
    });
    assert!(none.is_empty());
}

/// Deleting an API drops its keys from the live index and the key rows
/// cascade away in the database.
#[tokio::test]
async fn delete_api_drops_keys() {
    let f = fixture();
    let cfg = f
        .service
        .create_api(&rest_body("Orders", "1.0.0", "orders-1"), None, "c1")
        .await
        .expect("create");

    f.key_service
        .create(
            "orders-1",
            gatehouse_controlplane::apikeys::CreateApiKeyParams {
                name: "ci".into(),
                ..Default::default()
            },
            "c2",
        )
        .await
        .expect("key");
    assert_eq!(f.keys.get_by_api(&cfg.id).len(), 1);

    f.service.delete_api("orders-1", "c3").await.expect("delete");
    assert!(f.keys.get_by_api(&cfg.id).is_empty());
    assert!(f.storage.load_api_keys().expect("load").is_empty());
    assert!(f.policies.get(&format!("{}-policies", cfg.id)).is_none());
}
