//! Health probe and the full configuration dump.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;

use gatehouse_domain::model::ConfigKind;

use crate::state::AppState;

use super::response::success;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /health
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn health(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "snapshotVersion": state.snapshotter.current_version(),
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /config_dump
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn config_dump(State(state): State<AppState>) -> Response {
    let apis = state.configs.all();

    let mut by_kind: HashMap<&str, usize> = HashMap::new();
    let mut by_status: HashMap<&str, usize> = HashMap::new();
    for cfg in &apis {
        *by_kind.entry(cfg.kind.as_str()).or_default() += 1;
        *by_status.entry(cfg.status.as_str()).or_default() += 1;
    }
    // Every kind appears, even at zero; dashboards rely on stable keys.
    for kind in [
        ConfigKind::RestApi,
        ConfigKind::WebSubApi,
        ConfigKind::Mcp,
        ConfigKind::LlmProvider,
        ConfigKind::LlmProxy,
    ] {
        by_kind.entry(kind.as_str()).or_default();
    }

    let statistics = serde_json::json!({
        "total": apis.len(),
        "byKind": by_kind,
        "byStatus": by_status,
        "apiKeys": state.keys.len(),
        "apiKeyResourceVersion": state.keys.resource_version(),
        "policies": state.policies.len(),
        "certificates": state.deployments.list_certificates().len(),
        "templates": state.deployments.list_templates().len(),
        "topics": state.configs.topics().count(),
        "snapshotVersion": state.snapshotter.current_version(),
        "uptimeSeconds": (Utc::now() - state.started_at).num_seconds(),
    });

    (
        StatusCode::OK,
        success(serde_json::json!({
            "apis": apis,
            "policies": state.policies.list(),
            "certificates": state.deployments.list_certificates(),
            "statistics": statistics,
            "timestamp": Utc::now(),
        })),
    )
        .into_response()
}
