//! API-key routes under `/apis/:handle/api-keys`. The plain key appears in
//! exactly one response: the create/regenerate that minted it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use gatehouse_domain::model::ApiKey;

use crate::apikeys::{CreateApiKeyParams, UpdateApiKeyParams};
use crate::state::AppState;

use super::correlation::CorrelationId;
use super::response::{respond, success};

/// The client-facing view of a key: everything except the stored hash.
fn key_view(key: &ApiKey) -> serde_json::Value {
    serde_json::json!({
        "id": key.id,
        "name": key.name,
        "displayName": key.display_name,
        "maskedApiKey": key.masked_api_key,
        "operations": key.operations,
        "status": key.status,
        "source": key.source,
        "createdAt": key.created_at,
        "createdBy": key.created_by,
        "updatedAt": key.updated_at,
        "expiresAt": key.expires_at,
        "externalRefId": key.external_ref_id,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /apis/:handle/api-keys
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn create_api_key(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(handle): Path<String>,
    Json(params): Json<CreateApiKeyParams>,
) -> Response {
    let result = state
        .api_keys
        .create(&handle, params, correlation.as_str())
        .await;
    respond(result, |created| {
        let mut view = key_view(&created.key);
        view["apiKey"] = serde_json::json!(created.plain);
        (StatusCode::CREATED, success(serde_json::json!({ "apiKey": view }))).into_response()
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /apis/:handle/api-keys
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_api_keys(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Response {
    respond(state.api_keys.list(&handle), |keys| {
        let views: Vec<_> = keys.iter().map(key_view).collect();
        let count = views.len();
        success(serde_json::json!({ "apiKeys": views, "count": count })).into_response()
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /apis/:handle/api-keys/:name
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn update_api_key(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((handle, name)): Path<(String, String)>,
    Json(params): Json<UpdateApiKeyParams>,
) -> Response {
    let result = state
        .api_keys
        .update(&handle, &name, params, correlation.as_str())
        .await;
    respond(result, |key| {
        success(serde_json::json!({ "apiKey": key_view(&key) })).into_response()
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /apis/:handle/api-keys/:name — revoke by name (authoritative)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn revoke_api_key(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((handle, name)): Path<(String, String)>,
) -> Response {
    let result = state
        .api_keys
        .revoke(&handle, &name, correlation.as_str())
        .await;
    respond(result, |_| {
        success(serde_json::json!({ "revoked": true })).into_response()
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /apis/:handle/api-keys/:name/regenerate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn regenerate_api_key(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path((handle, name)): Path<(String, String)>,
) -> Response {
    let result = state
        .api_keys
        .regenerate(&handle, &name, correlation.as_str())
        .await;
    respond(result, |created| {
        let mut view = key_view(&created.key);
        view["apiKey"] = serde_json::json!(created.plain);
        success(serde_json::json!({ "apiKey": view })).into_response()
    })
}
