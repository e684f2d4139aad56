//! API resource CRUD (`/apis`): REST and WebSub kinds, addressed by
//! handle. Bodies are JSON or YAML by `Content-Type`.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;

use crate::deploy::ListFilters;
use crate::state::AppState;

use super::correlation::CorrelationId;
use super::response::{respond, success};

pub(super) fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /apis
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn create_api(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = state
        .deployments
        .create_api(&body, content_type(&headers), correlation.as_str())
        .await;
    respond(result, |cfg| {
        (
            StatusCode::CREATED,
            success(serde_json::json!({
                "id": cfg.id,
                "handle": cfg.handle,
                "createdAt": cfg.created_at,
            })),
        )
            .into_response()
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /apis
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_apis(
    State(state): State<AppState>,
    Query(filters): Query<ListFilters>,
) -> Response {
    let apis = state.deployments.list_apis(&filters);
    let count = apis.len();
    success(serde_json::json!({ "apis": apis, "count": count })).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /apis/:handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_api(State(state): State<AppState>, Path(handle): Path<String>) -> Response {
    respond(state.deployments.get_api(&handle), |cfg| {
        success(serde_json::json!({ "api": cfg })).into_response()
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /apis/:name/:version
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_api_by_name_version(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
) -> Response {
    respond(
        state.deployments.get_api_by_name_version(&name, &version),
        |cfg| success(serde_json::json!({ "api": cfg })).into_response(),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /apis/:handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn update_api(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(handle): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = state
        .deployments
        .update_api(&handle, &body, content_type(&headers), correlation.as_str())
        .await;
    respond(result, |cfg| {
        success(serde_json::json!({
            "id": cfg.id,
            "handle": cfg.handle,
            "updatedAt": cfg.updated_at,
        }))
        .into_response()
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /apis/:handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn delete_api(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(handle): Path<String>,
) -> Response {
    let result = state
        .deployments
        .delete_api(&handle, correlation.as_str())
        .await;
    respond(result, |_| {
        success(serde_json::json!({ "deleted": true })).into_response()
    })
}
