//! LLM provider template CRUD (`/llm-provider-templates`).

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;

use crate::state::AppState;

use super::apis::content_type;
use super::correlation::CorrelationId;
use super::response::{respond, success};

pub async fn create_template(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = state
        .deployments
        .create_template(&body, content_type(&headers), correlation.as_str())
        .await;
    respond(result, |tpl| {
        (
            StatusCode::CREATED,
            success(serde_json::json!({
                "id": tpl.id,
                "handle": tpl.handle,
                "createdAt": tpl.created_at,
            })),
        )
            .into_response()
    })
}

pub async fn list_templates(State(state): State<AppState>) -> Response {
    let templates = state.deployments.list_templates();
    let count = templates.len();
    success(serde_json::json!({ "templates": templates, "count": count })).into_response()
}

pub async fn get_template(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    respond(state.deployments.get_template(&id), |tpl| {
        success(serde_json::json!({ "template": tpl })).into_response()
    })
}

pub async fn update_template(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = state
        .deployments
        .update_template(&id, &body, content_type(&headers), correlation.as_str())
        .await;
    respond(result, |tpl| {
        success(serde_json::json!({
            "id": tpl.id,
            "handle": tpl.handle,
            "updatedAt": tpl.updated_at,
        }))
        .into_response()
    })
}

pub async fn delete_template(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .deployments
        .delete_template(&id, correlation.as_str())
        .await;
    respond(result, |_| {
        success(serde_json::json!({ "deleted": true })).into_response()
    })
}
