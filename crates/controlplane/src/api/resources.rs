//! Id-addressed CRUD for the MCP-proxy, LLM-provider and LLM-proxy kinds.
//! All three share one handler set parameterized by kind; the routes pin
//! the kind.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;

use gatehouse_domain::model::ConfigKind;

use crate::deploy::ListFilters;
use crate::state::AppState;

use super::apis::content_type;
use super::correlation::CorrelationId;
use super::response::{respond, success};

async fn create_kind(
    state: AppState,
    kind: ConfigKind,
    correlation: CorrelationId,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = state
        .deployments
        .create_kind(kind, &body, content_type(&headers), correlation.as_str())
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

fn list_kind(state: &AppState, kind: ConfigKind, filters: &ListFilters) -> Response {
    let resources = state.deployments.list(kind, filters);
    let count = resources.len();
    success(serde_json::json!({ "resources": resources, "count": count })).into_response()
}

fn get_kind(state: &AppState, kind: ConfigKind, id: &str) -> Response {
    respond(state.deployments.get_by_id(kind, id), |cfg| {
        success(serde_json::json!({ "resource": cfg })).into_response()
    })
}

async fn update_kind(
    state: AppState,
    kind: ConfigKind,
    id: &str,
    correlation: CorrelationId,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = state
        .deployments
        .update_by_id(kind, id, &body, content_type(&headers), correlation.as_str())
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

async fn delete_kind(
    state: AppState,
    kind: ConfigKind,
    id: &str,
    correlation: CorrelationId,
) -> Response {
    let result = state
        .deployments
        .delete_by_id(kind, id, correlation.as_str())
        .await;
    respond(result, |_| {
        success(serde_json::json!({ "deleted": true })).into_response()
    })
}

macro_rules! kind_routes {
    ($module:ident, $kind:expr) => {
        pub mod $module {
            use super::*;

            pub async fn create(
                State(state): State<AppState>,
                Extension(correlation): Extension<CorrelationId>,
                headers: HeaderMap,
                body: Bytes,
            ) -> Response {
                create_kind(state, $kind, correlation, headers, body).await
            }

            pub async fn list(
                State(state): State<AppState>,
                Query(filters): Query<ListFilters>,
            ) -> Response {
                list_kind(&state, $kind, &filters)
            }

            pub async fn get(
                State(state): State<AppState>,
                Path(id): Path<String>,
            ) -> Response {
                get_kind(&state, $kind, &id)
            }

            pub async fn update(
                State(state): State<AppState>,
                Extension(correlation): Extension<CorrelationId>,
                Path(id): Path<String>,
                headers: HeaderMap,
                body: Bytes,
            ) -> Response {
                update_kind(state, $kind, &id, correlation, headers, body).await
            }

            pub async fn delete(
                State(state): State<AppState>,
                Extension(correlation): Extension<CorrelationId>,
                Path(id): Path<String>,
            ) -> Response {
                delete_kind(state, $kind, &id, correlation).await
            }
        }
    };
}

kind_routes!(mcp_proxies, ConfigKind::Mcp);
kind_routes!(llm_providers, ConfigKind::LlmProvider);
kind_routes!(llm_proxies, ConfigKind::LlmProxy);
