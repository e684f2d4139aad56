//! Certificate management (`/certificates`): PEM bundles plus caller-
//! supplied metadata, carried to the data plane in every snapshot.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;

use gatehouse_domain::model::StoredCertificate;

use crate::state::AppState;

use super::apis::content_type;
use super::correlation::CorrelationId;
use super::response::{respond, success};

/// View without the PEM body; `GET /certificates/:id` returns it in full.
fn cert_summary(cert: &StoredCertificate) -> serde_json::Value {
    serde_json::json!({
        "id": cert.id,
        "name": cert.name,
        "subject": cert.subject,
        "issuer": cert.issuer,
        "notBefore": cert.not_before,
        "notAfter": cert.not_after,
        "certCount": cert.cert_count,
        "createdAt": cert.created_at,
    })
}

pub async fn create_certificate(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = state
        .deployments
        .create_certificate(&body, content_type(&headers), correlation.as_str())
        .await;
    respond(result, |cert| {
        (
            StatusCode::CREATED,
            success(serde_json::json!({ "certificate": cert_summary(&cert) })),
        )
            .into_response()
    })
}

pub async fn list_certificates(State(state): State<AppState>) -> Response {
    let certs = state.deployments.list_certificates();
    let views: Vec<_> = certs.iter().map(cert_summary).collect();
    let count = views.len();
    success(serde_json::json!({ "certificates": views, "count": count })).into_response()
}

pub async fn get_certificate(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    respond(state.deployments.get_certificate(&id), |cert| {
        success(serde_json::json!({ "certificate": cert })).into_response()
    })
}

pub async fn delete_certificate(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let result = state
        .deployments
        .delete_certificate(&id, correlation.as_str())
        .await;
    respond(result, |_| {
        success(serde_json::json!({ "deleted": true })).into_response()
    })
}
