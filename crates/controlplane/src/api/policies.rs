//! Derived-policy read surface.

use axum::extract::State;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

use super::response::success;

/// GET /policies — every derived policy configuration, sorted by
/// `(name, version)`.
pub async fn list_policies(State(state): State<AppState>) -> Response {
    let policies = state.policies.list();
    let count = policies.len();
    success(serde_json::json!({ "policies": policies, "count": count })).into_response()
}
