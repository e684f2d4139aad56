//! Response envelope and error → HTTP status mapping.
//!
//! Every body carries `status: "success" | "error"`; error bodies add an
//! optional `message` and, for validation failures, `errors: [{field,
//! message}]`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use gatehouse_domain::Error;

/// A success body: `{"status": "success", ...fields}`.
pub fn success(mut body: serde_json::Value) -> Json<serde_json::Value> {
    if let Some(map) = body.as_object_mut() {
        map.insert("status".into(), serde_json::json!("success"));
    }
    Json(body)
}

/// Map a domain error onto its HTTP status and structured body.
pub fn api_error(err: &Error) -> Response {
    let status = match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Validation(_) | Error::OperationNotAllowed(_) => StatusCode::BAD_REQUEST,
        Error::DatabaseUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        // Malformed bodies are the client's fault; the rest is ours.
        Error::Json(_) | Error::Yaml(_) => StatusCode::BAD_REQUEST,
        Error::Internal(_) | Error::Io(_) | Error::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = serde_json::json!({
        "status": "error",
        "message": err.to_string(),
    });
    if let Error::Validation(fields) = err {
        body["message"] = serde_json::json!("validation failed");
        body["errors"] = serde_json::json!(fields);
    }
    (status, Json(body)).into_response()
}

/// Shorthand for handlers: unwrap a service result into a response.
pub fn respond<T, F>(result: gatehouse_domain::Result<T>, on_success: F) -> Response
where
    F: FnOnce(T) -> Response,
{
    match result {
        Ok(value) => on_success(value),
        Err(err) => api_error(&err),
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_domain::FieldError;

    use super::*;

    fn status_of(err: Error) -> StatusCode {
        api_error(&err).status()
    }

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        assert_eq!(status_of(Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(Error::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(Error::Validation(vec![FieldError::new("f", "m")])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(Error::OperationNotAllowed("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(Error::DatabaseUnavailable("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(Error::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
