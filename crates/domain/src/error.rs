use std::fmt;

use serde::Serialize;

/// A single field-level validation failure, surfaced to clients as
/// `{field, message}` inside a 400 response body.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Shared error type used across all Gatehouse crates.
///
/// The first six variants are the taxonomy handlers match on when mapping
/// to HTTP status codes; everything else collapses to a server-side error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("operation not allowed: {0}")]
    OperationNotAllowed(String),

    #[error("database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("internal: {0}")]
    Internal(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP: {0}")]
    Http(String),
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Shorthand for a single-field validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation(vec![FieldError::new(field, message)])
    }

    /// Whether the error is attributable to the client request (4xx)
    /// rather than the server (5xx).
    pub fn is_client(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::Conflict(_)
                | Error::Validation(_)
                | Error::OperationNotAllowed(_)
                | Error::Json(_)
                | Error::Yaml(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
