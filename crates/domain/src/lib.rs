//! Shared domain types for the Gatehouse control plane: error taxonomy,
//! configuration model, and the resource/record types every other crate
//! operates on.

pub mod config;
pub mod error;
pub mod model;

pub use error::{Error, FieldError, Result};
