//! API-key lifecycle: create, rotate, revoke, list, with multi-scheme
//! hash verification and the external-key fingerprint index.

mod hash;
mod service;

pub use hash::{generate_api_key, hash_api_key, sha256_hex, verify_api_key};
pub use service::{ApiKeyService, CreateApiKeyParams, CreatedApiKey, ExpiresIn, UpdateApiKeyParams};
