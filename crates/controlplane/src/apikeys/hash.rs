//! API-key hashing and verification.
//!
//! Locally-minted keys are stored as `$sha256$<salt_hex>$<hash_hex>`.
//! Verification additionally recognizes bcrypt and Argon2id stored forms
//! (keys imported from other systems) and falls back to a constant-time
//! plain comparison for unmigrated rows.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Mint a new plain API key: prefixed, 256 bits of entropy, hex-encoded.
pub fn generate_api_key() -> String {
    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();
    format!("gk_{}{}", hex::encode(a.as_bytes()), hex::encode(b.as_bytes()))
}

/// Hash a plain key into its stored form with a fresh random salt.
pub fn hash_api_key(plain: &str) -> String {
    let salt = *uuid::Uuid::new_v4().as_bytes();
    let digest = sha256_salted(plain.as_bytes(), &salt);
    format!("$sha256${}${}", hex::encode(salt), hex::encode(digest))
}

/// SHA-256 hex fingerprint of a plain key; the external-key index key.
pub fn sha256_hex(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

fn sha256_salted(plain: &[u8], salt: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(plain);
    hasher.update(salt);
    hasher.finalize().into()
}

/// Verify a plain key against a stored form, dispatching on the stored
/// form's scheme prefix.
pub fn verify_api_key(stored: &str, plain: &str) -> bool {
    if let Some(rest) = stored.strip_prefix("$sha256$") {
        return verify_sha256(rest, plain);
    }
    if stored.starts_with("$2a$") || stored.starts_with("$2b$") || stored.starts_with("$2y$") {
        return bcrypt::verify(plain, stored).unwrap_or(false);
    }
    if stored.starts_with("$argon2id$") {
        return verify_argon2id(stored, plain);
    }
    // Unmigrated plain-text row. Still constant-time, but operators should
    // rotate these keys onto a hashed scheme.
    tracing::warn!("api key stored in plain text; comparison succeeded only for legacy rows");
    plain.as_bytes().ct_eq(stored.as_bytes()).into()
}

fn verify_sha256(rest: &str, plain: &str) -> bool {
    let Some((salt_hex, hash_hex)) = rest.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    let digest = sha256_salted(plain.as_bytes(), &salt);
    digest.as_slice().ct_eq(expected.as_slice()).into()
}

/// `$argon2id$v=19$m=<m>,t=<t>,p=<p>$<salt_b64>$<hash_b64>`, tolerant to
/// both unpadded (PHC) and padded base64 payloads.
fn verify_argon2id(stored: &str, plain: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    // ["", "argon2id", "v=19", "m=..,t=..,p=..", salt, hash]
    if parts.len() != 6 || parts[1] != "argon2id" || parts[2] != "v=19" {
        return false;
    }
    let Some((m, t, p)) = parse_argon2_params(parts[3]) else {
        return false;
    };
    let (Some(salt), Some(expected)) = (decode_b64(parts[4]), decode_b64(parts[5])) else {
        return false;
    };

    let Ok(params) = argon2::Params::new(m, t, p, Some(expected.len())) else {
        return false;
    };
    let hasher = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
    let mut computed = vec![0u8; expected.len()];
    if hasher
        .hash_password_into(plain.as_bytes(), &salt, &mut computed)
        .is_err()
    {
        return false;
    }
    computed.as_slice().ct_eq(expected.as_slice()).into()
}

fn parse_argon2_params(segment: &str) -> Option<(u32, u32, u32)> {
    let mut m = None;
    let mut t = None;
    let mut p = None;
    for kv in segment.split(',') {
        let (key, value) = kv.split_once('=')?;
        let value: u32 = value.parse().ok()?;
        match key {
            "m" => m = Some(value),
            "t" => t = Some(value),
            "p" => p = Some(value),
            _ => return None,
        }
    }
    Some((m?, t?, p?))
}

fn decode_b64(payload: &str) -> Option<Vec<u8>> {
    STANDARD_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD.decode(payload))
        .ok()
}
