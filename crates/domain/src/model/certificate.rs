use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// TLS material carried to the data plane. The control plane does not parse
/// X.509; subject/issuer/validity are supplied by the caller alongside the
/// PEM bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCertificate {
    pub id: String,
    /// Unique certificate name.
    pub name: String,
    #[serde(with = "pem_bytes")]
    pub certificate: Vec<u8>,
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Number of certificates in the PEM bundle.
    pub cert_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// PEM bodies are text; serialize them as UTF-8 strings rather than byte
/// arrays so YAML/JSON dumps stay readable.
mod pem_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        Ok(s.into_bytes())
    }
}
