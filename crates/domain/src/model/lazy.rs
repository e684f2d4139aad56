use serde::{Deserialize, Serialize};

/// A referenced resource delivered to the data plane over the secondary
/// xDS channel, addressed by `(resource_type, id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LazyResource {
    pub resource_type: String,
    pub id: String,
    /// Opaque payload; the consumer knows the shape per type.
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl LazyResource {
    pub fn key(&self) -> (String, String) {
        (self.resource_type.clone(), self.id.clone())
    }
}
