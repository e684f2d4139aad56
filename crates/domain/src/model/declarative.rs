use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::stored::ConfigKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Declarative resource form
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The declarative document a client submits. One shape serves every
/// resource kind; kind-specific fields are optional and validated per kind.
///
/// This is retained verbatim on the stored record (`source_configuration`)
/// because read APIs echo it back and the policy builder needs fields that
/// do not survive normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiDeclaration {
    pub kind: ConfigKind,
    /// Display name; `name` in the wire document.
    pub name: String,
    pub version: String,
    /// User-chosen stable handle; derived from name+version when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Base path, e.g. `/store/{version}`. Required for RestApi/WebSubApi.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Production upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointDeclaration>,
    /// Sandbox upstream; its presence enables the sandbox vhosts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_endpoint: Option<EndpointDeclaration>,
    /// Per-resource vhost overrides; defaults come from the router config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vhosts: Option<VhostDeclaration>,
    /// API-level policies, in declared order.
    #[serde(default)]
    pub policies: Vec<PolicyRef>,
    /// REST operations.
    #[serde(default)]
    pub operations: Vec<OperationDeclaration>,
    /// WebSub channels.
    #[serde(default)]
    pub channels: Vec<ChannelDeclaration>,
    /// LLM provider template handle (LlmProvider/LlmProxy kinds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_template: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl ApiDeclaration {
    /// The handle this declaration resolves to: the explicit one, or a
    /// slug derived from name and version.
    pub fn effective_handle(&self) -> String {
        match &self.handle {
            Some(h) if !h.is_empty() => h.clone(),
            _ => derive_handle(&self.name, &self.version),
        }
    }
}

/// `"Petstore API" + "1.2.0"` becomes `petstore-api-1.2.0`.
pub fn derive_handle(name: &str, version: &str) -> String {
    let mut slug = String::with_capacity(name.len() + version.len() + 1);
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    format!("{slug}-{version}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDeclaration {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VhostDeclaration {
    #[serde(default)]
    pub main: Vec<String>,
    #[serde(default)]
    pub sandbox: Vec<String>,
}

/// A reference to a policy definition, as declared by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRef {
    pub name: String,
    /// Major (`v1`) or exact (`v1.0.0`) version.
    pub version: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_condition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationDeclaration {
    /// HTTP verb, upper-case.
    pub method: String,
    /// Route template relative to the context, e.g. `/pets/{id}`.
    pub path: String,
    /// Operation-level policies; when non-empty these take precedence over
    /// the API-level list for this operation.
    #[serde(default)]
    pub policies: Vec<PolicyRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDeclaration {
    pub name: String,
    #[serde(default)]
    pub policies: Vec<PolicyRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_derivation_slugs_name() {
        assert_eq!(derive_handle("Petstore API", "1.2.0"), "petstore-api-1.2.0");
        assert_eq!(derive_handle("orders", "v2"), "orders-v2");
        assert_eq!(derive_handle("A  B!!C", "1"), "a-b-c-1");
    }

    #[test]
    fn effective_handle_prefers_explicit() {
        let mut decl = minimal();
        assert_eq!(decl.effective_handle(), "orders-1.0.0");
        decl.handle = Some("orders-prod".into());
        assert_eq!(decl.effective_handle(), "orders-prod");
    }

    #[test]
    fn yaml_document_parses() {
        let raw = r#"
            kind: RestApi
            name: Orders
            version: 1.0.0
            context: /orders/{version}
            endpoint:
              url: http://orders.svc:8080
            policies:
              - name: auth
                version: v1
            operations:
              - method: GET
                path: /list
        "#;
        let decl: ApiDeclaration = serde_yaml::from_str(raw).expect("parse yaml");
        assert_eq!(decl.kind, ConfigKind::RestApi);
        assert_eq!(decl.policies.len(), 1);
        assert_eq!(decl.operations[0].method, "GET");
    }

    fn minimal() -> ApiDeclaration {
        ApiDeclaration {
            kind: ConfigKind::RestApi,
            name: "Orders".into(),
            version: "1.0.0".into(),
            handle: None,
            context: Some("/orders".into()),
            endpoint: None,
            sandbox_endpoint: None,
            vhosts: None,
            policies: vec![],
            operations: vec![],
            channels: vec![],
            provider_template: None,
            labels: HashMap::new(),
        }
    }
}
