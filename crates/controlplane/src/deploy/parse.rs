//! Request-body parsing: JSON or YAML, selected by `Content-Type`.

use serde::de::DeserializeOwned;

use gatehouse_domain::model::ApiDeclaration;
use gatehouse_domain::Result;

pub fn parse_body<T: DeserializeOwned>(body: &[u8], content_type: Option<&str>) -> Result<T> {
    let content_type = content_type.unwrap_or("application/json");
    if content_type.contains("yaml") || content_type.contains("yml") {
        Ok(serde_yaml::from_slice(body)?)
    } else {
        Ok(serde_json::from_slice(body)?)
    }
}

pub fn parse_declaration(body: &[u8], content_type: Option<&str>) -> Result<ApiDeclaration> {
    parse_body(body, content_type)
}

#[cfg(test)]
mod tests {
    use gatehouse_domain::model::ConfigKind;

    use super::*;

    const YAML: &str = "kind: RestApi\nname: Orders\nversion: 1.0.0\ncontext: /orders\n";
    const JSON: &str = r#"{"kind":"RestApi","name":"Orders","version":"1.0.0","context":"/orders"}"#;

    #[test]
    fn dispatches_on_content_type() {
        let from_yaml =
            parse_declaration(YAML.as_bytes(), Some("application/yaml")).expect("yaml");
        let from_json =
            parse_declaration(JSON.as_bytes(), Some("application/json")).expect("json");
        assert_eq!(from_yaml.kind, ConfigKind::RestApi);
        assert_eq!(from_yaml, from_json);
    }

    #[test]
    fn missing_content_type_defaults_to_json() {
        let decl = parse_declaration(JSON.as_bytes(), None).expect("json");
        assert_eq!(decl.name, "Orders");
    }

    #[test]
    fn malformed_body_is_a_client_error() {
        let err = parse_declaration(b"{not json", Some("application/json")).expect_err("bad");
        assert!(err.is_client());
    }
}
