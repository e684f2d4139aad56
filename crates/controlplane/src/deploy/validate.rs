//! Declaration validation. Failures collect into per-field messages so the
//! client sees every problem in one 400 response.

use std::sync::OnceLock;

use regex::Regex;

use gatehouse_domain::model::{ApiDeclaration, ConfigKind};
use gatehouse_domain::{Error, FieldError, Result};

const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

fn handle_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9.-]*$").unwrap_or_else(|_| unreachable!("static pattern"))
    })
}

pub fn validate_declaration(decl: &ApiDeclaration) -> Result<()> {
    let mut errors: Vec<FieldError> = Vec::new();
    let mut push = |field: &str, message: String| errors.push(FieldError::new(field, message));

    if decl.name.trim().is_empty() {
        push("name", "name must not be empty".into());
    }
    if decl.version.trim().is_empty() {
        push("version", "version must not be empty".into());
    }
    if let Some(handle) = &decl.handle {
        if !handle_pattern().is_match(handle) {
            push(
                "handle",
                format!("handle {handle:?} must match [a-z0-9][a-z0-9.-]*"),
            );
        }
    }

    // Context is the routing root for HTTP-facing kinds.
    match decl.kind {
        ConfigKind::RestApi | ConfigKind::WebSubApi => match &decl.context {
            None => push("context", "context is required".into()),
            Some(ctx) if !ctx.starts_with('/') => {
                push("context", format!("context {ctx:?} must start with '/'"));
            }
            Some(_) => {}
        },
        _ => {}
    }

    for (field, endpoint) in [
        ("endpoint", &decl.endpoint),
        ("sandboxEndpoint", &decl.sandbox_endpoint),
    ] {
        if let Some(ep) = endpoint {
            if !ep.url.starts_with("http://") && !ep.url.starts_with("https://") {
                push(
                    field,
                    format!("url {:?} must start with http:// or https://", ep.url),
                );
            }
        }
    }

    match decl.kind {
        ConfigKind::RestApi => {
            if decl.operations.is_empty() {
                push("operations", "at least one operation is required".into());
            }
            if decl.endpoint.is_none() {
                push("endpoint", "endpoint is required".into());
            }
        }
        ConfigKind::WebSubApi => {
            if decl.channels.is_empty() {
                push("channels", "at least one channel is required".into());
            }
        }
        ConfigKind::Mcp => {
            if decl.endpoint.is_none() {
                push("endpoint", "endpoint is required".into());
            }
        }
        ConfigKind::LlmProvider | ConfigKind::LlmProxy => {
            if decl.endpoint.is_none() && decl.provider_template.is_none() {
                push(
                    "endpoint",
                    "either endpoint or providerTemplate is required".into(),
                );
            }
        }
    }

    for (i, op) in decl.operations.iter().enumerate() {
        let method = op.method.to_ascii_uppercase();
        if !METHODS.contains(&method.as_str()) {
            errors.push(FieldError::new(
                format!("operations[{i}].method"),
                format!("unsupported method {:?}", op.method),
            ));
        }
        if !op.path.starts_with('/') {
            errors.push(FieldError::new(
                format!("operations[{i}].path"),
                format!("path {:?} must start with '/'", op.path),
            ));
        }
    }

    for (i, ch) in decl.channels.iter().enumerate() {
        if ch.name.trim().is_empty() {
            errors.push(FieldError::new(
                format!("channels[{i}].name"),
                "channel name must not be empty",
            ));
        } else if ch.name.contains('/') {
            errors.push(FieldError::new(
                format!("channels[{i}].name"),
                format!("channel name {:?} must not contain '/'", ch.name),
            ));
        }
    }

    for (i, policy) in decl.policies.iter().enumerate() {
        if policy.name.trim().is_empty() {
            errors.push(FieldError::new(
                format!("policies[{i}].name"),
                "policy name must not be empty",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use gatehouse_domain::model::{ChannelDeclaration, EndpointDeclaration, OperationDeclaration};

    use super::*;

    fn rest_decl() -> ApiDeclaration {
        ApiDeclaration {
            kind: ConfigKind::RestApi,
            name: "Orders".into(),
            version: "1.0.0".into(),
            handle: None,
            context: Some("/orders".into()),
            endpoint: Some(EndpointDeclaration {
                url: "http://orders.svc:8080".into(),
                timeout_ms: None,
            }),
            sandbox_endpoint: None,
            vhosts: None,
            policies: vec![],
            operations: vec![OperationDeclaration {
                method: "GET".into(),
                path: "/list".into(),
                policies: vec![],
            }],
            channels: vec![],
            provider_template: None,
            labels: HashMap::new(),
        }
    }

    fn field_of(err: &Error) -> Vec<String> {
        match err {
            Error::Validation(fields) => fields.iter().map(|f| f.field.clone()).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_rest_declaration_passes() {
        validate_declaration(&rest_decl()).expect("valid");
    }

    #[test]
    fn collects_multiple_field_errors() {
        let mut decl = rest_decl();
        decl.name = String::new();
        decl.context = Some("orders".into());
        decl.operations[0].method = "FETCH".into();

        let err = validate_declaration(&decl).expect_err("invalid");
        let fields = field_of(&err);
        assert!(fields.contains(&"name".to_string()));
        assert!(fields.contains(&"context".to_string()));
        assert!(fields.contains(&"operations[0].method".to_string()));
    }

    #[test]
    fn rest_requires_operations_and_endpoint() {
        let mut decl = rest_decl();
        decl.operations.clear();
        decl.endpoint = None;
        let err = validate_declaration(&decl).expect_err("invalid");
        let fields = field_of(&err);
        assert!(fields.contains(&"operations".to_string()));
        assert!(fields.contains(&"endpoint".to_string()));
    }

    #[test]
    fn websub_requires_channels_without_slashes() {
        let mut decl = rest_decl();
        decl.kind = ConfigKind::WebSubApi;
        decl.operations.clear();
        decl.endpoint = None;
        decl.channels = vec![ChannelDeclaration {
            name: "a/b".into(),
            policies: vec![],
        }];
        let err = validate_declaration(&decl).expect_err("invalid");
        assert!(field_of(&err).contains(&"channels[0].name".to_string()));
    }

    #[test]
    fn llm_provider_accepts_template_instead_of_endpoint() {
        let mut decl = rest_decl();
        decl.kind = ConfigKind::LlmProvider;
        decl.operations.clear();
        decl.endpoint = None;
        decl.context = None;
        decl.provider_template = Some("openai-compatible".into());
        validate_declaration(&decl).expect("valid");
    }

    #[test]
    fn bad_handle_is_rejected() {
        let mut decl = rest_decl();
        decl.handle = Some("Bad Handle!".into());
        let err = validate_declaration(&decl).expect_err("invalid");
        assert!(field_of(&err).contains(&"handle".to_string()));
    }
}
