//! Declarative → normalized transformation. The normalized document is
//! what the xDS translator consumes: resolved context, explicit vhosts,
//! one route entry per operation/channel.

use serde_json::json;

use gatehouse_domain::config::RouterConfig;
use gatehouse_domain::model::{ApiDeclaration, ConfigKind};

use crate::policy::generate_route_name;

pub fn normalize(decl: &ApiDeclaration, router: &RouterConfig) -> serde_json::Value {
    let context = decl
        .context
        .clone()
        .unwrap_or_default()
        .replace("{version}", &decl.version);

    let main_vhosts: Vec<String> = match decl.vhosts.as_ref().filter(|v| !v.main.is_empty()) {
        Some(v) => v.main.clone(),
        None => router.main_vhosts.clone(),
    };
    let sandbox_vhosts: Vec<String> = if decl.sandbox_endpoint.is_some() {
        match decl.vhosts.as_ref().filter(|v| !v.sandbox.is_empty()) {
            Some(v) => v.sandbox.clone(),
            None => router.sandbox_vhosts.clone(),
        }
    } else {
        Vec::new()
    };

    let mut routes: Vec<serde_json::Value> = Vec::new();
    match decl.kind {
        ConfigKind::WebSubApi => {
            for ch in &decl.channels {
                let path = format!("/{}", ch.name);
                for vhost in &main_vhosts {
                    routes.push(json!({
                        "method": "POST",
                        "path": path,
                        "vhost": vhost,
                        "routeKey": generate_route_name("POST", &context, &decl.version, &path, vhost),
                    }));
                }
            }
        }
        _ => {
            for op in &decl.operations {
                let method = op.method.to_ascii_uppercase();
                for vhost in &main_vhosts {
                    routes.push(json!({
                        "method": method,
                        "path": op.path,
                        "vhost": vhost,
                        "routeKey": generate_route_name(&method, &context, &decl.version, &op.path, vhost),
                    }));
                }
            }
        }
    }

    let mut normalized = json!({
        "kind": decl.kind,
        "displayName": decl.name,
        "version": decl.version,
        "context": context,
        "vhosts": { "main": main_vhosts, "sandbox": sandbox_vhosts },
        "routes": routes,
    });

    if let Some(ep) = &decl.endpoint {
        normalized["upstream"] = json!({ "url": ep.url, "timeoutMs": ep.timeout_ms });
    }
    if let Some(ep) = &decl.sandbox_endpoint {
        normalized["sandboxUpstream"] = json!({ "url": ep.url, "timeoutMs": ep.timeout_ms });
    }
    if let Some(template) = &decl.provider_template {
        normalized["providerTemplate"] = json!(template);
    }

    normalized
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use gatehouse_domain::model::{EndpointDeclaration, OperationDeclaration};

    use super::*;

    #[test]
    fn normalization_resolves_context_and_routes() {
        let decl = ApiDeclaration {
            kind: ConfigKind::RestApi,
            name: "Orders".into(),
            version: "1.0.0".into(),
            handle: None,
            context: Some("/orders/{version}".into()),
            endpoint: Some(EndpointDeclaration {
                url: "http://orders.svc:8080".into(),
                timeout_ms: Some(3000),
            }),
            sandbox_endpoint: None,
            vhosts: None,
            policies: vec![],
            operations: vec![OperationDeclaration {
                method: "get".into(),
                path: "/list".into(),
                policies: vec![],
            }],
            channels: vec![],
            provider_template: None,
            labels: HashMap::new(),
        };
        let router = RouterConfig::default();

        let normalized = normalize(&decl, &router);
        assert_eq!(normalized["context"], "/orders/1.0.0");
        assert_eq!(normalized["routes"][0]["method"], "GET");
        assert_eq!(
            normalized["routes"][0]["routeKey"],
            "localhost:GET:/orders/1.0.0:1.0.0:/list"
        );
        assert_eq!(normalized["upstream"]["url"], "http://orders.svc:8080");
        assert_eq!(normalized["vhosts"]["sandbox"], json!([]));
    }
}
