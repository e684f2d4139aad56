//! The policy builder: derives the per-route, per-vhost policy chains of a
//! stored resource by merging API-level and operation-level policy lists
//! and injecting the configured system policies.

mod resolve;

pub use resolve::resolve_policy_version;

use gatehouse_domain::config::{PolicyCatalogConfig, PolicyDefinitionConfig, RouterConfig};
use gatehouse_domain::model::{
    ConfigKind, PolicyChain, PolicyInstance, PolicyLevel, PolicyRef, StoredConfig,
    StoredPolicyConfig,
};

pub struct PolicyBuilder {
    definitions: Vec<PolicyDefinitionConfig>,
    router: RouterConfig,
}

impl PolicyBuilder {
    pub fn new(catalog: &PolicyCatalogConfig, router: RouterConfig) -> Self {
        Self {
            definitions: catalog.definitions.clone(),
            router,
        }
    }

    /// Build the derived policy record for `cfg`, or `None` when no chain
    /// would carry any policy even after system injection — the caller
    /// erases a previously-derived record in that case.
    pub fn build(&self, cfg: &StoredConfig) -> Option<StoredPolicyConfig> {
        let source = &cfg.source_configuration;

        // API-level policies in declared order. References that fail
        // resolution are dropped.
        let api_policies: Vec<PolicyInstance> = source
            .policies
            .iter()
            .filter_map(|p| self.convert(p, PolicyLevel::Api))
            .collect();

        let system_policies: Vec<PolicyInstance> = self
            .router
            .system_policies
            .iter()
            .map(|sp| PolicyInstance {
                name: sp.name.clone(),
                version: sp.version.clone(),
                attached_to: PolicyLevel::System,
                enabled: true,
                params: sp.params.clone(),
                execution_condition: None,
            })
            .collect();

        let vhosts = self.effective_vhosts(cfg);
        let context = source
            .context
            .clone()
            .unwrap_or_default()
            .replace("{version}", &cfg.version);

        let mut chains = Vec::new();
        for (method, path, op_policies) in routes_of(cfg) {
            let merged = self.merge_for_operation(&api_policies, op_policies);
            for vhost in &vhosts {
                let mut policies = merged.clone();
                policies.extend(system_policies.iter().cloned());
                chains.push(PolicyChain {
                    route_key: generate_route_name(&method, &context, &cfg.version, &path, vhost),
                    vhost: vhost.clone(),
                    policies,
                });
            }
        }

        let total: usize = chains.iter().map(|c| c.policies.len()).sum();
        if total == 0 {
            return None;
        }

        Some(StoredPolicyConfig {
            id: StoredPolicyConfig::id_for(&cfg.id),
            api_name: cfg.display_name.clone(),
            api_version: cfg.version.clone(),
            context,
            chains,
        })
    }

    /// Operation policies present: emit them in operation order at level
    /// `Route`, then the remaining API-level policies whose names the
    /// operation did not override. Otherwise the API-level list as-is.
    fn merge_for_operation(
        &self,
        api_policies: &[PolicyInstance],
        op_policies: &[PolicyRef],
    ) -> Vec<PolicyInstance> {
        if op_policies.is_empty() {
            return api_policies.to_vec();
        }
        let mut merged: Vec<PolicyInstance> = op_policies
            .iter()
            .filter_map(|p| self.convert(p, PolicyLevel::Route))
            .collect();
        let op_names: Vec<String> = merged.iter().map(|p| p.name.clone()).collect();
        merged.extend(
            api_policies
                .iter()
                .filter(|p| !op_names.iter().any(|n| n == &p.name))
                .cloned(),
        );
        merged
    }

    fn convert(&self, p: &PolicyRef, level: PolicyLevel) -> Option<PolicyInstance> {
        let resolved = match resolve_policy_version(&self.definitions, &p.name, &p.version) {
            Some(v) => v,
            None => {
                tracing::debug!(
                    policy = %p.name,
                    version = %p.version,
                    "dropping unresolvable policy reference"
                );
                return None;
            }
        };
        Some(PolicyInstance {
            name: p.name.clone(),
            version: resolved,
            attached_to: level,
            enabled: true,
            // Fresh map; the chain must not alias the declaration.
            params: p.params.clone(),
            execution_condition: p.execution_condition.clone(),
        })
    }

    /// Main vhosts always; sandbox vhosts only when the resource declares
    /// a sandbox upstream. Per-resource overrides win over router defaults.
    fn effective_vhosts(&self, cfg: &StoredConfig) -> Vec<String> {
        let source = &cfg.source_configuration;
        let override_vhosts = source.vhosts.as_ref();

        let mut vhosts: Vec<String> = match override_vhosts.filter(|v| !v.main.is_empty()) {
            Some(v) => v.main.clone(),
            None => self.router.main_vhosts.clone(),
        };
        if source.sandbox_endpoint.is_some() {
            let sandbox = match override_vhosts.filter(|v| !v.sandbox.is_empty()) {
                Some(v) => v.sandbox.clone(),
                None => self.router.sandbox_vhosts.clone(),
            };
            vhosts.extend(sandbox);
        }
        vhosts
    }
}

/// The route list of a resource: REST operations, WebSub channels (as POST
/// routes named after the channel), and a single catch-all route for kinds
/// without operations so API-level policies still apply.
fn routes_of(cfg: &StoredConfig) -> Vec<(String, String, &[PolicyRef])> {
    let source = &cfg.source_configuration;
    match cfg.kind {
        ConfigKind::WebSubApi => source
            .channels
            .iter()
            .map(|ch| {
                (
                    "POST".to_owned(),
                    format!("/{}", ch.name),
                    ch.policies.as_slice(),
                )
            })
            .collect(),
        _ if !source.operations.is_empty() => source
            .operations
            .iter()
            .map(|op| {
                (
                    op.method.to_ascii_uppercase(),
                    op.path.clone(),
                    op.policies.as_slice(),
                )
            })
            .collect(),
        _ => vec![("ANY".to_owned(), String::new(), &[] as &[PolicyRef])],
    }
}

/// Stable, collision-free route key, identical to what the xDS translator
/// emits. Components are joined with `:`, which none of them contains.
pub fn generate_route_name(
    method: &str,
    context: &str,
    version: &str,
    path: &str,
    vhost: &str,
) -> String {
    format!("{vhost}:{method}:{context}:{version}:{path}")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use gatehouse_domain::config::SystemPolicyConfig;
    use gatehouse_domain::model::{
        ApiDeclaration, ChannelDeclaration, DeploymentStatus, EndpointDeclaration,
        OperationDeclaration,
    };

    use super::*;

    fn catalog() -> PolicyCatalogConfig {
        PolicyCatalogConfig {
            definitions: [
                ("auth", "v1.0.0"),
                ("auth", "v2.0.0"),
                ("rateLimit", "v1.0.0"),
                ("rateLimit", "v2.0.0"),
                ("logging", "v1.0.0"),
                ("logging", "v2.0.0"),
            ]
            .into_iter()
            .map(|(name, version)| PolicyDefinitionConfig {
                name: name.into(),
                version: version.into(),
            })
            .collect(),
        }
    }

    fn router() -> RouterConfig {
        RouterConfig {
            gateway_host: "gateway.local".into(),
            main_vhosts: vec!["localhost".into()],
            sandbox_vhosts: vec!["sandbox.localhost".into()],
            system_policies: vec![],
        }
    }

    fn p(name: &str, version: &str) -> PolicyRef {
        PolicyRef {
            name: name.into(),
            version: version.into(),
            params: HashMap::new(),
            execution_condition: None,
        }
    }

    fn rest_config(api_policies: Vec<PolicyRef>, operations: Vec<OperationDeclaration>) -> StoredConfig {
        let now = Utc::now();
        let decl = ApiDeclaration {
            kind: ConfigKind::RestApi,
            name: "Orders".into(),
            version: "1.0.0".into(),
            handle: Some("orders-1".into()),
            context: Some("/orders".into()),
            endpoint: Some(EndpointDeclaration {
                url: "http://orders.svc:8080".into(),
                timeout_ms: None,
            }),
            sandbox_endpoint: None,
            vhosts: None,
            policies: api_policies,
            operations,
            channels: vec![],
            provider_template: None,
            labels: HashMap::new(),
        };
        StoredConfig {
            id: "cfg-orders".into(),
            handle: "orders-1".into(),
            kind: ConfigKind::RestApi,
            display_name: "Orders".into(),
            version: "1.0.0".into(),
            context: Some("/orders".into()),
            configuration: serde_json::json!({}),
            source_configuration: decl,
            status: DeploymentStatus::Pending,
            created_at: now,
            updated_at: now,
            deployed_at: None,
            deployed_version: 0,
            labels: HashMap::new(),
        }
    }

    fn names_and_levels(chain: &PolicyChain) -> Vec<(String, PolicyLevel, String)> {
        chain
            .policies
            .iter()
            .map(|p| (p.name.clone(), p.attached_to, p.version.clone()))
            .collect()
    }

    /// API-level only: the chain carries the API list in declared order.
    #[test]
    fn api_level_only_chain() {
        let builder = PolicyBuilder::new(&catalog(), router());
        let cfg = rest_config(
            vec![p("auth", "v1"), p("rateLimit", "v1"), p("logging", "v1")],
            vec![OperationDeclaration {
                method: "GET".into(),
                path: "/r".into(),
                policies: vec![],
            }],
        );

        let derived = builder.build(&cfg).expect("derived");
        assert_eq!(derived.id, "cfg-orders-policies");
        assert_eq!(derived.chains.len(), 1);
        assert_eq!(
            names_and_levels(&derived.chains[0]),
            vec![
                ("auth".into(), PolicyLevel::Api, "v1.0.0".into()),
                ("rateLimit".into(), PolicyLevel::Api, "v1.0.0".into()),
                ("logging".into(), PolicyLevel::Api, "v1.0.0".into()),
            ]
        );
    }

    /// Operation override: the overridden name moves to the front at level
    /// Route with the operation's version; the rest of the API list follows.
    #[test]
    fn operation_override_path() {
        let builder = PolicyBuilder::new(&catalog(), router());
        let cfg = rest_config(
            vec![p("auth", "v1"), p("rateLimit", "v1"), p("logging", "v1")],
            vec![OperationDeclaration {
                method: "GET".into(),
                path: "/r".into(),
                policies: vec![p("auth", "v2")],
            }],
        );

        let derived = builder.build(&cfg).expect("derived");
        assert_eq!(
            names_and_levels(&derived.chains[0]),
            vec![
                ("auth".into(), PolicyLevel::Route, "v2.0.0".into()),
                ("rateLimit".into(), PolicyLevel::Api, "v1.0.0".into()),
                ("logging".into(), PolicyLevel::Api, "v1.0.0".into()),
            ]
        );
    }

    /// A full operation-level list reorders the chain wholesale.
    #[test]
    fn operation_reorders_chain() {
        let builder = PolicyBuilder::new(&catalog(), router());
        let cfg = rest_config(
            vec![p("auth", "v1"), p("rateLimit", "v1"), p("logging", "v1")],
            vec![OperationDeclaration {
                method: "GET".into(),
                path: "/r".into(),
                policies: vec![p("logging", "v2"), p("auth", "v2"), p("rateLimit", "v2")],
            }],
        );

        let derived = builder.build(&cfg).expect("derived");
        assert_eq!(
            names_and_levels(&derived.chains[0]),
            vec![
                ("logging".into(), PolicyLevel::Route, "v2.0.0".into()),
                ("auth".into(), PolicyLevel::Route, "v2.0.0".into()),
                ("rateLimit".into(), PolicyLevel::Route, "v2.0.0".into()),
            ]
        );
    }

    #[test]
    fn unresolvable_policies_are_dropped_silently() {
        let builder = PolicyBuilder::new(&catalog(), router());
        let cfg = rest_config(
            vec![p("auth", "v1"), p("unknown", "v9")],
            vec![OperationDeclaration {
                method: "GET".into(),
                path: "/r".into(),
                policies: vec![],
            }],
        );

        let derived = builder.build(&cfg).expect("derived");
        assert_eq!(derived.chains[0].policies.len(), 1);
        assert_eq!(derived.chains[0].policies[0].name, "auth");
    }

    #[test]
    fn no_policies_returns_none() {
        let builder = PolicyBuilder::new(&catalog(), router());
        let cfg = rest_config(
            vec![],
            vec![OperationDeclaration {
                method: "GET".into(),
                path: "/r".into(),
                policies: vec![],
            }],
        );
        assert!(builder.build(&cfg).is_none());
    }

    /// System policies keep a chain alive even without user policies, and
    /// land at the end of every chain.
    #[test]
    fn system_policies_are_injected_per_vhost() {
        let mut router = router();
        router.system_policies = vec![SystemPolicyConfig {
            name: "analytics".into(),
            version: "v1.0.0".into(),
            params: HashMap::new(),
        }];
        let builder = PolicyBuilder::new(&catalog(), router);
        let mut cfg = rest_config(
            vec![p("auth", "v1")],
            vec![OperationDeclaration {
                method: "GET".into(),
                path: "/r".into(),
                policies: vec![],
            }],
        );
        cfg.source_configuration.sandbox_endpoint = Some(EndpointDeclaration {
            url: "http://sandbox.svc:8080".into(),
            timeout_ms: None,
        });

        let derived = builder.build(&cfg).expect("derived");
        // main + sandbox vhost
        assert_eq!(derived.chains.len(), 2);
        for chain in &derived.chains {
            let last = chain.policies.last().expect("non-empty");
            assert_eq!(last.name, "analytics");
            assert_eq!(last.attached_to, PolicyLevel::System);
        }
        let vhosts: Vec<&str> = derived.chains.iter().map(|c| c.vhost.as_str()).collect();
        assert_eq!(vhosts, vec!["localhost", "sandbox.localhost"]);
    }

    #[test]
    fn websub_channels_become_routes() {
        let builder = PolicyBuilder::new(&catalog(), router());
        let mut cfg = rest_config(vec![p("auth", "v1")], vec![]);
        cfg.kind = ConfigKind::WebSubApi;
        cfg.source_configuration.kind = ConfigKind::WebSubApi;
        cfg.source_configuration.channels = vec![ChannelDeclaration {
            name: "created".into(),
            policies: vec![p("logging", "v2")],
        }];

        let derived = builder.build(&cfg).expect("derived");
        assert_eq!(derived.chains.len(), 1);
        assert!(derived.chains[0].route_key.contains(":POST:"));
        assert!(derived.chains[0].route_key.contains("/created"));
        assert_eq!(
            names_and_levels(&derived.chains[0]),
            vec![
                ("logging".into(), PolicyLevel::Route, "v2.0.0".into()),
                ("auth".into(), PolicyLevel::Api, "v1.0.0".into()),
            ]
        );
    }

    #[test]
    fn route_keys_are_stable_and_distinct_per_vhost() {
        assert_eq!(
            generate_route_name("GET", "/orders", "1.0.0", "/r", "localhost"),
            "localhost:GET:/orders:1.0.0:/r"
        );
        assert_ne!(
            generate_route_name("GET", "/orders", "1.0.0", "/r", "a"),
            generate_route_name("GET", "/orders", "1.0.0", "/r", "b")
        );
    }

    /// Building twice yields identical output, and repeated invocations
    /// keep identical ordering.
    #[test]
    fn builder_is_idempotent_and_deterministic() {
        let builder = PolicyBuilder::new(&catalog(), router());
        let cfg = rest_config(
            vec![p("auth", "v1"), p("rateLimit", "v1"), p("logging", "v1")],
            vec![
                OperationDeclaration {
                    method: "GET".into(),
                    path: "/a".into(),
                    policies: vec![p("auth", "v2")],
                },
                OperationDeclaration {
                    method: "POST".into(),
                    path: "/b".into(),
                    policies: vec![],
                },
            ],
        );

        let first = builder.build(&cfg).expect("derived");
        for _ in 0..100 {
            let again = builder.build(&cfg).expect("derived");
            assert_eq!(again, first);
        }
    }
}
