//! In-memory authoritative stores. Each store confines its shared state
//! behind a single reader-writer lock; none of them performs IO.

mod api_keys;
mod certificates;
mod configs;
mod lazy;
mod policies;
mod topics;

pub use api_keys::ApiKeyStore;
pub use certificates::CertificateStore;
pub use configs::ConfigStore;
pub use lazy::LazyResourceStore;
pub use policies::PolicyStore;
pub use topics::TopicManager;

/// Shared fixtures for tests across the crate.
#[cfg(test)]
pub(crate) mod tests_fixtures {
    use std::collections::HashMap;

    use chrono::Utc;
    use gatehouse_domain::model::{
        ApiDeclaration, ChannelDeclaration, ConfigKind, DeploymentStatus, StoredConfig,
    };

    pub(crate) fn stored_config(
        kind: ConfigKind,
        handle: &str,
        name: &str,
        version: &str,
    ) -> StoredConfig {
        let now = Utc::now();
        let decl = ApiDeclaration {
            kind,
            name: name.into(),
            version: version.into(),
            handle: Some(handle.into()),
            context: Some("/orders/{version}".into()),
            endpoint: None,
            sandbox_endpoint: None,
            vhosts: None,
            policies: vec![],
            operations: vec![],
            channels: match kind {
                ConfigKind::WebSubApi => vec![
                    ChannelDeclaration {
                        name: "created".into(),
                        policies: vec![],
                    },
                    ChannelDeclaration {
                        name: "updated".into(),
                        policies: vec![],
                    },
                ],
                _ => vec![],
            },
            provider_template: None,
            labels: HashMap::new(),
        };
        StoredConfig {
            id: uuid::Uuid::new_v4().to_string(),
            handle: handle.into(),
            kind,
            display_name: name.into(),
            version: version.into(),
            context: Some("/orders/{version}".into()),
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
}
