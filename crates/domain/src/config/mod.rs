mod database;
mod event_gateway;
mod notifier;
mod router;
mod server;

pub use database::*;
pub use event_gateway::*;
pub use notifier::*;
pub use router::*;
pub use server::*;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub policies: PolicyCatalogConfig,
    #[serde(default)]
    pub event_gateway: EventGatewayConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Deadline for pushing one snapshot to the data plane. Values below
    /// 10 seconds are clamped up at startup; background updates after a
    /// mutation always get at least this long.
    #[serde(default = "d_push_timeout_secs")]
    pub push_timeout_secs: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            push_timeout_secs: d_push_timeout_secs(),
        }
    }
}

fn d_push_timeout_secs() -> u64 {
    10
}

impl SnapshotConfig {
    /// 10 seconds is the hard floor for the push deadline.
    pub fn effective_push_timeout_secs(&self) -> u64 {
        self.push_timeout_secs.max(10)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

fn error(field: impl Into<String>, message: impl Into<String>) -> ConfigIssue {
    ConfigIssue {
        severity: ConfigSeverity::Error,
        field: field.into(),
        message: message.into(),
    }
}

fn warning(field: impl Into<String>, message: impl Into<String>) -> ConfigIssue {
    ConfigIssue {
        severity: ConfigSeverity::Warning,
        field: field.into(),
        message: message.into(),
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            issues.push(error("server.host", "host must not be empty"));
        }
        if self.server.max_concurrent_requests == 0 {
            issues.push(error(
                "server.max_concurrent_requests",
                "must be greater than 0",
            ));
        }

        if self.database.path.as_os_str().is_empty() {
            issues.push(error("database.path", "path must not be empty"));
        }
        if self.database.max_connections == 0 {
            issues.push(error("database.max_connections", "must be greater than 0"));
        }

        if self.router.main_vhosts.is_empty() {
            issues.push(error(
                "router.main_vhosts",
                "at least one main vhost is required",
            ));
        }
        for (i, sp) in self.router.system_policies.iter().enumerate() {
            if sp.name.is_empty() {
                issues.push(error(
                    format!("router.system_policies[{i}].name"),
                    "name must not be empty",
                ));
            }
            if sp.version.is_empty() {
                issues.push(error(
                    format!("router.system_policies[{i}].version"),
                    "version must not be empty",
                ));
            }
        }

        if self.event_gateway.timeout_seconds == 0 {
            issues.push(error(
                "event_gateway.timeout_seconds",
                "timeout must be greater than 0",
            ));
        }
        if !self.event_gateway.hub_url.is_empty()
            && !self.event_gateway.hub_url.starts_with("http://")
            && !self.event_gateway.hub_url.starts_with("https://")
        {
            issues.push(error(
                "event_gateway.hub_url",
                format!(
                    "hub_url must start with http:// or https:// (got \"{}\")",
                    self.event_gateway.hub_url
                ),
            ));
        }

        if let Some(url) = &self.notifier.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                issues.push(error(
                    "notifier.base_url",
                    format!("base_url must start with http:// or https:// (got \"{url}\")"),
                ));
            }
        }
        if self.notifier.poll_interval_ms == 0 {
            issues.push(error("notifier.poll_interval_ms", "must be greater than 0"));
        }

        if self.snapshot.push_timeout_secs < 10 {
            issues.push(warning(
                "snapshot.push_timeout_secs",
                "values below 10s are clamped up to the 10s floor",
            ));
        }

        // Duplicate (name, version) pairs in the policy catalogue shadow
        // each other; the resolver would pick one arbitrarily.
        let mut seen: HashSet<String> = HashSet::new();
        for (i, def) in self.policies.definitions.iter().enumerate() {
            if def.name.is_empty() {
                issues.push(error(
                    format!("policies.definitions[{i}].name"),
                    "name must not be empty",
                ));
            }
            if def.version.is_empty() {
                issues.push(error(
                    format!("policies.definitions[{i}].version"),
                    "version must not be empty",
                ));
            }
            let key = format!("{}:{}", def.name, def.version);
            if !def.name.is_empty() && !seen.insert(key) {
                issues.push(warning(
                    format!("policies.definitions[{i}]"),
                    format!("duplicate definition \"{} {}\"", def.name, def.version),
                ));
            }
        }

        // CORS: warn if wildcard is used.
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            issues.push(warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        issues
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn find_issue<'a>(issues: &'a [ConfigIssue], field_prefix: &str) -> Option<&'a ConfigIssue> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn default_config_passes() {
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.port").expect("expected server.port error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn empty_main_vhosts_is_error() {
        let mut cfg = Config::default();
        cfg.router.main_vhosts.clear();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "router.main_vhosts").expect("expected vhost error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn hub_timeout_zero_is_error() {
        let mut cfg = Config::default();
        cfg.event_gateway.timeout_seconds = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "event_gateway.timeout_seconds")
            .expect("expected timeout error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn invalid_hub_scheme_is_error() {
        let mut cfg = Config::default();
        cfg.event_gateway.hub_url = "ftp://hub.local".into();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "event_gateway.hub_url").expect("expected hub_url error");
        assert!(issue.message.contains("http://"));
    }

    #[test]
    fn duplicate_policy_definition_is_warning() {
        let mut cfg = Config::default();
        cfg.policies.definitions = vec![
            PolicyDefinitionConfig {
                name: "rateLimit".into(),
                version: "v1.0.0".into(),
            },
            PolicyDefinitionConfig {
                name: "rateLimit".into(),
                version: "v1.0.0".into(),
            },
        ];
        let issues = cfg.validate();
        let issue = find_issue(&issues, "policies.definitions[1]")
            .expect("expected duplicate-definition warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn snapshot_timeout_floor_is_clamped() {
        let cfg = SnapshotConfig {
            push_timeout_secs: 3,
        };
        assert_eq!(cfg.effective_push_timeout_secs(), 10);
        let cfg = SnapshotConfig {
            push_timeout_secs: 30,
        };
        assert_eq!(cfg.effective_push_timeout_secs(), 30);
    }

    #[test]
    fn toml_roundtrip_with_defaults() {
        let raw = r#"
            [server]
            port = 9444

            [event_gateway]
            hub_url = "http://hub.internal:9021/hub"
            timeout_seconds = 5
        "#;
        let cfg: Config = toml::from_str(raw).expect("parse config");
        assert_eq!(cfg.server.port, 9444);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.event_gateway.timeout_seconds, 5);
        assert_eq!(cfg.router.main_vhosts, vec!["localhost".to_string()]);
    }
}
