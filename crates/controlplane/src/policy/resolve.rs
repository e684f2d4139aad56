//! Policy version resolution: a declared `(name, version)` reference is
//! matched against the definition catalogue, accepting either an exact
//! version or a major shorthand (`v1` → newest `v1.x.y`).

use gatehouse_domain::config::PolicyDefinitionConfig;

/// Resolve a reference to the full definition version, or `None` when no
/// definition matches (the caller drops the policy silently).
pub fn resolve_policy_version(
    defs: &[PolicyDefinitionConfig],
    name: &str,
    requested: &str,
) -> Option<String> {
    // Exact hit first.
    if defs
        .iter()
        .any(|d| d.name == name && d.version == requested)
    {
        return Some(requested.to_owned());
    }

    // Major shorthand: `v1` (or `1`) picks the newest `v1.x.y`.
    if !is_major_only(requested) {
        return None;
    }
    let prefix = format!("{}.", requested.trim_start_matches('v'));
    defs.iter()
        .filter(|d| d.name == name)
        .filter(|d| d.version.trim_start_matches('v').starts_with(&prefix))
        .max_by(|a, b| compare_versions(&a.version, &b.version))
        .map(|d| d.version.clone())
}

fn is_major_only(version: &str) -> bool {
    let digits = version.trim_start_matches('v');
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Numeric, segment-wise comparison of `v1.2.10`-style versions; ties and
/// malformed segments fall back to lexicographic order so the result stays
/// total and deterministic.
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.trim_start_matches('v')
            .split('.')
            .map(|seg| seg.parse::<u64>().unwrap_or(0))
            .collect()
    };
    parse(a).cmp(&parse(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Vec<PolicyDefinitionConfig> {
        [
            ("auth", "v1.0.0"),
            ("auth", "v1.2.0"),
            ("auth", "v2.0.0"),
            ("rateLimit", "v1.0.0"),
        ]
        .into_iter()
        .map(|(name, version)| PolicyDefinitionConfig {
            name: name.into(),
            version: version.into(),
        })
        .collect()
    }

    #[test]
    fn exact_version_wins() {
        assert_eq!(
            resolve_policy_version(&defs(), "auth", "v1.0.0"),
            Some("v1.0.0".into())
        );
    }

    #[test]
    fn major_resolves_to_newest_in_major() {
        assert_eq!(
            resolve_policy_version(&defs(), "auth", "v1"),
            Some("v1.2.0".into())
        );
        assert_eq!(
            resolve_policy_version(&defs(), "auth", "v2"),
            Some("v2.0.0".into())
        );
    }

    #[test]
    fn single_definition_major_resolution() {
        assert_eq!(
            resolve_policy_version(&defs(), "rateLimit", "v1"),
            Some("v1.0.0".into())
        );
    }

    #[test]
    fn unknown_name_or_version_resolves_to_none() {
        assert_eq!(resolve_policy_version(&defs(), "nope", "v1"), None);
        assert_eq!(resolve_policy_version(&defs(), "auth", "v3"), None);
        assert_eq!(resolve_policy_version(&defs(), "auth", "v1.9.9"), None);
    }
}
