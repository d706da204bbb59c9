//! Content fingerprint of a resolved environment, usable as a solver cache key.

use crate::resolve::ResolvedEnvironment;
use envtoml_schema::{DependencySpec, EnvId, PackageName, ShortId};
use indexmap::IndexMap;
use serde::Serialize;

/// Deterministic identity for a resolved environment, derived from its content.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EnvIdentity {
    pub env_id: EnvId,
    pub short_id: ShortId,
}

fn sorted<'a, K: AsRef<str>, V>(map: &'a IndexMap<K, V>) -> Vec<(&'a str, &'a V)> {
    let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.as_ref(), v)).collect();
    entries.sort_unstable_by_key(|(k, _)| *k);
    entries
}

/// Feed one tagged record; every part is length-prefixed so no choice of
/// key or value can shift bytes across a boundary.
fn record(hasher: &mut blake3::Hasher, tag: &str, parts: &[&str]) {
    hasher.update(tag.as_bytes());
    hasher.update(&(parts.len() as u64).to_le_bytes());
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
}

fn hash_dependencies(
    hasher: &mut blake3::Hasher,
    tag: &str,
    deps: &IndexMap<PackageName, DependencySpec>,
) {
    for (name, spec) in sorted(deps) {
        match &spec.channel {
            Some(channel) => record(
                hasher,
                tag,
                &[name, spec.version.as_str(), channel.as_str()],
            ),
            None => record(hasher, tag, &[name, spec.version.as_str()]),
        }
    }
}

/// Hash the solver-relevant content of `env`.
///
/// Channel order is significant (it is a priority list); every other
/// collection is hashed sorted so declaration order does not matter. The
/// environment name and description are not part of the identity.
pub fn compute_env_id(env: &ResolvedEnvironment) -> EnvIdentity {
    let mut hasher = blake3::Hasher::new();

    if let Some(target) = env.target_platform {
        record(&mut hasher, "target", &[target.as_str()]);
    }
    for channel in &env.channels {
        record(&mut hasher, "channel", &[channel.as_str()]);
    }

    let mut platforms: Vec<&str> = env.platforms.iter().map(String::as_str).collect();
    platforms.sort_unstable();
    for platform in platforms {
        record(&mut hasher, "platform", &[platform]);
    }

    for (key, value) in sorted(&env.variables) {
        record(&mut hasher, "var", &[key, value.as_str()]);
    }
    for (name, version) in sorted(&env.system_requirements) {
        record(&mut hasher, "sys", &[name, version.as_str()]);
    }
    hash_dependencies(&mut hasher, "dep", &env.dependencies);
    hash_dependencies(&mut hasher, "pypi", &env.pypi_dependencies);

    let hex = hasher.finalize().to_hex().to_string();
    let short = hex[..12].to_owned();

    EnvIdentity {
        env_id: EnvId::new(hex),
        short_id: ShortId::new(short),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use envtoml_schema::{parse_document_str, Platform};

    fn fingerprint(input: &str, env: &str) -> EnvIdentity {
        let doc = parse_document_str(input).unwrap();
        resolve(&doc, env, Some(Platform::Linux64))
            .unwrap()
            .fingerprint()
    }

    #[test]
    fn stable_id_for_reordered_documents() {
        let a = fingerprint(
            r#"
[about]
name = "a"
[groups.run.dependencies]
python = "3.12.*"
numpy = "*"
[environments]
run = ["run"]
"#,
            "run",
        );
        let b = fingerprint(
            r#"
[about]
name = "b"
[groups.run.dependencies]
numpy = "*"
python = "3.12.*"
[environments]
run = ["run"]
"#,
            "run",
        );
        assert_eq!(a, b);
    }

    #[test]
    fn environment_name_does_not_matter() {
        let doc = r#"
[about]
name = "names"
[groups.run]
description = "same content"
dependencies = { python = "*" }
[environments]
first = ["run"]
second = ["run"]
"#;
        assert_eq!(fingerprint(doc, "first"), fingerprint(doc, "second"));
    }

    #[test]
    fn different_content_produces_different_ids() {
        let doc = r#"
[about]
name = "diff"
[groups.a.dependencies]
python = "3.11.*"
[groups.b.dependencies]
python = "3.12.*"
[environments]
a = ["a"]
b = ["b"]
"#;
        assert_ne!(fingerprint(doc, "a"), fingerprint(doc, "b"));
    }

    #[test]
    fn channel_order_matters() {
        let doc = r#"
[about]
name = "channels"
[groups.a.config]
channels = ["conda-forge", "bioconda"]
[groups.b.config]
channels = ["bioconda", "conda-forge"]
[environments]
a = ["a"]
b = ["b"]
"#;
        assert_ne!(fingerprint(doc, "a"), fingerprint(doc, "b"));
    }

    #[test]
    fn short_id_is_prefix_of_env_id() {
        let id = fingerprint(
            r#"
[about]
name = "short"
[groups.run]
[environments]
run = ["run"]
"#,
            "run",
        );
        assert_eq!(id.env_id.len(), 64);
        assert_eq!(id.short_id.len(), 12);
        assert!(id.env_id.starts_with(id.short_id.as_str()));
    }

    #[test]
    fn separators_inside_keys_and_values_do_not_collide() {
        let doc = r#"
[about]
name = "separators"
[groups.a.variables]
"A=B" = "C"
[groups.b.variables]
A = "B=C"
[groups.c.dependencies]
foo = { version = "1", channel = "x" }
[groups.d.dependencies]
foo = "1@x"
[environments]
a = ["a"]
b = ["b"]
c = ["c"]
d = ["d"]
"#;
        assert_ne!(fingerprint(doc, "a"), fingerprint(doc, "b"));
        assert_ne!(fingerprint(doc, "c"), fingerprint(doc, "d"));
    }
}
