//! The overlay rule shared by platform overrides and group folding.
//!
//! - scalars (`description`): an override that is present replaces the base.
//! - sequences (`channels`, `platforms`): an override that is present replaces
//!   the whole base sequence, with no union.
//! - mappings (dependencies, pypi-dependencies, variables, system-requirements):
//!   the override is laid over the base key by key and wins on conflicts.

use envtoml_schema::{Config, Group, GroupSpec, Platform};
use indexmap::IndexMap;
use std::hash::Hash;

/// A value that can absorb a higher-precedence value of the same shape.
pub trait Merge {
    /// Fold `other` onto `self`; `other` has precedence.
    fn merge(&mut self, other: &Self);
}

/// Covers both scalar and sequence fields: whatever is set replaces what was there.
impl<T: Clone> Merge for Option<T> {
    fn merge(&mut self, other: &Self) {
        if let Some(value) = other {
            *self = Some(value.clone());
        }
    }
}

/// Existing keys keep their position so output order follows first declaration.
impl<K, V> Merge for IndexMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn merge(&mut self, other: &Self) {
        for (key, value) in other {
            self.insert(key.clone(), value.clone());
        }
    }
}

impl Merge for Config {
    fn merge(&mut self, other: &Self) {
        self.channels.merge(&other.channels);
        self.platforms.merge(&other.platforms);
        self.variables.merge(&other.variables);
    }
}

impl Merge for GroupSpec {
    fn merge(&mut self, other: &Self) {
        self.description.merge(&other.description);
        self.config.merge(&other.config);
        self.system_requirements.merge(&other.system_requirements);
        self.dependencies.merge(&other.dependencies);
        self.pypi_dependencies.merge(&other.pypi_dependencies);
    }
}

/// The effective body of `group` for `target`: its base body with the matching
/// `platform.<target>` section folded on. With no target, platform sections
/// are ignored.
pub fn effective_spec(group: &Group, target: Option<Platform>) -> GroupSpec {
    let mut spec = group.spec.clone();
    if let Some(overlay) = target.and_then(|t| group.platform.get(t.as_str())) {
        spec.merge(overlay);
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use envtoml_schema::{DependencySpec, PackageName};

    fn deps(entries: &[(&str, &str)]) -> IndexMap<PackageName, DependencySpec> {
        entries
            .iter()
            .map(|(name, version)| (PackageName::conda(name), DependencySpec::new(*version)))
            .collect()
    }

    fn strings(items: &[&str]) -> Option<Vec<String>> {
        Some(items.iter().map(|s| (*s).to_owned()).collect())
    }

    #[test]
    fn scalar_override_replaces_only_when_present() {
        let mut base = Some("base".to_owned());
        base.merge(&None);
        assert_eq!(base.as_deref(), Some("base"));
        base.merge(&Some("override".to_owned()));
        assert_eq!(base.as_deref(), Some("override"));
    }

    #[test]
    fn sequences_are_replaced_not_unioned() {
        let mut base = Config {
            platforms: strings(&["linux-64", "osx-64"]),
            channels: strings(&["conda-forge", "bioconda"]),
            ..Config::default()
        };
        base.merge(&Config {
            platforms: strings(&["linux-64"]),
            ..Config::default()
        });
        assert_eq!(base.platforms, strings(&["linux-64"]));
        assert_eq!(base.channels, strings(&["conda-forge", "bioconda"]));
    }

    #[test]
    fn explicit_empty_sequence_still_replaces() {
        let mut base = Config {
            channels: strings(&["conda-forge"]),
            ..Config::default()
        };
        base.merge(&Config {
            channels: Some(Vec::new()),
            ..Config::default()
        });
        assert_eq!(base.channels, Some(Vec::new()));
    }

    #[test]
    fn maps_overlay_key_by_key() {
        let mut base = deps(&[("python", ">=3.9"), ("numpy", "*")]);
        base.merge(&deps(&[("python", ">=3.11"), ("scipy", "*")]));
        assert_eq!(base["python"].version, ">=3.11");
        assert_eq!(base["numpy"].version, "*");
        assert_eq!(base["scipy"].version, "*");
        let order: Vec<&str> = base.keys().map(PackageName::as_str).collect();
        assert_eq!(order, vec!["python", "numpy", "scipy"]);
    }

    #[test]
    fn effective_spec_applies_only_matching_platform() {
        let mut group = Group::default();
        group.spec.dependencies = deps(&[("python", "*")]);
        group.platform.insert(
            "win-64".to_owned(),
            GroupSpec {
                dependencies: deps(&[("pywin32", "*")]),
                ..GroupSpec::default()
            },
        );

        let win = effective_spec(&group, Some(Platform::Win64));
        assert!(win.dependencies.contains_key("pywin32"));
        assert!(win.dependencies.contains_key("python"));

        let linux = effective_spec(&group, Some(Platform::Linux64));
        assert!(!linux.dependencies.contains_key("pywin32"));

        let unfiltered = effective_spec(&group, None);
        assert_eq!(unfiltered, group.spec);
    }
}
