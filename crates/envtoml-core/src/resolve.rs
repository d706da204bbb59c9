//! Environment resolution: folding an environment's groups, in declaration
//! order, onto the document's base layer for one target platform.

use crate::identity::{compute_env_id, EnvIdentity};
use crate::merge::{effective_spec, Merge};
use crate::validate::{validate, ValidationErrors, ValidationReport, ValidationWarning};
use envtoml_schema::{
    DependencySpec, Document, EnvName, FieldPath, GroupSpec, PackageName, Platform,
};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Name given to the environment produced by [`resolve_default`].
pub const DEFAULT_ENVIRONMENT: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("{path}: unknown environment '{name}' (available: {})", available.join(", "))]
    UnknownEnvironment {
        path: FieldPath,
        name: String,
        available: Vec<String>,
    },
    #[error("{path}: environment '{environment}' references unknown group '{group}'")]
    UnknownGroup {
        path: FieldPath,
        environment: String,
        group: String,
    },
}

/// The flattened definition of one environment, ready for a solver.
///
/// Holds no reference to the [`Document`] it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolvedEnvironment {
    pub name: EnvName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub channels: Vec<String>,
    pub platforms: Vec<String>,
    pub variables: IndexMap<String, String>,
    pub system_requirements: IndexMap<PackageName, String>,
    pub dependencies: IndexMap<PackageName, DependencySpec>,
    pub pypi_dependencies: IndexMap<PackageName, DependencySpec>,
}

impl ResolvedEnvironment {
    fn from_spec(name: EnvName, target_platform: Option<Platform>, spec: GroupSpec) -> Self {
        Self {
            name,
            target_platform,
            description: spec.description,
            channels: spec.config.channels.unwrap_or_default(),
            platforms: spec.config.platforms.unwrap_or_default(),
            variables: spec.config.variables,
            system_requirements: spec.system_requirements,
            dependencies: spec.dependencies,
            pypi_dependencies: spec.pypi_dependencies,
        }
    }

    /// True when nothing at all was contributed by any layer.
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.channels.is_empty()
            && self.platforms.is_empty()
            && self.variables.is_empty()
            && self.system_requirements.is_empty()
            && self.dependencies.is_empty()
            && self.pypi_dependencies.is_empty()
    }

    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Content fingerprint; see [`compute_env_id`].
    pub fn fingerprint(&self) -> EnvIdentity {
        compute_env_id(self)
    }
}

/// Effective base layer of the document for `target`.
fn base_layer(document: &Document, target: Option<Platform>) -> GroupSpec {
    effective_spec(&document.base, target)
}

/// Fold the groups of environment `environment`, in declaration order, onto the
/// document's base layer.
///
/// Assumes `document` passed [`validate`]; referential failures are still
/// reported rather than ignored.
pub fn resolve(
    document: &Document,
    environment: &str,
    target: Option<Platform>,
) -> Result<ResolvedEnvironment, ResolveError> {
    let env_path = FieldPath::from_keys(["environments", environment]);
    let (name, refs) = document
        .environments
        .get_key_value(environment)
        .ok_or_else(|| ResolveError::UnknownEnvironment {
            path: env_path.clone(),
            name: environment.to_owned(),
            available: document.environments.keys().map(ToString::to_string).collect(),
        })?;

    info!(
        "resolving environment '{name}' for {}",
        target.map_or_else(|| "all platforms".to_owned(), |p| p.to_string())
    );

    let mut acc = base_layer(document, target);
    for (i, group_name) in refs.iter().enumerate() {
        let group =
            document
                .group(group_name.as_str())
                .ok_or_else(|| ResolveError::UnknownGroup {
                    path: env_path.index(i),
                    environment: name.to_string(),
                    group: group_name.to_string(),
                })?;
        debug!("folding group '{group_name}' into '{name}'");
        acc.merge(&effective_spec(group, target));
    }

    Ok(ResolvedEnvironment::from_spec(name.clone(), target, acc))
}

/// Resolve the base layer alone; this is the environment a single-environment
/// document describes.
pub fn resolve_default(document: &Document, target: Option<Platform>) -> ResolvedEnvironment {
    info!(
        "resolving base layer of '{}' for {}",
        document.about.name,
        target.map_or_else(|| "all platforms".to_owned(), |p| p.to_string())
    );
    ResolvedEnvironment::from_spec(
        EnvName::new(DEFAULT_ENVIRONMENT),
        target,
        base_layer(document, target),
    )
}

/// A validated document, ready to resolve any number of environments.
///
/// Resolution never mutates the document, so one `Resolver` can be shared
/// across threads.
#[derive(Debug, Clone)]
pub struct Resolver<'d> {
    document: &'d Document,
    report: ValidationReport,
}

impl<'d> Resolver<'d> {
    /// Validate `document` once; resolution is refused for invalid documents.
    pub fn new(document: &'d Document) -> Result<Self, ValidationErrors> {
        let report = validate(document)?;
        Ok(Self { document, report })
    }

    pub fn document(&self) -> &'d Document {
        self.document
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.report.warnings
    }

    /// Environment names in declaration order.
    pub fn environment_names(&self) -> impl Iterator<Item = &'d EnvName> + 'd {
        self.document.environments.keys()
    }

    pub fn resolve(
        &self,
        environment: &str,
        target: Option<Platform>,
    ) -> Result<ResolvedEnvironment, ResolveError> {
        resolve(self.document, environment, target)
    }

    pub fn resolve_default(&self, target: Option<Platform>) -> ResolvedEnvironment {
        resolve_default(self.document, target)
    }

    /// Resolve every declared environment, keyed by name in declaration order.
    pub fn resolve_all(
        &self,
        target: Option<Platform>,
    ) -> Result<IndexMap<EnvName, ResolvedEnvironment>, ResolveError> {
        self.environment_names()
            .map(|name| {
                self.resolve(name.as_str(), target)
                    .map(|env| (name.clone(), env))
            })
            .collect()
    }
}
