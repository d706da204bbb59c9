//! Semantic validation of a constructed [`Document`].
//!
//! Validation is soft: every independent violation is collected so a user sees
//! the full problem set in one pass. The only exception is an unsupported
//! `version`, which is reported alone because every other rule depends on it.

use envtoml_schema::{
    check_license_expression, check_license_file, check_url, ConstraintParseError,
    DependencySpec, Document, FieldPath, GroupSpec, MetadataError, PackageName, Platform,
    VersionConstraint, SUPPORTED_VERSION,
};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    #[error("unsupported document version {found}, expected {expected}")]
    UnsupportedVersion { found: i64, expected: i64 },
    #[error("must not be empty")]
    Empty,
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),
    #[error("platform '{0}' is listed more than once")]
    DuplicatePlatform(String),
    #[error("environment references undefined group '{0}'")]
    UndefinedGroup(String),
    #[error("group '{0}' is listed more than once")]
    DuplicateGroupReference(String),
    #[error("groups are declared but no environment is defined")]
    NoEnvironments,
    #[error(transparent)]
    Constraint(#[from] ConstraintParseError),
}

/// A semantic rule violated at `path`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {kind}")]
pub struct ValidationError {
    pub path: FieldPath,
    pub kind: ValidationErrorKind,
}

/// All violations found in one validation pass, in document order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn as_slice(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a value returned by [`validate`].
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }

    /// Whether validation stopped at an unsupported `version`.
    pub fn is_version_mismatch(&self) -> bool {
        matches!(
            self.0.as_slice(),
            [ValidationError {
                kind: ValidationErrorKind::UnsupportedVersion { .. },
                ..
            }]
        )
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.0.len() == 1 { "error" } else { "errors" };
        write!(f, "document has {} validation {noun}:", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarningKind {
    #[error("group '{0}' is not used by any environment")]
    UnusedGroup(String),
    #[error("platform override '{0}' targets a platform not declared in config.platforms")]
    UndeclaredPlatformOverride(String),
}

/// A suspicious but legal construct.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {kind}")]
pub struct ValidationWarning {
    pub path: FieldPath,
    pub kind: WarningKind,
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub warnings: Vec<ValidationWarning>,
}

/// Check every semantic rule of `document`.
pub fn validate(document: &Document) -> Result<ValidationReport, ValidationErrors> {
    debug!("validating document '{}'", document.about.name);

    if document.version != SUPPORTED_VERSION {
        return Err(ValidationErrors(vec![ValidationError {
            path: FieldPath::from_keys(["version"]),
            kind: ValidationErrorKind::UnsupportedVersion {
                found: document.version,
                expected: SUPPORTED_VERSION,
            },
        }]));
    }

    let mut checker = Checker::default();
    checker.check_about(document);

    let root = FieldPath::root();
    let document_platforms = declared_platforms(&document.base.spec);
    checker.check_spec(&document.base.spec, &root);
    checker.check_platform_overrides(
        &document.base.platform,
        &root,
        &[document_platforms.as_ref()],
    );

    let groups_path = root.key("groups");
    for (name, group) in &document.groups {
        let path = groups_path.key(name.as_str());
        checker.check_spec(&group.spec, &path);
        let group_platforms = declared_platforms(&group.spec);
        checker.check_platform_overrides(
            &group.platform,
            &path,
            &[group_platforms.as_ref(), document_platforms.as_ref()],
        );
    }

    checker.check_environments(document);

    for warning in &checker.warnings {
        warn!("{warning}");
    }

    if checker.errors.is_empty() {
        debug!(
            "document '{}' is valid ({} warnings)",
            document.about.name,
            checker.warnings.len()
        );
        Ok(ValidationReport {
            warnings: checker.warnings,
        })
    } else {
        debug!(
            "document '{}' has {} validation errors",
            document.about.name,
            checker.errors.len()
        );
        Err(ValidationErrors(checker.errors))
    }
}

fn declared_platforms(spec: &GroupSpec) -> Option<HashSet<&str>> {
    spec.config
        .platforms
        .as_ref()
        .map(|platforms| platforms.iter().map(String::as_str).collect())
}

#[derive(Default)]
struct Checker {
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationWarning>,
}

impl Checker {
    fn error(&mut self, path: FieldPath, kind: impl Into<ValidationErrorKind>) {
        self.errors.push(ValidationError {
            path,
            kind: kind.into(),
        });
    }

    fn warning(&mut self, path: FieldPath, kind: WarningKind) {
        self.warnings.push(ValidationWarning { path, kind });
    }

    fn check_about(&mut self, document: &Document) {
        let about = &document.about;
        let path = FieldPath::from_keys(["about"]);

        if about.name.trim().is_empty() {
            self.error(path.key("name"), ValidationErrorKind::Empty);
        }
        if let Err(e) = check_license_expression(&about.license) {
            self.error(path.key("license"), e);
        }
        for (i, file) in about.license_files.iter().enumerate() {
            if let Err(e) = check_license_file(file) {
                self.error(path.key("license-files").index(i), e);
            }
        }
        for (key, url) in &about.urls {
            if let Err(e) = check_url(url) {
                self.error(path.key("urls").key(key), e);
            }
        }
    }

    fn check_spec(&mut self, spec: &GroupSpec, path: &FieldPath) {
        let config_path = path.key("config");

        if let Some(platforms) = &spec.config.platforms {
            let mut seen = HashSet::new();
            for (i, platform) in platforms.iter().enumerate() {
                let entry = config_path.key("platforms").index(i);
                if !Platform::is_known(platform) {
                    self.error(entry, ValidationErrorKind::UnknownPlatform(platform.clone()));
                } else if !seen.insert(platform.as_str()) {
                    self.error(entry, ValidationErrorKind::DuplicatePlatform(platform.clone()));
                }
            }
        }
        if let Some(channels) = &spec.config.channels {
            for (i, channel) in channels.iter().enumerate() {
                if channel.trim().is_empty() {
                    self.error(
                        config_path.key("channels").index(i),
                        ValidationErrorKind::Empty,
                    );
                }
            }
        }

        let requirements_path = path.key("system-requirements");
        for (name, version) in &spec.system_requirements {
            let entry = requirements_path.key(name.as_str());
            if name.is_empty() {
                self.error(entry.clone(), ValidationErrorKind::Empty);
            }
            if let Err(e) = VersionConstraint::parse(version) {
                self.error(entry, e);
            }
        }

        self.check_dependencies(&spec.dependencies, &path.key("dependencies"));
        self.check_dependencies(&spec.pypi_dependencies, &path.key("pypi-dependencies"));
    }

    fn check_dependencies(
        &mut self,
        dependencies: &IndexMap<PackageName, DependencySpec>,
        path: &FieldPath,
    ) {
        for (name, spec) in dependencies {
            let entry = path.key(name.as_str());
            if name.is_empty() {
                self.error(entry.clone(), ValidationErrorKind::Empty);
            }
            let version_path = if spec.channel.is_some() {
                entry.key("version")
            } else {
                entry.clone()
            };
            if let Err(e) = VersionConstraint::parse(&spec.version) {
                self.error(version_path, e);
            }
            if spec.channel.as_deref().is_some_and(|c| c.trim().is_empty()) {
                self.error(entry.key("channel"), ValidationErrorKind::Empty);
            }
        }
    }

    /// `declared` holds the `config.platforms` lists in scope, innermost first;
    /// `None` entries were not declared at that level.
    fn check_platform_overrides(
        &mut self,
        overrides: &IndexMap<String, GroupSpec>,
        path: &FieldPath,
        declared: &[Option<&HashSet<&str>>],
    ) {
        let platform_path = path.key("platform");
        let any_declared = declared.iter().any(Option::is_some);
        for (platform, body) in overrides {
            let entry = platform_path.key(platform);
            if !Platform::is_known(platform) {
                self.error(
                    entry.clone(),
                    ValidationErrorKind::UnknownPlatform(platform.clone()),
                );
            } else if any_declared
                && !declared
                    .iter()
                    .flatten()
                    .any(|set| set.contains(platform.as_str()))
            {
                self.warning(
                    entry.clone(),
                    WarningKind::UndeclaredPlatformOverride(platform.clone()),
                );
            }
            self.check_spec(body, &entry);
        }
    }

    fn check_environments(&mut self, document: &Document) {
        let path = FieldPath::from_keys(["environments"]);

        if !document.groups.is_empty() && document.environments.is_empty() {
            self.error(path.clone(), ValidationErrorKind::NoEnvironments);
        }

        let mut used = IndexSet::new();
        for (env, refs) in &document.environments {
            let env_path = path.key(env.as_str());
            let mut seen = HashSet::new();
            for (i, group) in refs.iter().enumerate() {
                if !document.groups.contains_key(group.as_str()) {
                    self.error(
                        env_path.index(i),
                        ValidationErrorKind::UndefinedGroup(group.to_string()),
                    );
                } else if !seen.insert(group.as_str()) {
                    self.error(
                        env_path.index(i),
                        ValidationErrorKind::DuplicateGroupReference(group.to_string()),
                    );
                }
                used.insert(group.as_str());
            }
        }

        if !document.environments.is_empty() {
            for name in document.groups.keys() {
                if !used.contains(name.as_str()) {
                    self.warning(
                        FieldPath::from_keys(["groups", name.as_str()]),
                        WarningKind::UnusedGroup(name.to_string()),
                    );
                }
            }
        }
    }
}
