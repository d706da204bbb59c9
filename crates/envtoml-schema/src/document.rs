use crate::decode;
use crate::path::FieldPath;
use crate::types::{EnvName, GroupName, PackageName};
use indexmap::IndexMap;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fs;
use std::path::Path;
use thiserror::Error;
use toml::{Table, Value};

/// The only document `version` this crate understands.
pub const SUPPORTED_VERSION: i64 = 1;

const TOP_LEVEL_KEYS: &[&str] = &[
    "version",
    "about",
    "config",
    "system-requirements",
    "groups",
    "environments",
    "dependencies",
    "pypi-dependencies",
    "platform",
    "variables",
];
/// Top-level keys that only make sense for a single-environment document.
const SINGLE_ENV_KEYS: &[&str] = &["dependencies", "pypi-dependencies", "platform", "variables"];
const ABOUT_KEYS: &[&str] = &[
    "name",
    "revision",
    "description",
    "authors",
    "license",
    "license-files",
    "urls",
];
const CONFIG_KEYS: &[&str] = &["channels", "platforms", "variables"];
const GROUP_KEYS: &[&str] = &[
    "description",
    "config",
    "system-requirements",
    "dependencies",
    "pypi-dependencies",
    "platform",
    "variables",
];
const PLATFORM_OVERRIDE_KEYS: &[&str] = &[
    "description",
    "config",
    "system-requirements",
    "dependencies",
    "pypi-dependencies",
    "variables",
];
const DEPENDENCY_KEYS: &[&str] = &["version", "channel"];

/// The input does not have the shape of a document. Construction stops at the
/// first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("{path}: expected {expected}, found {found}")]
    WrongType {
        path: FieldPath,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{path}: missing required field")]
    MissingField { path: FieldPath },
    #[error("{path}: unknown field, expected one of: {allowed}")]
    UnknownField { path: FieldPath, allowed: String },
    #[error("{path}: '{name}' is declared more than once after name normalization")]
    DuplicatePackage { path: FieldPath, name: String },
    #[error("{path}: top-level group fields cannot be combined with a 'groups' table")]
    MixedLayout { path: FieldPath },
}

impl StructuralError {
    pub fn path(&self) -> &FieldPath {
        match self {
            StructuralError::WrongType { path, .. }
            | StructuralError::MissingField { path }
            | StructuralError::UnknownField { path, .. }
            | StructuralError::DuplicatePackage { path, .. }
            | StructuralError::MixedLayout { path } => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read document file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse document: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("failed to convert JSON tree: {0}")]
    ConvertJson(#[from] toml::ser::Error),
    #[error("invalid document structure: {0}")]
    Structure(#[from] StructuralError),
}

/// Descriptive metadata about the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct About {
    pub name: String,
    pub revision: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<String>,
    /// SPDX license expression; empty when unspecified.
    pub license: String,
    pub license_files: Vec<String>,
    pub urls: IndexMap<String, String>,
}

/// Channels, platforms and environment variables.
///
/// `None` for `channels`/`platforms` means "not set here", which is different
/// from an explicit empty list when layers are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Config {
    pub channels: Option<Vec<String>>,
    pub platforms: Option<Vec<String>>,
    pub variables: IndexMap<String, String>,
}

/// A dependency's version constraint, optionally pinned to a channel.
///
/// Written either as `name = ">=1.2"` or `name = { version = ">=1.2", channel = "conda-forge" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencySpec {
    pub version: String,
    pub channel: Option<String>,
}

impl DependencySpec {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            channel: None,
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

impl From<&str> for DependencySpec {
    fn from(version: &str) -> Self {
        Self::new(version)
    }
}

impl Serialize for DependencySpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.channel {
            None => serializer.serialize_str(&self.version),
            Some(channel) => {
                let mut s = serializer.serialize_struct("DependencySpec", 2)?;
                s.serialize_field("version", &self.version)?;
                s.serialize_field("channel", channel)?;
                s.end()
            }
        }
    }
}

/// The mergeable body shared by groups, their platform overrides, and the
/// document-level base layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSpec {
    pub description: Option<String>,
    pub config: Config,
    pub system_requirements: IndexMap<PackageName, String>,
    pub dependencies: IndexMap<PackageName, DependencySpec>,
    pub pypi_dependencies: IndexMap<PackageName, DependencySpec>,
}

impl GroupSpec {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A named bundle of configuration: a base body plus platform-scoped bodies of
/// the same shape. Platform keys are kept verbatim so that unknown
/// identifiers can be reported by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    pub spec: GroupSpec,
    pub platform: IndexMap<String, GroupSpec>,
}

/// A parsed environment specification document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub version: i64,
    pub about: About,
    /// Document-level `config` and `system-requirements`, plus top-level
    /// dependencies in single-environment documents. Lowest precedence layer.
    pub base: Group,
    pub groups: IndexMap<GroupName, Group>,
    pub environments: IndexMap<EnvName, Vec<GroupName>>,
}

impl Document {
    /// Build a document from a decoded tree whose root must be a table.
    pub fn from_value(value: &Value) -> Result<Self, StructuralError> {
        Self::from_table(decode::table(value, &FieldPath::root())?)
    }

    /// Build a document from a JSON tree with the same layout as the TOML form.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, DocumentError> {
        let converted = Value::try_from(value)?;
        Ok(Self::from_value(&converted)?)
    }

    pub fn from_table(table: &Table) -> Result<Self, StructuralError> {
        let root = FieldPath::root();

        let version = match table.get("version") {
            None => SUPPORTED_VERSION,
            Some(Value::Integer(v)) => *v,
            Some(other) => return Err(decode::wrong_type(other, &root.key("version"), "integer")),
        };
        if version != SUPPORTED_VERSION {
            // Field shapes depend on the version; leave the body to validation.
            return Ok(Self {
                version,
                ..Self::default()
            });
        }

        decode::known_keys(table, &root, TOP_LEVEL_KEYS)?;
        if table.contains_key("groups") {
            if let Some(key) = SINGLE_ENV_KEYS.iter().find(|k| table.contains_key(**k)) {
                return Err(StructuralError::MixedLayout {
                    path: root.key(*key),
                });
            }
        }

        let about = decode_about(decode::required(table, "about", &root)?, &root.key("about"))?;
        let base = Group {
            spec: decode_spec(table, &root)?,
            platform: decode_platforms(table, &root)?,
        };

        let mut groups = IndexMap::new();
        if let Some(value) = table.get("groups") {
            let path = root.key("groups");
            for (name, group) in decode::table(value, &path)? {
                groups.insert(GroupName::new(name), decode_group(group, &path.key(name))?);
            }
        }

        let mut environments = IndexMap::new();
        if let Some(value) = table.get("environments") {
            let path = root.key("environments");
            for (name, refs) in decode::table(value, &path)? {
                let refs = decode::string_list(refs, &path.key(name))?
                    .into_iter()
                    .map(GroupName::from)
                    .collect();
                environments.insert(EnvName::new(name), refs);
            }
        }

        Ok(Self {
            version,
            about,
            base,
            groups,
            environments,
        })
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn environment(&self, name: &str) -> Option<&[GroupName]> {
        self.environments.get(name).map(Vec::as_slice)
    }

    /// Document-level `config`.
    pub fn config(&self) -> &Config {
        &self.base.spec.config
    }

    /// Document-level `system-requirements`.
    pub fn system_requirements(&self) -> &IndexMap<PackageName, String> {
        &self.base.spec.system_requirements
    }

    /// A document with neither `groups` nor `environments`.
    pub fn is_single_environment(&self) -> bool {
        self.groups.is_empty() && self.environments.is_empty()
    }
}

fn decode_about(value: &Value, path: &FieldPath) -> Result<About, StructuralError> {
    let table = decode::table(value, path)?;
    decode::known_keys(table, path, ABOUT_KEYS)?;
    Ok(About {
        name: decode::string(decode::required(table, "name", path)?, &path.key("name"))?,
        revision: decode::optional_string(table, "revision", path)?,
        description: decode::optional_string(table, "description", path)?,
        authors: optional_list(table, "authors", path)?,
        license: decode::optional_string(table, "license", path)?.unwrap_or_default(),
        license_files: optional_list(table, "license-files", path)?,
        urls: table
            .get("urls")
            .map(|v| decode::string_map(v, &path.key("urls")))
            .transpose()?
            .unwrap_or_default(),
    })
}

fn optional_list(
    table: &Table,
    key: &str,
    path: &FieldPath,
) -> Result<Vec<String>, StructuralError> {
    Ok(table
        .get(key)
        .map(|v| decode::string_list(v, &path.key(key)))
        .transpose()?
        .unwrap_or_default())
}

fn decode_config(value: &Value, path: &FieldPath) -> Result<Config, StructuralError> {
    let table = decode::table(value, path)?;
    decode::known_keys(table, path, CONFIG_KEYS)?;
    Ok(Config {
        channels: table
            .get("channels")
            .map(|v| decode::string_list(v, &path.key("channels")))
            .transpose()?,
        platforms: table
            .get("platforms")
            .map(|v| decode::string_list(v, &path.key("platforms")))
            .transpose()?,
        variables: table
            .get("variables")
            .map(|v| decode::string_map(v, &path.key("variables")))
            .transpose()?
            .unwrap_or_default(),
    })
}

fn decode_group(value: &Value, path: &FieldPath) -> Result<Group, StructuralError> {
    let table = decode::table(value, path)?;
    decode::known_keys(table, path, GROUP_KEYS)?;
    Ok(Group {
        spec: decode_spec(table, path)?,
        platform: decode_platforms(table, path)?,
    })
}

fn decode_platforms(
    table: &Table,
    path: &FieldPath,
) -> Result<IndexMap<String, GroupSpec>, StructuralError> {
    let mut platforms = IndexMap::new();
    if let Some(value) = table.get("platform") {
        let path = path.key("platform");
        for (platform, body) in decode::table(value, &path)? {
            let body_path = path.key(platform);
            let body_table = decode::table(body, &body_path)?;
            decode::known_keys(body_table, &body_path, PLATFORM_OVERRIDE_KEYS)?;
            platforms.insert(platform.clone(), decode_spec(body_table, &body_path)?);
        }
    }
    Ok(platforms)
}

/// Read the group-shaped fields of `table`. Callers check the key set.
fn decode_spec(table: &Table, path: &FieldPath) -> Result<GroupSpec, StructuralError> {
    let mut config = table
        .get("config")
        .map(|v| decode_config(v, &path.key("config")))
        .transpose()?
        .unwrap_or_default();
    if let Some(value) = table.get("variables") {
        // Group-level variables overlay the ones under `config`.
        config
            .variables
            .extend(decode::string_map(value, &path.key("variables"))?);
    }

    Ok(GroupSpec {
        description: decode::optional_string(table, "description", path)?,
        config,
        system_requirements: decode_requirements(table, "system-requirements", path)?,
        dependencies: decode_dependencies(table, "dependencies", path, PackageName::conda)?,
        pypi_dependencies: decode_dependencies(
            table,
            "pypi-dependencies",
            path,
            PackageName::pypi,
        )?,
    })
}

fn decode_requirements(
    table: &Table,
    key: &str,
    path: &FieldPath,
) -> Result<IndexMap<PackageName, String>, StructuralError> {
    let mut out = IndexMap::new();
    if let Some(value) = table.get(key) {
        let path = path.key(key);
        for (raw, version) in decode::table(value, &path)? {
            let entry_path = path.key(raw);
            let name = PackageName::conda(raw);
            let version = decode::string(version, &entry_path)?;
            insert_unique(&mut out, name, version, entry_path)?;
        }
    }
    Ok(out)
}

fn decode_dependencies(
    table: &Table,
    key: &str,
    path: &FieldPath,
    normalize: fn(&str) -> PackageName,
) -> Result<IndexMap<PackageName, DependencySpec>, StructuralError> {
    let mut out = IndexMap::new();
    if let Some(value) = table.get(key) {
        let path = path.key(key);
        for (raw, spec) in decode::table(value, &path)? {
            let entry_path = path.key(raw);
            let spec = decode_dependency(spec, &entry_path)?;
            insert_unique(&mut out, normalize(raw), spec, entry_path)?;
        }
    }
    Ok(out)
}

fn decode_dependency(value: &Value, path: &FieldPath) -> Result<DependencySpec, StructuralError> {
    match value {
        Value::String(version) => Ok(DependencySpec::new(version.clone())),
        Value::Table(table) => {
            decode::known_keys(table, path, DEPENDENCY_KEYS)?;
            Ok(DependencySpec {
                version: decode::string(
                    decode::required(table, "version", path)?,
                    &path.key("version"),
                )?,
                channel: decode::optional_string(table, "channel", path)?,
            })
        }
        other => Err(decode::wrong_type(other, path, "string or table")),
    }
}

fn insert_unique<V>(
    map: &mut IndexMap<PackageName, V>,
    name: PackageName,
    value: V,
    path: FieldPath,
) -> Result<(), StructuralError> {
    if map.contains_key(&name) {
        return Err(StructuralError::DuplicatePackage {
            path,
            name: name.into_inner(),
        });
    }
    map.insert(name, value);
    Ok(())
}

/// Decode TOML text and build a document from it.
pub fn parse_document_str(input: &str) -> Result<Document, DocumentError> {
    let table: Table = toml::from_str(input)?;
    Ok(Document::from_table(&table)?)
}

pub fn parse_document_file(path: impl AsRef<Path>) -> Result<Document, DocumentError> {
    let content = fs::read_to_string(path)?;
    parse_document_str(&content)
}

/// Whether `path` looks like a document this crate can load: an existing
/// `.toml` file.
pub fn can_handle(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}
