//! Document model for envtoml environment specifications.
//!
//! This crate defines the schema layer: construction of a typed [`Document`]
//! from an already-decoded key/value tree (TOML or JSON), dotted [`FieldPath`]s
//! for diagnostics, the closed [`Platform`] set, package-name normalization,
//! the version-constraint language ([`VersionConstraint`]) and the metadata
//! checks (SPDX licenses, license files, URLs) used by validation.

mod decode;
pub mod document;
pub mod metadata;
pub mod path;
pub mod platform;
pub mod types;
pub mod version;

pub use document::{
    can_handle, parse_document_file, parse_document_str, About, Config, DependencySpec,
    Document, DocumentError, Group, GroupSpec, StructuralError, SUPPORTED_VERSION,
};
pub use metadata::{check_license_expression, check_license_file, check_url, MetadataError};
pub use path::FieldPath;
pub use platform::{Platform, UnknownPlatform};
pub use types::{EnvId, EnvName, GroupName, PackageName, ShortId};
pub use version::{CompareOp, ConstraintParseError, Term, Version, VersionConstraint};
