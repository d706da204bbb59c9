//! Validation, merging and resolution of envtoml documents.
//!
//! This crate takes a [`Document`] built by `envtoml-schema` and turns it into
//! something a package solver can consume: [`validate`] collects every semantic
//! violation in one pass, [`merge`] defines the overlay rule shared by platform
//! overrides and group folding, and [`resolve`] flattens one named environment
//! (for one target platform) into a [`ResolvedEnvironment`] with a content
//! fingerprint.

pub mod identity;
pub mod merge;
pub mod resolve;
pub mod validate;

pub use identity::{compute_env_id, EnvIdentity};
pub use merge::{effective_spec, Merge};
pub use resolve::{
    resolve, resolve_default, ResolveError, ResolvedEnvironment, Resolver, DEFAULT_ENVIRONMENT,
};
pub use validate::{
    validate, ValidationError, ValidationErrorKind, ValidationErrors, ValidationReport,
    ValidationWarning, WarningKind,
};

use envtoml_schema::{parse_document_file, DocumentError, Platform};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Load, validate and resolve in one step.
///
/// `environment` of `None` resolves the document's base layer, which is how a
/// single-environment document is consumed. Validation warnings are logged
/// by [`validate`].
pub fn resolve_file(
    path: impl AsRef<Path>,
    environment: Option<&str>,
    target: Option<Platform>,
) -> Result<ResolvedEnvironment, CoreError> {
    let document = parse_document_file(path)?;
    let resolver = Resolver::new(&document)?;
    match environment {
        Some(name) => Ok(resolver.resolve(name, target)?),
        None => Ok(resolver.resolve_default(target)),
    }
}
