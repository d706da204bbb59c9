//! Checks for `about` metadata: SPDX license expressions, license file paths
//! and project URLs.

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("invalid SPDX license expression '{expression}': {reason}")]
    InvalidLicense { expression: String, reason: String },
    #[error("license file must not be empty")]
    EmptyLicenseFile,
    #[error("license file '{0}' must be a relative path")]
    AbsoluteLicenseFile(String),
    #[error("license file '{0}' must not escape the project directory")]
    EscapingLicenseFile(String),
    #[error("invalid URL '{0}', expected an absolute http(s) URL")]
    InvalidUrl(String),
}

/// Accept an empty license or a syntactically valid SPDX expression
/// (`MIT`, `Apache-2.0 OR MIT`, `GPL-2.0-only WITH Classpath-exception-2.0`).
pub fn check_license_expression(expression: &str) -> Result<(), MetadataError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    spdx::Expression::parse(trimmed)
        .map(|_| ())
        .map_err(|e| MetadataError::InvalidLicense {
            expression: expression.to_owned(),
            reason: e.to_string(),
        })
}

/// License files are relative to the document and may not climb out of it.
pub fn check_license_file(path: &str) -> Result<(), MetadataError> {
    let normalized = path.trim().replace('\\', "/");
    if normalized.is_empty() {
        return Err(MetadataError::EmptyLicenseFile);
    }
    if normalized.starts_with('/') || has_drive_prefix(&normalized) {
        return Err(MetadataError::AbsoluteLicenseFile(path.to_owned()));
    }
    if normalized.split('/').any(|component| component == "..") {
        return Err(MetadataError::EscapingLicenseFile(path.to_owned()));
    }
    Ok(())
}

fn has_drive_prefix(path: &str) -> bool {
    let mut chars = path.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

/// Project URLs must be absolute `http`/`https` URLs with a host.
pub fn check_url(raw: &str) -> Result<(), MetadataError> {
    let invalid = || MetadataError::InvalidUrl(raw.to_owned());
    let parsed = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}
