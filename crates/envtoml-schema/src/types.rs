//! Newtype wrappers for names and identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings and can be looked up in
//! maps by `&str`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string, verbatim.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Name of a dependency group, as written under `groups.*`.
    GroupName
);

string_newtype!(
    /// Name of an environment, as written under `environments.*`.
    EnvName
);

string_newtype!(
    /// A normalized package name. Construct through [`PackageName::conda`] or
    /// [`PackageName::pypi`] so that equivalent spellings compare equal.
    PackageName
);

string_newtype!(
    /// Full 64-character hex fingerprint of a resolved environment.
    EnvId
);

string_newtype!(
    /// Truncated 12-character prefix of an [`EnvId`], used for display.
    ShortId
);

impl PackageName {
    /// Normalize a primary (conda) package name: trimmed and lower-cased.
    pub fn conda(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    /// Normalize a PyPI project name following PEP 503: lower-cased, with every
    /// run of `-`, `_` and `.` collapsed into a single `-`.
    pub fn pypi(raw: &str) -> Self {
        let mut out = String::with_capacity(raw.len());
        let mut in_separator = false;
        for c in raw.trim().chars() {
            if matches!(c, '-' | '_' | '.') {
                if !in_separator {
                    out.push('-');
                }
                in_separator = true;
            } else {
                out.extend(c.to_lowercase());
                in_separator = false;
            }
        }
        Self(out)
    }
}
