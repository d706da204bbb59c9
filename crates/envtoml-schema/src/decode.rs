//! Shape checks over a decoded `toml::Value` tree. Every helper fails with the
//! path of the offending value.

use crate::document::StructuralError;
use crate::path::FieldPath;
use indexmap::IndexMap;
use toml::{Table, Value};

pub(crate) fn table<'v>(value: &'v Value, path: &FieldPath) -> Result<&'v Table, StructuralError> {
    value.as_table().ok_or_else(|| wrong_type(value, path, "table"))
}

pub(crate) fn string(value: &Value, path: &FieldPath) -> Result<String, StructuralError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| wrong_type(value, path, "string"))
}

pub(crate) fn string_list(value: &Value, path: &FieldPath) -> Result<Vec<String>, StructuralError> {
    let items = value
        .as_array()
        .ok_or_else(|| wrong_type(value, path, "array of strings"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| string(item, &path.index(i)))
        .collect()
}

pub(crate) fn string_map(
    value: &Value,
    path: &FieldPath,
) -> Result<IndexMap<String, String>, StructuralError> {
    let entries = table(value, path)?;
    entries
        .iter()
        .map(|(key, item)| Ok((key.clone(), string(item, &path.key(key))?)))
        .collect()
}

pub(crate) fn required<'t>(
    table: &'t Table,
    key: &str,
    path: &FieldPath,
) -> Result<&'t Value, StructuralError> {
    table.get(key).ok_or_else(|| StructuralError::MissingField {
        path: path.key(key),
    })
}

pub(crate) fn optional_string(
    table: &Table,
    key: &str,
    path: &FieldPath,
) -> Result<Option<String>, StructuralError> {
    table.get(key).map(|v| string(v, &path.key(key))).transpose()
}

/// Reject keys outside `allowed`: the schema is closed so typos surface early.
pub(crate) fn known_keys(
    table: &Table,
    path: &FieldPath,
    allowed: &[&str],
) -> Result<(), StructuralError> {
    match table.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(StructuralError::UnknownField {
            path: path.key(key),
            allowed: allowed.join(", "),
        }),
        None => Ok(()),
    }
}

pub(crate) fn wrong_type(value: &Value, path: &FieldPath, expected: &'static str) -> StructuralError {
    StructuralError::WrongType {
        path: path.clone(),
        expected,
        found: value.type_str(),
    }
}
