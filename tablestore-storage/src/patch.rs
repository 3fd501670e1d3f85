//! Patch translation.
//!
//! Reduces a JSON Patch (RFC 6902) or JSON Merge Patch (RFC 7396) document
//! to an [`UpdateMap`]: one [`ColumnUpdate`] per top-level key. Translation
//! is all-or-nothing; any malformed operation fails the whole document
//! before SQL is built.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised while translating a patch document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("invalid patch document: {0}")]
    InvalidDocument(String),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("unsupported patch operation {0:?}")]
    UnsupportedOperation(String),

    #[error("operation {op:?} on {path:?} requires a value")]
    MissingValue { op: String, path: String },
}

/// One JSON Patch operation as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatchOperation {
    pub op: String,
    pub path: String,
    /// `Some(Value::Null)` for an explicit `null`, `None` when absent.
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Splits an RFC 6901 pointer into unescaped segments.
///
/// The whole-document pointer `""` is rejected; every patch must name at
/// least a top-level key.
pub fn split_pointer(pointer: &str) -> Result<Vec<String>, PatchError> {
    let invalid = |reason| PatchError::InvalidPath {
        path: pointer.to_string(),
        reason,
    };
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(invalid(if pointer.is_empty() {
            "whole-document pointer"
        } else {
            "must start with '/'"
        }));
    };

    rest.split('/')
        .map(|segment| {
            let mut out = String::with_capacity(segment.len());
            let mut chars = segment.chars();
            while let Some(c) = chars.next() {
                if c != '~' {
                    out.push(c);
                    continue;
                }
                match chars.next() {
                    Some('0') => out.push('~'),
                    Some('1') => out.push('/'),
                    _ => return Err(invalid("invalid '~' escape")),
                }
            }
            Ok(out)
        })
        .collect()
}

/// Restricts which top-level keys a patch may touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl KeyFilter {
    /// An empty `include` admits every key not in `exclude`.
    pub fn new<I, E, S>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: include.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, key: &str) -> bool {
        (self.include.is_empty() || self.include.contains(key)) && !self.exclude.contains(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Set,
    Remove,
    Replace,
}

/// A mutation at a path inside one JSON column.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEdit {
    pub kind: EditKind,
    /// Path below the column; all-digit segments index arrays, `-` appends.
    pub path: Vec<String>,
    /// Absent for removals.
    pub value: Option<Value>,
}

/// The new content of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnUpdate {
    /// Whole-column assignment; `Value::Null` clears the column.
    Value(Value),
    /// RFC 7396 merge of an object into the column's current document.
    Merge(Value),
    /// Ordered path edits applied to `base` (a value assigned earlier in the
    /// same document) or, without one, to the column's current document.
    Edit { base: Option<Value>, edits: Vec<PathEdit> },
}

impl ColumnUpdate {
    fn edits_of(&self, kind: EditKind) -> impl Iterator<Item = &PathEdit> {
        let edits = match self {
            Self::Edit { edits, .. } => edits.as_slice(),
            _ => &[],
        };
        edits.iter().filter(move |e| e.kind == kind)
    }

    pub fn sets(&self) -> impl Iterator<Item = &PathEdit> {
        self.edits_of(EditKind::Set)
    }

    pub fn removes(&self) -> impl Iterator<Item = &PathEdit> {
        self.edits_of(EditKind::Remove)
    }

    pub fn replaces(&self) -> impl Iterator<Item = &PathEdit> {
        self.edits_of(EditKind::Replace)
    }
}

/// Column updates keyed by top-level key.
pub type UpdateMap = BTreeMap<String, ColumnUpdate>;

/// Translates a JSON Patch document.
pub fn translate_json_patch(document: &[u8], filter: &KeyFilter) -> Result<UpdateMap, PatchError> {
    let operations: Vec<PatchOperation> =
        serde_json::from_slice(document).map_err(|e| PatchError::InvalidDocument(e.to_string()))?;

    let mut updates = UpdateMap::new();
    for operation in operations {
        let kind = match operation.op.as_str() {
            "add" => EditKind::Set,
            "replace" => EditKind::Replace,
            "remove" => EditKind::Remove,
            other => return Err(PatchError::UnsupportedOperation(other.to_string())),
        };
        let value = match (kind, operation.value) {
            (EditKind::Remove, _) => None,
            (_, Some(value)) => Some(value),
            (_, None) => {
                return Err(PatchError::MissingValue {
                    op: operation.op,
                    path: operation.path,
                });
            }
        };

        let mut segments = split_pointer(&operation.path)?.into_iter();
        let Some(key) = segments.next() else {
            continue;
        };
        let path: Vec<String> = segments.collect();
        if !filter.allows(&key) {
            continue;
        }

        if path.is_empty() {
            updates.insert(key, ColumnUpdate::Value(value.unwrap_or(Value::Null)));
            continue;
        }
        if kind != EditKind::Set && path.last().is_some_and(|s| s == "-") {
            return Err(PatchError::InvalidPath {
                path: operation.path,
                reason: "'-' is only valid for add",
            });
        }

        let edit = PathEdit { kind, path, value };
        match updates.remove(&key) {
            Some(ColumnUpdate::Edit { base, mut edits }) => {
                edits.push(edit);
                updates.insert(key, ColumnUpdate::Edit { base, edits });
            }
            Some(ColumnUpdate::Value(base)) => {
                updates.insert(
                    key,
                    ColumnUpdate::Edit {
                        base: Some(base),
                        edits: vec![edit],
                    },
                );
            }
            // merges never come out of a JSON Patch
            Some(ColumnUpdate::Merge(_)) | None => {
                updates.insert(
                    key,
                    ColumnUpdate::Edit {
                        base: None,
                        edits: vec![edit],
                    },
                );
            }
        }
    }
    Ok(updates)
}

/// Translates a JSON Merge Patch document.
///
/// Top-level `null` clears the column, objects merge into it and any other
/// value replaces it.
pub fn translate_merge_patch(document: &[u8], filter: &KeyFilter) -> Result<UpdateMap, PatchError> {
    let value: Value =
        serde_json::from_slice(document).map_err(|e| PatchError::InvalidDocument(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(PatchError::InvalidDocument("merge patch must be a JSON object".to_string()));
    };

    Ok(object
        .into_iter()
        .filter(|(key, _)| filter.allows(key))
        .map(|(key, value)| {
            let update = match value {
                Value::Object(_) => ColumnUpdate::Merge(value),
                other => ColumnUpdate::Value(other),
            };
            (key, update)
        })
        .collect())
}
