//! Per-call options.
//!
//! All option structs deserialize from camelCase JSON with every field
//! defaulted, so callers can decode them straight from query parameters or
//! request bodies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Requirement, SortField};

/// Options for reading a single object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GetOptions {
    pub field_selector: Vec<Requirement>,
    pub label_selector: Vec<Requirement>,
    /// Explicit projection; empty selects every mapped field.
    pub fields: Vec<String>,
}

/// Options for listing and counting objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListOptions {
    /// 1-based page number. Clamped to 1 when `size > 0`.
    pub page: u64,
    /// Page size. Zero disables pagination.
    pub size: u64,
    pub sort: Vec<SortField>,
    /// Free-text substring search.
    pub search: String,
    /// Fields searched by `search`; empty searches the name.
    pub search_fields: Vec<String>,
    pub field_selector: Vec<Requirement>,
    pub label_selector: Vec<Requirement>,
    pub fields: Vec<String>,
}

impl ListOptions {
    #[must_use]
    pub fn paged(page: u64, size: u64) -> Self {
        Self {
            page,
            size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_search<I, S>(mut self, search: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search = search.into();
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    #[must_use]
    pub fn with_field_selector(mut self, requirement: Requirement) -> Self {
        self.field_selector.push(requirement);
        self
    }

    #[must_use]
    pub fn with_label_selector(mut self, requirement: Requirement) -> Self {
        self.label_selector.push(requirement);
        self
    }

    /// Row offset for the current page, if paginated. Saturates at
    /// `i64::MAX`, the largest offset SQL accepts; no page starts past it.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        (self.size > 0).then(|| {
            (self.effective_page() - 1)
                .saturating_mul(self.size)
                .min(i64::MAX as u64)
        })
    }

    /// The page number actually served.
    #[must_use]
    pub fn effective_page(&self) -> u64 {
        if self.size > 0 { self.page.max(1) } else { self.page }
    }
}

/// Options for full updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateOptions {
    pub field_selector: Vec<Requirement>,
    pub label_selector: Vec<Requirement>,
}

/// Options for partial updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatchOptions {
    pub field_selector: Vec<Requirement>,
    pub label_selector: Vec<Requirement>,
    /// Top-level keys allowed to participate; empty allows all.
    pub include: Vec<String>,
    /// Top-level keys that never participate.
    pub exclude: Vec<String>,
}

/// Options for deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteOptions {
    pub field_selector: Vec<Requirement>,
    pub label_selector: Vec<Requirement>,
}

/// Wire format of a patch document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchType {
    /// RFC 6902 operation list.
    JsonPatch,
    /// RFC 7396 object diff.
    MergePatch,
}

impl PatchType {
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::JsonPatch => "application/json-patch+json",
            Self::MergePatch => "application/merge-patch+json",
        }
    }
}

impl fmt::Display for PatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_type())
    }
}

/// Parses a content type; parameters such as `; charset=utf-8` are ignored.
impl FromStr for PatchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let media = s.split(';').next().unwrap_or_default().trim();
        match media.to_ascii_lowercase().as_str() {
            "application/json-patch+json" => Ok(Self::JsonPatch),
            "application/merge-patch+json" => Ok(Self::MergePatch),
            _ => Err(Error::UnknownPatchType(s.to_string())),
        }
    }
}
