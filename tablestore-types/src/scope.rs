//! Tenancy scopes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// One segment of a tenancy path, e.g. `project=foo`.
///
/// Every storage operation adds `resource = name` as an equality predicate
/// for each scope in its chain. Scopes are ANDed, so their order never
/// changes which rows match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    resource: String,
    name: String,
}

impl Scope {
    /// Creates a scope narrowing to `resource = name`.
    #[must_use]
    pub fn new(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            name: name.into(),
        }
    }

    /// The owning resource, used as the scope column.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The owner's name, used as the scope column value.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.resource, self.name)
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((resource, name)) if !resource.trim().is_empty() => {
                Ok(Self::new(resource.trim(), name.trim()))
            }
            _ => Err(Error::InvalidScope(s.to_string())),
        }
    }
}
