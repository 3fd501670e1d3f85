//! Selector requirements.
//!
//! A [`Requirement`] is a `(key, operator, values)` triple. The same type is
//! used for field selectors (top-level columns) and label selectors (keys
//! inside the `labels` JSON column); the engine decides which by the list
//! the requirement is placed in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Comparison applied by a [`Requirement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// Substring match.
    Like,
}

impl Operator {
    /// How many values the operator accepts: `None` means "one or more".
    const fn arity(self) -> Option<usize> {
        match self {
            Self::Exists | Self::DoesNotExist => Some(0),
            Self::In | Self::NotIn => None,
            _ => Some(1),
        }
    }

    /// Returns true if the operator compares against values.
    #[must_use]
    pub const fn takes_values(self) -> bool {
        !matches!(self, Self::Exists | Self::DoesNotExist)
    }

    /// Returns true for the ordering operators (`>`, `>=`, `<`, `<=`).
    #[must_use]
    pub const fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::GreaterThan | Self::GreaterThanOrEqual | Self::LessThan | Self::LessThanOrEqual
        )
    }

    /// Selector-syntax symbol for the operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::Exists => "exists",
            Self::DoesNotExist => "!",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Like => "~=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "=" | "==" => Self::Equals,
            "!=" => Self::NotEquals,
            "in" => Self::In,
            "notin" => Self::NotIn,
            "exists" => Self::Exists,
            "!" => Self::DoesNotExist,
            ">" | "gt" => Self::GreaterThan,
            ">=" | "gte" => Self::GreaterThanOrEqual,
            "<" | "lt" => Self::LessThan,
            "<=" | "lte" => Self::LessThanOrEqual,
            "~=" | "like" => Self::Like,
            other => return Err(Error::InvalidOperator(other.to_string())),
        })
    }
}

/// A single selector predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRequirement")]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: Vec<String>,
}

#[derive(Deserialize)]
struct RawRequirement {
    key: String,
    operator: Operator,
    #[serde(default)]
    values: Vec<String>,
}

impl TryFrom<RawRequirement> for Requirement {
    type Error = Error;

    fn try_from(raw: RawRequirement) -> Result<Self> {
        Self::new(raw.key, raw.operator, raw.values)
    }
}

impl Requirement {
    /// Builds a requirement, checking the value count against the operator.
    pub fn new<I, V>(key: impl Into<String>, operator: Operator, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let key = key.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let invalid = |reason: String| Error::InvalidRequirement {
            key: key.clone(),
            reason,
        };

        if key.is_empty() {
            return Err(invalid("key must not be empty".into()));
        }
        match operator.arity() {
            Some(0) if !values.is_empty() => {
                return Err(invalid(format!("operator {operator} takes no values")));
            }
            Some(n) if n > 0 && values.len() != n => {
                return Err(invalid(format!("operator {operator} takes exactly {n} value")));
            }
            None if values.is_empty() => {
                return Err(invalid(format!("operator {operator} needs at least one value")));
            }
            _ => {}
        }

        Ok(Self {
            key,
            operator,
            values,
        })
    }

    /// `key = value`
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        Self::new(key, Operator::Equals, [value.into()])
    }

    /// `key != value`
    pub fn not_equals(key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        Self::new(key, Operator::NotEquals, [value.into()])
    }

    /// `key in (values...)`
    pub fn in_values<I, V>(key: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::new(key, Operator::In, values)
    }

    /// `key` is present.
    pub fn exists(key: impl Into<String>) -> Result<Self> {
        Self::new(key, Operator::Exists, Vec::<String>::new())
    }

    /// `key` is absent.
    pub fn does_not_exist(key: impl Into<String>) -> Result<Self> {
        Self::new(key, Operator::DoesNotExist, Vec::<String>::new())
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// The single comparison value of a one-value operator.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::In | Operator::NotIn => {
                write!(f, "{} {} ({})", self.key, self.operator, self.values.join(","))
            }
            op => write!(f, "{}{}{}", self.key, op, self.values.join(",")),
        }
    }
}
