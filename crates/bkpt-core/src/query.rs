#![forbid(unsafe_code)]

//! Breakpoint queries for `matches`.
//!
//! A query is either a single breakpoint name or a non-empty collection of
//! names. Typed callers build one through the `From` impls; dynamic callers
//! (JS hosts, config-driven UIs) go through [`BreakpointQuery::from_value`],
//! which rejects `null`, numbers, objects, and mixed arrays.

use serde_json::Value;

use crate::error::InvalidArgumentError;

/// A name or set of names to compare against the current breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointQuery {
    Name(String),
    AnyOf(Vec<String>),
}

impl BreakpointQuery {
    /// Check the query shape without evaluating it.
    ///
    /// # Errors
    ///
    /// [`InvalidArgumentError::EmptyQuery`] for an empty name or collection.
    pub fn validate(&self) -> Result<(), InvalidArgumentError> {
        let empty = match self {
            Self::Name(name) => name.is_empty(),
            Self::AnyOf(names) => names.is_empty(),
        };
        if empty {
            Err(InvalidArgumentError::EmptyQuery)
        } else {
            Ok(())
        }
    }

    /// Whether `current` satisfies this query.
    ///
    /// # Errors
    ///
    /// Same as [`BreakpointQuery::validate`].
    pub fn evaluate(&self, current: &str) -> Result<bool, InvalidArgumentError> {
        self.validate()?;
        Ok(match self {
            Self::Name(name) => name == current,
            Self::AnyOf(names) => names.iter().any(|n| n == current),
        })
    }

    /// Interpret a dynamic value as a query.
    ///
    /// # Errors
    ///
    /// - `null` → [`InvalidArgumentError::MissingQuery`]
    /// - `""` or `[]` → [`InvalidArgumentError::EmptyQuery`]
    /// - anything other than a string or an array of strings →
    ///   [`InvalidArgumentError::UnsupportedQuery`]
    pub fn from_value(value: &Value) -> Result<Self, InvalidArgumentError> {
        let query = match value {
            Value::Null => return Err(InvalidArgumentError::MissingQuery),
            Value::String(name) => Self::Name(name.clone()),
            Value::Array(items) => {
                let names = items
                    .iter()
                    .map(|item| match item {
                        Value::String(name) => Ok(name.clone()),
                        other => Err(InvalidArgumentError::UnsupportedQuery {
                            found: value_kind(other),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::AnyOf(names)
            }
            other => {
                return Err(InvalidArgumentError::UnsupportedQuery {
                    found: value_kind(other),
                });
            }
        };
        query.validate()?;
        Ok(query)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<&str> for BreakpointQuery {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for BreakpointQuery {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for BreakpointQuery {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl From<Vec<String>> for BreakpointQuery {
    fn from(names: Vec<String>) -> Self {
        Self::AnyOf(names)
    }
}

impl From<Vec<&str>> for BreakpointQuery {
    fn from(names: Vec<&str>) -> Self {
        Self::AnyOf(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for BreakpointQuery {
    fn from(names: &[&str]) -> Self {
        Self::AnyOf(names.iter().map(|n| (*n).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for BreakpointQuery {
    fn from(names: [&str; N]) -> Self {
        Self::AnyOf(names.iter().map(|n| (*n).to_string()).collect())
    }
}
