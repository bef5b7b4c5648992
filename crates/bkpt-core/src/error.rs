#![forbid(unsafe_code)]

//! Error types shared across the breakpoint stack.

/// Invalid construction input: an empty or unorderable breakpoint table, or
/// an unrecognized measurement unit.
///
/// Raised synchronously while building a table or an engine. No partially
/// constructed value is ever returned alongside it.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// The breakpoint table has no entries.
    EmptyTable,
    /// A threshold is NaN or infinite and cannot be ordered.
    NonFiniteThreshold {
        /// Name of the offending breakpoint.
        name: String,
        /// The rejected threshold value.
        threshold: f64,
    },
    /// The measurement unit is neither `px` nor `em`.
    UnknownUnit(String),
    /// The `em` fallback font size is zero, negative, or not finite.
    InvalidFontSize(f64),
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTable => write!(f, "breakpoint table must contain at least one entry"),
            Self::NonFiniteThreshold { name, threshold } => {
                write!(f, "breakpoint {name:?} has non-finite threshold {threshold}")
            }
            Self::UnknownUnit(unit) => {
                write!(f, "unknown unit {unit:?}: expected \"px\" or \"em\"")
            }
            Self::InvalidFontSize(size) => {
                write!(f, "root font size fallback must be a positive number, got {size}")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// A breakpoint query that is missing or has the wrong shape.
///
/// Returned from `matches`; never affects engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidArgumentError {
    /// No query was supplied (`null` / absent).
    MissingQuery,
    /// The query was an empty name or an empty collection.
    EmptyQuery,
    /// The query was neither a name nor a collection of names.
    UnsupportedQuery {
        /// Short description of what was supplied instead.
        found: &'static str,
    },
}

impl std::fmt::Display for InvalidArgumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingQuery => write!(f, "matches() expects a breakpoint name or a list of names"),
            Self::EmptyQuery => write!(f, "matches() received an empty query"),
            Self::UnsupportedQuery { found } => write!(
                f,
                "matches() expects a string or an array of strings, got {found}"
            ),
        }
    }
}

impl std::error::Error for InvalidArgumentError {}
