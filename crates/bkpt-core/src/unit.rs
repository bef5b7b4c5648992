#![forbid(unsafe_code)]

//! Measurement units for breakpoint lookup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Root font size assumed when the host reports none.
pub const DEFAULT_ROOT_FONT_SIZE: f64 = 16.0;

/// The scale thresholds are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Unit {
    /// Raw pixel width.
    #[default]
    Px,
    /// Pixel width divided by the root font size.
    Em,
}

impl Unit {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Px => "px",
            Self::Em => "em",
        }
    }

    /// Convert a raw pixel width into the width used for table lookup.
    ///
    /// For [`Unit::Em`], a non-positive or non-finite `root_font_size` is
    /// replaced by `fallback_font_size`.
    #[must_use]
    pub fn lookup_width(self, width_px: f64, root_font_size: f64, fallback_font_size: f64) -> f64 {
        match self {
            Self::Px => width_px,
            Self::Em => {
                let font = if root_font_size.is_finite() && root_font_size > 0.0 {
                    root_font_size
                } else {
                    fallback_font_size
                };
                width_px / font
            }
        }
    }
}

impl FromStr for Unit {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "px" => Ok(Self::Px),
            "em" => Ok(Self::Em),
            other => Err(ConfigurationError::UnknownUnit(other.to_string())),
        }
    }
}

impl TryFrom<String> for Unit {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.as_str().to_string()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
