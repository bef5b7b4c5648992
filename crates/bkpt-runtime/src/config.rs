#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! [`ManagerConfig`] gathers every construction option into one value that
//! can be built in code or loaded from TOML or JSON.
//!
//! # Loading
//!
//! ```toml
//! # bkpt.toml
//! unit = "em"
//!
//! [breakpoints]
//! xs = 0
//! sm = 48
//! md = 62
//! lg = 75
//!
//! [rate_limit]
//! kind = "debounce"
//! window_ms = 100
//! ```
//!
//! ```rust,ignore
//! let config = ManagerConfig::from_toml_file("bkpt.toml")?;
//! let config = ManagerConfig::from_json_str(json)?;
//! ```
//!
//! Loaders validate after parsing, so a file naming an unknown unit or an
//! empty table fails to load instead of failing later at construction.

#[cfg(feature = "config-files")]
use std::path::Path;

use bkpt_core::{BreakpointSpec, BreakpointTable, ConfigurationError, DEFAULT_ROOT_FONT_SIZE, Unit};
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimit;

/// Construction options for [`crate::BreakpointManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Breakpoint thresholds; defaults to `{xs: 0, sm: 768, md: 992, lg: 1200}`.
    pub breakpoints: BreakpointSpec,
    /// `"px"` or `"em"`. Kept as a string so an unknown value surfaces as a
    /// [`ConfigurationError`] rather than a parse error.
    pub unit: String,
    /// How resize signals are rate limited.
    pub rate_limit: RateLimit,
    /// Font size used for `em` when the host reports none.
    pub root_font_size_fallback: f64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            breakpoints: BreakpointSpec::default(),
            unit: Unit::Px.as_str().to_string(),
            rate_limit: RateLimit::default(),
            root_font_size_fallback: DEFAULT_ROOT_FONT_SIZE,
        }
    }
}

/// Validated pieces the engine is built from.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub table: BreakpointTable,
    pub unit: Unit,
    pub rate_limit: RateLimit,
    pub root_font_size_fallback: f64,
}

impl ManagerConfig {
    #[must_use]
    pub fn with_breakpoints(mut self, breakpoints: impl Into<BreakpointSpec>) -> Self {
        self.breakpoints = breakpoints.into();
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    #[must_use]
    pub fn with_root_font_size_fallback(mut self, size: f64) -> Self {
        self.root_font_size_fallback = size;
        self
    }

    /// Check every option without building an engine.
    ///
    /// # Errors
    ///
    /// The first [`ConfigurationError`] found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.resolve().map(|_| ())
    }

    pub(crate) fn resolve(&self) -> Result<ResolvedConfig, ConfigurationError> {
        let unit: Unit = self.unit.parse()?;
        let fallback = self.root_font_size_fallback;
        if !(fallback.is_finite() && fallback > 0.0) {
            return Err(ConfigurationError::InvalidFontSize(fallback));
        }
        let table = BreakpointTable::from_spec(&self.breakpoints)?;
        Ok(ResolvedConfig {
            table,
            unit,
            rate_limit: self.rate_limit,
            root_font_size_fallback: fallback,
        })
    }

    /// Load from a TOML string.
    #[cfg(feature = "config-files")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = toml::from_str(s).map_err(ConfigLoadError::Toml)?;
        config.validate().map_err(ConfigLoadError::Invalid)?;
        Ok(config)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config-files")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigLoadError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-files")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigLoadError::Json)?;
        config.validate().map_err(ConfigLoadError::Invalid)?;
        Ok(config)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config-files")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigLoadError::Io)?;
        Self::from_json_str(&content)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a configuration.
#[derive(Debug)]
pub enum ConfigLoadError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config-files")]
    Toml(toml::de::Error),
    /// JSON parse error.
    Json(serde_json::Error),
    /// Parsed, but the options are invalid.
    Invalid(ConfigurationError),
}

impl std::fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config-files")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Invalid(e) => write!(f, "invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config-files")]
            Self::Toml(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Invalid(e) => Some(e),
        }
    }
}

impl From<ConfigurationError> for ConfigLoadError {
    fn from(e: ConfigurationError) -> Self {
        Self::Invalid(e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
