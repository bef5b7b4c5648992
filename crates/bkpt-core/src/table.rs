#![forbid(unsafe_code)]

//! Breakpoint tables: named minimum-width thresholds in ascending order.
//!
//! A [`BreakpointTable`] is built once from caller configuration, either a
//! list of [`BreakpointDefinition`]s or a name→threshold mapping, and is
//! never mutated afterwards.
//!
//! # Invariants
//!
//! 1. The table is non-empty.
//! 2. Entries are sorted ascending by threshold. The sort is stable, so
//!    entries sharing a threshold keep their input order.
//! 3. Every threshold is finite.
//!
//! # Lookup
//!
//! [`BreakpointTable::resolve`] returns the last entry whose threshold is
//! `<= width`. When no entry qualifies (a negative or NaN width against
//! positive thresholds) the first entry is returned instead.

use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigurationError;

/// The four-tier responsive convention used when no table is supplied.
pub const DEFAULT_BREAKPOINTS: [(&str, f64); 4] =
    [("xs", 0.0), ("sm", 768.0), ("md", 992.0), ("lg", 1200.0)];

/// A named bucket that becomes active at `threshold` and above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakpointDefinition {
    pub name: String,
    #[serde(alias = "min_width", alias = "minWidth")]
    pub threshold: f64,
}

impl BreakpointDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, threshold: f64) -> Self {
        Self {
            name: name.into(),
            threshold,
        }
    }
}

/// Caller-facing breakpoint configuration before normalization.
///
/// Deserializes from either a table/object (`{ xs = 0, sm = 768 }`, document
/// order preserved) or an array of `{ name, threshold }` entries.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakpointSpec {
    /// Name→threshold pairs in insertion order.
    Map(Vec<(String, f64)>),
    /// Explicit definitions, possibly unordered.
    List(Vec<BreakpointDefinition>),
}

impl BreakpointSpec {
    /// Flatten into definitions, preserving input order.
    #[must_use]
    pub fn to_definitions(&self) -> Vec<BreakpointDefinition> {
        match self {
            Self::Map(pairs) => pairs
                .iter()
                .map(|(name, threshold)| BreakpointDefinition::new(name.clone(), *threshold))
                .collect(),
            Self::List(defs) => defs.clone(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Map(pairs) => pairs.len(),
            Self::List(defs) => defs.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BreakpointSpec {
    fn default() -> Self {
        Self::Map(
            DEFAULT_BREAKPOINTS
                .iter()
                .map(|&(name, threshold)| (name.to_string(), threshold))
                .collect(),
        )
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for BreakpointSpec {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Vec<BreakpointDefinition>> for BreakpointSpec {
    fn from(defs: Vec<BreakpointDefinition>) -> Self {
        Self::List(defs)
    }
}

impl Serialize for BreakpointSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Map(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (name, threshold) in pairs {
                    map.serialize_entry(name, threshold)?;
                }
                map.end()
            }
            Self::List(defs) => {
                let mut seq = serializer.serialize_seq(Some(defs.len()))?;
                for def in defs {
                    seq.serialize_element(def)?;
                }
                seq.end()
            }
        }
    }
}

struct SpecVisitor;

impl<'de> Visitor<'de> for SpecVisitor {
    type Value = BreakpointSpec;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of name to threshold or a list of {name, threshold} entries")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(4));
        while let Some((name, threshold)) = access.next_entry::<String, f64>()? {
            pairs.push((name, threshold));
        }
        Ok(BreakpointSpec::Map(pairs))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut defs = Vec::with_capacity(access.size_hint().unwrap_or(4));
        while let Some(def) = access.next_element::<BreakpointDefinition>()? {
            defs.push(def);
        }
        Ok(BreakpointSpec::List(defs))
    }
}

impl<'de> Deserialize<'de> for BreakpointSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SpecVisitor)
    }
}

/// Normalized, immutable breakpoint lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointTable {
    entries: Vec<BreakpointDefinition>,
}

impl BreakpointTable {
    /// Build a table from definitions in any order.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::EmptyTable`] for zero entries and
    /// [`ConfigurationError::NonFiniteThreshold`] for NaN or infinite
    /// thresholds.
    pub fn new(
        definitions: impl IntoIterator<Item = BreakpointDefinition>,
    ) -> Result<Self, ConfigurationError> {
        let mut entries: Vec<BreakpointDefinition> = definitions.into_iter().collect();
        if entries.is_empty() {
            return Err(ConfigurationError::EmptyTable);
        }
        if let Some(bad) = entries.iter().find(|d| !d.threshold.is_finite()) {
            return Err(ConfigurationError::NonFiniteThreshold {
                name: bad.name.clone(),
                threshold: bad.threshold,
            });
        }
        // Vec::sort_by is stable; ties keep input order.
        entries.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            entries = entries.len(),
            smallest = %entries[0].name,
            "breakpoint table normalized"
        );

        Ok(Self { entries })
    }

    /// Build a table from name→threshold pairs in insertion order.
    ///
    /// # Errors
    ///
    /// Same as [`BreakpointTable::new`].
    pub fn from_pairs<K: Into<String>>(
        pairs: impl IntoIterator<Item = (K, f64)>,
    ) -> Result<Self, ConfigurationError> {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, threshold)| BreakpointDefinition::new(name, threshold)),
        )
    }

    /// Build a table from a [`BreakpointSpec`].
    ///
    /// # Errors
    ///
    /// Same as [`BreakpointTable::new`].
    pub fn from_spec(spec: &BreakpointSpec) -> Result<Self, ConfigurationError> {
        Self::new(spec.to_definitions())
    }

    /// The entry with the greatest threshold `<= width`, if any.
    #[must_use]
    pub fn lookup(&self, width: f64) -> Option<&BreakpointDefinition> {
        // NaN compares false, so a NaN width yields zero qualifying entries.
        let qualifying = self.entries.partition_point(|d| d.threshold <= width);
        qualifying.checked_sub(1).map(|idx| &self.entries[idx])
    }

    /// The entry for `width`, falling back to the smallest-threshold entry.
    #[must_use]
    pub fn resolve(&self, width: f64) -> &BreakpointDefinition {
        self.lookup(width).unwrap_or_else(|| self.first())
    }

    /// The smallest-threshold entry (the default bucket).
    #[must_use]
    pub fn first(&self) -> &BreakpointDefinition {
        &self.entries[0]
    }

    /// First entry carrying `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BreakpointDefinition> {
        self.entries.iter().find(|d| d.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BreakpointDefinition> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|d| d.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[BreakpointDefinition] {
        &self.entries
    }
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_BREAKPOINTS
                .iter()
                .map(|&(name, threshold)| BreakpointDefinition::new(name, threshold))
                .collect(),
        }
    }
}

impl fmt::Display for BreakpointTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, def) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}>={}", def.name, def.threshold)?;
        }
        write!(f, "]")
    }
}

impl<'a> IntoIterator for &'a BreakpointTable {
    type Item = &'a BreakpointDefinition;
    type IntoIter = std::slice::Iter<'a, BreakpointDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
