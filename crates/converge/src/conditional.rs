//! Platform-conditional value resolution.
//!
//! The one piece of real decision logic in the engine: a mapping of
//! platform family to (version-or-"default" to value), resolved against
//! [`PlatformFacts`] before any action runs. Resolution without a match
//! is an error, never a silent empty value.

use crate::error::ConvergenceError;
use crate::facts::PlatformFacts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Map key that matches any version not listed explicitly.
pub const DEFAULT_KEY: &str = "default";

/// A value that varies by platform family and version.
///
/// Lookup order: exact family + exact version string, then the family's
/// `"default"` entry. A family absent from the map, or present without
/// either a version match or a default, is [`ConvergenceError::UnresolvedConditional`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformValue<T> {
    families: BTreeMap<String, BTreeMap<String, T>>,
}

impl<T> PlatformValue<T> {
    pub fn new() -> Self {
        Self {
            families: BTreeMap::new(),
        }
    }

    /// Builder-style insert of a (family, version-or-default, value) entry.
    pub fn with(
        mut self,
        family: impl Into<String>,
        version: impl Into<String>,
        value: T,
    ) -> Self {
        self.families
            .entry(family.into())
            .or_default()
            .insert(version.into(), value);
        self
    }

    /// Resolve to a single value for the given facts.
    ///
    /// Pure lookup, no side effects. Threshold comparisons like
    /// ">= 12.04" are caller-side branches, not part of this map.
    pub fn resolve(&self, facts: &PlatformFacts) -> Result<&T, ConvergenceError> {
        let unresolved = || ConvergenceError::UnresolvedConditional {
            family: facts.family.clone(),
            version: facts.version.clone(),
        };

        let versions = self.families.get(&facts.family).ok_or_else(unresolved)?;

        versions
            .get(&facts.version)
            .or_else(|| versions.get(DEFAULT_KEY))
            .ok_or_else(unresolved)
    }
}

/// A resource attribute that is either a literal or platform-dependent.
///
/// The driver resolves every conditional attribute before guard
/// evaluation and action execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Conditional<T> {
    /// A plain literal value
    Value(T),
    /// A value selected by platform family and version
    ByPlatform { by_platform: PlatformValue<T> },
}

impl<T> Conditional<T> {
    /// Resolve against facts, borrowing the selected value.
    pub fn resolve(&self, facts: &PlatformFacts) -> Result<&T, ConvergenceError> {
        match self {
            Self::Value(value) => Ok(value),
            Self::ByPlatform { by_platform } => by_platform.resolve(facts),
        }
    }

    /// The literal value, if already resolved.
    pub fn literal(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            Self::ByPlatform { .. } => None,
        }
    }
}

impl<T: Clone> Conditional<T> {
    /// Collapse to a literal by resolving against facts.
    pub fn resolved(&self, facts: &PlatformFacts) -> Result<Self, ConvergenceError> {
        Ok(Self::Value(self.resolve(facts)?.clone()))
    }
}

impl<T> From<T> for Conditional<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}
