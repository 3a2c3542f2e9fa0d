//! Race, runner and run identity types.
//!
//! A runner's history is aggregated by its [`RunnerKey`], which pairs the
//! runner slug with the jurisdiction it raced in. A single race's name and
//! number fields are never used as a cross-race identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::racing::Jurisdiction;

/// Race identifier as carried by the upstream race tables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceId(pub String);

impl RaceId {
    pub fn new(id: impl Into<String>) -> Self {
        RaceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RaceId {
    fn from(id: &str) -> Self {
        RaceId(id.to_string())
    }
}

/// Stable runner-location identity.
///
/// Format: `<runner_slug>_<jurisdiction code>`
/// Example: `winx_AU`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunnerKey(pub String);

impl RunnerKey {
    /// Build the key from a runner slug and the jurisdiction of the race.
    pub fn from_slug(slug: &str, jurisdiction: Jurisdiction) -> Self {
        RunnerKey(format!("{}_{}", slug.trim(), jurisdiction.code()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunnerKey {
    fn from(key: &str) -> Self {
        RunnerKey(key.to_string())
    }
}

/// Identifier for one engine run.
///
/// Format: `run-<date>-<time>-<random>`
/// Example: `run-20260115-143022-abc123`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let random: String = uuid::Uuid::new_v4()
            .to_string()
            .chars()
            .take(6)
            .collect();
        RunId(format!("run-{}-{}", now.format("%Y%m%d-%H%M%S"), random))
    }

    /// Parse an existing run ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.starts_with("run-") && s.len() > 19 {
            Some(RunId(s.to_string()))
        } else {
            None
        }
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
