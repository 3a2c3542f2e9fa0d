//! Distance → traveled-checkpoint table.
//!
//! Sectional telemetry is stored by distance already traveled, at a fixed
//! spacing per granularity family. A "distance remaining" target maps to the
//! traveled checkpoint recorded for that race distance. Where
//! `distance - remaining` falls between recorded checkpoints the entry rounds
//! down to the nearest smaller recorded checkpoint; odd distances such as
//! 1650m resolve to the same checkpoint as the nearest rounder distance.
//!
//! The table is data, not arithmetic. The exceptions were verified per
//! jurisdiction and new distances are added here deliberately; a distance
//! that is not listed resolves to nothing.

use rf_common::{GranularityFamily, Remaining};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One (family, distance, remaining) → traveled mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointEntry {
    pub family: GranularityFamily,
    pub distance_m: u32,
    pub remaining: Remaining,
    pub traveled_m: u32,
}

impl CheckpointEntry {
    pub const fn new(
        family: GranularityFamily,
        distance_m: u32,
        remaining: Remaining,
        traveled_m: u32,
    ) -> Self {
        Self {
            family,
            distance_m,
            remaining,
            traveled_m,
        }
    }

    /// Lookup key for this entry.
    pub fn key(&self) -> (GranularityFamily, u32, Remaining) {
        (self.family, self.distance_m, self.remaining)
    }

    /// Check the entry against the family's recorded checkpoints.
    pub fn validate(&self) -> Result<(), String> {
        if !self.family.records(self.traveled_m) {
            return Err(format!(
                "{}m traveled is not a {} checkpoint",
                self.traveled_m, self.family
            ));
        }
        let exact = self.distance_m.checked_sub(self.remaining.metres());
        match exact {
            Some(limit) if self.traveled_m <= limit => Ok(()),
            _ => Err(format!(
                "{}m traveled is past the {} mark of a {}m race",
                self.traveled_m, self.remaining, self.distance_m
            )),
        }
    }
}

use GranularityFamily::{Coarse400, Fine200};
use Remaining::{M400, M800};

const fn e(
    family: GranularityFamily,
    distance_m: u32,
    remaining: Remaining,
    traveled_m: u32,
) -> CheckpointEntry {
    CheckpointEntry::new(family, distance_m, remaining, traveled_m)
}

/// Built-in checkpoint table.
pub static DEFAULT_CHECKPOINTS: &[CheckpointEntry] = &[
    // ── 200m family ─────────────────────────────────────────────────
    e(Fine200, 800, M400, 400),
    e(Fine200, 900, M400, 400),
    e(Fine200, 1000, M800, 200),
    e(Fine200, 1000, M400, 600),
    e(Fine200, 1050, M800, 200),
    e(Fine200, 1050, M400, 600),
    e(Fine200, 1100, M800, 200),
    e(Fine200, 1100, M400, 600),
    e(Fine200, 1200, M800, 400),
    e(Fine200, 1200, M400, 800),
    e(Fine200, 1300, M800, 400),
    e(Fine200, 1300, M400, 800),
    e(Fine200, 1400, M800, 600),
    e(Fine200, 1400, M400, 1000),
    e(Fine200, 1500, M800, 600),
    e(Fine200, 1500, M400, 1000),
    e(Fine200, 1550, M800, 600),
    e(Fine200, 1550, M400, 1000),
    e(Fine200, 1600, M800, 800),
    e(Fine200, 1600, M400, 1200),
    e(Fine200, 1650, M800, 800),
    e(Fine200, 1650, M400, 1200),
    e(Fine200, 1700, M800, 800),
    e(Fine200, 1700, M400, 1200),
    e(Fine200, 1800, M800, 1000),
    e(Fine200, 1800, M400, 1400),
    e(Fine200, 1900, M800, 1000),
    e(Fine200, 1900, M400, 1400),
    e(Fine200, 2000, M800, 1200),
    e(Fine200, 2000, M400, 1600),
    e(Fine200, 2100, M800, 1200),
    e(Fine200, 2100, M400, 1600),
    e(Fine200, 2200, M800, 1400),
    e(Fine200, 2200, M400, 1800),
    e(Fine200, 2400, M800, 1600),
    e(Fine200, 2400, M400, 2000),
    e(Fine200, 2500, M800, 1600),
    e(Fine200, 2500, M400, 2000),
    e(Fine200, 2600, M800, 1800),
    e(Fine200, 2600, M400, 2200),
    e(Fine200, 2800, M800, 2000),
    e(Fine200, 2800, M400, 2400),
    e(Fine200, 3000, M800, 2200),
    e(Fine200, 3000, M400, 2600),
    e(Fine200, 3200, M800, 2400),
    e(Fine200, 3200, M400, 2800),
    // ── 400m family ─────────────────────────────────────────────────
    // 1000m has no recorded checkpoint before the 800m mark.
    e(Coarse400, 1000, M400, 400),
    e(Coarse400, 1200, M800, 400),
    e(Coarse400, 1200, M400, 800),
    e(Coarse400, 1400, M800, 400),
    e(Coarse400, 1400, M400, 800),
    e(Coarse400, 1600, M800, 800),
    e(Coarse400, 1600, M400, 1200),
    e(Coarse400, 1800, M800, 800),
    e(Coarse400, 1800, M400, 1200),
    e(Coarse400, 2000, M800, 1200),
    e(Coarse400, 2000, M400, 1600),
    e(Coarse400, 2200, M800, 1200),
    e(Coarse400, 2200, M400, 1600),
    e(Coarse400, 2400, M800, 1600),
    e(Coarse400, 2400, M400, 2000),
    e(Coarse400, 2500, M800, 1600),
    e(Coarse400, 2500, M400, 2000),
    e(Coarse400, 2800, M800, 2000),
    e(Coarse400, 2800, M400, 2400),
    e(Coarse400, 3000, M800, 2000),
    e(Coarse400, 3000, M400, 2400),
    e(Coarse400, 3200, M800, 2400),
    e(Coarse400, 3200, M400, 2800),
    e(Coarse400, 3600, M800, 2800),
    e(Coarse400, 3600, M400, 3200),
];

/// Checkpoint settings in the engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointConfig {
    /// Start from [`DEFAULT_CHECKPOINTS`]; `extra` entries override matching keys.
    #[serde(default = "default_true")]
    pub include_builtin: bool,

    #[serde(default)]
    pub extra: Vec<CheckpointEntry>,
}

fn default_true() -> bool {
    true
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            include_builtin: true,
            extra: Vec::new(),
        }
    }
}

impl CheckpointConfig {
    /// Effective table: built-in rows (if enabled) with `extra` applied on top.
    pub fn effective_entries(&self) -> Vec<CheckpointEntry> {
        let mut entries: Vec<CheckpointEntry> = if self.include_builtin {
            DEFAULT_CHECKPOINTS.to_vec()
        } else {
            Vec::new()
        };
        for extra in &self.extra {
            match entries.iter_mut().find(|e| e.key() == extra.key()) {
                Some(existing) => *existing = *extra,
                None => entries.push(*extra),
            }
        }
        entries
    }
}
