//! Row types for the race, result and sectional tables.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rf_common::{Jurisdiction, RaceId, Remaining, RunnerKey};
use serde::{Deserialize, Serialize};

/// Race metadata. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub race_id: RaceId,
    pub race_date: Option<NaiveDate>,
    pub track_name: Option<String>,
    pub race_distance: Option<u32>,
    pub track_condition: Option<String>,
    pub race_class: Option<String>,
}

impl Race {
    pub fn new(race_id: impl Into<String>) -> Self {
        Self {
            race_id: RaceId::new(race_id),
            race_date: None,
            track_name: None,
            race_distance: None,
            track_condition: None,
            race_class: None,
        }
    }
}

/// One runner's canonical result in one race.
///
/// `position_800m` and `position_400m` only ever move from `None` to a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub race_id: RaceId,
    pub horse_name: String,
    pub horse_slug: Option<String>,
    /// Raw saddle-cloth text, e.g. `"7"` or `"7a"`.
    pub horse_number: Option<String>,
    pub final_position: Option<u32>,
    pub position_800m: Option<u32>,
    pub position_400m: Option<u32>,
}

impl RaceResult {
    pub fn new(race_id: impl Into<String>, horse_name: impl Into<String>) -> Self {
        Self {
            race_id: RaceId::new(race_id),
            horse_name: horse_name.into(),
            horse_slug: None,
            horse_number: None,
            final_position: None,
            position_800m: None,
            position_400m: None,
        }
    }

    pub fn position(&self, remaining: Remaining) -> Option<u32> {
        match remaining {
            Remaining::M800 => self.position_800m,
            Remaining::M400 => self.position_400m,
        }
    }

    pub fn position_mut(&mut self, remaining: Remaining) -> &mut Option<u32> {
        match remaining {
            Remaining::M800 => &mut self.position_800m,
            Remaining::M400 => &mut self.position_400m,
        }
    }

    pub fn has_checkpoint(&self) -> bool {
        self.position_800m.is_some() || self.position_400m.is_some()
    }

    /// Runner-location key; `None` when the result carries no slug.
    pub fn runner_key(&self, jurisdiction: Jurisdiction) -> Option<RunnerKey> {
        self.horse_slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|slug| RunnerKey::from_slug(slug, jurisdiction))
    }
}

/// One row of the long-format sectional table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionalRow {
    pub race_id: RaceId,
    pub horse_name: String,
    pub runner_number: Option<u32>,
    pub distance_m: u32,
    pub position: Option<u32>,
}

/// Dense per-runner sectional series keyed by distance traveled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionalTelemetry {
    pub race_id: RaceId,
    /// Raw name; may still carry HTML entity artifacts.
    pub horse_name: String,
    pub runner_number: Option<u32>,
    pub positions: BTreeMap<u32, u32>,
}

impl SectionalTelemetry {
    pub fn new(race_id: impl Into<String>, horse_name: impl Into<String>) -> Self {
        Self {
            race_id: RaceId::new(race_id),
            horse_name: horse_name.into(),
            runner_number: None,
            positions: BTreeMap::new(),
        }
    }

    pub fn with_number(mut self, number: u32) -> Self {
        self.runner_number = Some(number);
        self
    }

    pub fn with_position(mut self, traveled_m: u32, position: u32) -> Self {
        self.positions.insert(traveled_m, position);
        self
    }

    pub fn position_at(&self, traveled_m: u32) -> Option<u32> {
        self.positions.get(&traveled_m).copied()
    }
}

/// Fold long-format rows into one series per (race, name, number).
///
/// Series keep the order in which their first row appears. A row without a
/// runner number joins the first series already seen under its name, and a
/// numbered row adopts a series that has no number yet, so a runner whose
/// number is missing on some rows stays one series. A repeated checkpoint
/// keeps its first value; rows with a null position are skipped.
pub fn group_sectionals(rows: Vec<SectionalRow>) -> Vec<SectionalTelemetry> {
    let mut order: Vec<SectionalTelemetry> = Vec::new();
    let mut by_name: HashMap<(RaceId, String), Vec<usize>> = HashMap::new();
    let mut repeated = 0usize;

    for row in rows {
        let slots = by_name
            .entry((row.race_id.clone(), row.horse_name.clone()))
            .or_default();
        let existing = match row.runner_number {
            None => slots.first().copied(),
            Some(number) => slots
                .iter()
                .copied()
                .find(|&slot| order[slot].runner_number == Some(number))
                .or_else(|| {
                    slots
                        .iter()
                        .copied()
                        .find(|&slot| order[slot].runner_number.is_none())
                }),
        };
        let slot = match existing {
            Some(slot) => {
                if order[slot].runner_number.is_none() {
                    order[slot].runner_number = row.runner_number;
                }
                slot
            }
            None => {
                order.push(SectionalTelemetry {
                    race_id: row.race_id.clone(),
                    horse_name: row.horse_name.clone(),
                    runner_number: row.runner_number,
                    positions: BTreeMap::new(),
                });
                slots.push(order.len() - 1);
                order.len() - 1
            }
        };
        if let Some(position) = row.position {
            let series = &mut order[slot].positions;
            if series.contains_key(&row.distance_m) {
                repeated += 1;
            } else {
                series.insert(row.distance_m, position);
            }
        }
    }

    if repeated > 0 {
        tracing::debug!(repeated, "sectional rows repeated a checkpoint; kept first value");
    }
    order
}
