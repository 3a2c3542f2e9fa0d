//! Derived features.
//!
//! Four passes over the feature table, in order:
//! - [`context`]: field size, distance range, barrier position, race class,
//!   track profile and market features
//! - [`pace`]: running-style bucket and 800m→finish improvement
//! - [`history`]: strictly-prior career, form, rating and condition-preference
//!   aggregates
//! - [`connections`]: strictly-prior jockey and trainer records, and whether a
//!   runner has raced in another jurisdiction before
//!
//! Derived columns are recomputed from their inputs on every run and
//! overwritten, so a run is reproducible from the same snapshot.

pub mod connections;
pub mod context;
pub mod history;
pub mod pace;

use std::collections::HashMap;
use std::time::Instant;

use rf_common::{RaceId, RunnerKey};
use rf_config::{EngineConfig, HistoryConfig, PaceConfig, VenueRegistry};
use rf_telemetry::{columns, FeatureTable, Race, RaceResult, TelemetryError};
use serde::Serialize;
use tracing::info;

use crate::progress::{elapsed_ms, ProgressEvent, ProgressSink, Stage};

pub use connections::ConnectionsReport;
pub use context::ContextReport;
pub use history::{preference, ConditionRecord, HistoryReport, PreferenceScores};
pub use pace::{PaceBucket, PaceReport};

/// Read-only views over the race and result tables, indexed for the passes.
#[derive(Debug)]
pub struct DeriveInputs<'a> {
    venues: &'a VenueRegistry,
    races: HashMap<&'a RaceId, &'a Race>,
    field_sizes: HashMap<&'a RaceId, usize>,
    finals: HashMap<(RaceId, RunnerKey), u32>,
}

impl<'a> DeriveInputs<'a> {
    pub fn new(races: &'a [Race], results: &'a [RaceResult], venues: &'a VenueRegistry) -> Self {
        let races: HashMap<&RaceId, &Race> = races.iter().map(|r| (&r.race_id, r)).collect();
        let mut field_sizes: HashMap<&RaceId, usize> = HashMap::new();
        let mut finals = HashMap::new();
        for result in results {
            *field_sizes.entry(&result.race_id).or_default() += 1;
            let track = races
                .get(&result.race_id)
                .and_then(|r| r.track_name.as_deref());
            let Some(key) = result.runner_key(venues.jurisdiction(track)) else {
                continue;
            };
            if let Some(position) = result.final_position {
                finals.insert((result.race_id.clone(), key), position);
            }
        }
        Self {
            venues,
            races,
            field_sizes,
            finals,
        }
    }

    pub fn venues(&self) -> &'a VenueRegistry {
        self.venues
    }

    pub fn race(&self, race_id: &RaceId) -> Option<&'a Race> {
        self.races.get(race_id).copied()
    }

    /// Runners in the race according to the result store.
    pub fn field_size(&self, race_id: &RaceId) -> Option<usize> {
        self.field_sizes.get(race_id).copied()
    }

    /// Final position of a feature row: the feature column first, then the
    /// result store.
    pub fn final_position(&self, table: &FeatureTable, row: usize) -> Option<i64> {
        table.get_i64(row, columns::FINAL_POSITION).or_else(|| {
            self.finals
                .get(&(table.race_id(row).clone(), table.runner_key(row).clone()))
                .map(|&p| i64::from(p))
        })
    }

    /// Going descriptor: race metadata first, then a `track_condition` feature column.
    pub fn track_condition<'t>(&self, table: &'t FeatureTable, row: usize) -> Option<&'t str>
    where
        'a: 't,
    {
        let from_race: Option<&'t str> = self
            .race(table.race_id(row))
            .and_then(|r| r.track_condition.as_deref());
        from_race.or_else(|| table.get_text(row, columns::TRACK_CONDITION))
    }

    pub fn track_name(&self, table: &FeatureTable, row: usize) -> Option<&'a str> {
        self.race(table.race_id(row))
            .and_then(|r| r.track_name.as_deref())
    }

    pub fn race_class<'t>(&self, table: &'t FeatureTable, row: usize) -> Option<&'t str>
    where
        'a: 't,
    {
        let from_race: Option<&'t str> = self
            .race(table.race_id(row))
            .and_then(|r| r.race_class.as_deref());
        from_race.or_else(|| table.get_text(row, columns::RACE_CLASS))
    }

    /// Race distance: the feature column first, then race metadata.
    pub fn race_distance(&self, table: &FeatureTable, row: usize) -> Option<i64> {
        table
            .get_i64(row, columns::RACE_DISTANCE)
            .or_else(|| {
                self.race(table.race_id(row))
                    .and_then(|r| r.race_distance)
                    .map(i64::from)
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeriveReport {
    pub rows: usize,
    pub context: ContextReport,
    pub pace: PaceReport,
    pub history: HistoryReport,
    pub connections: ConnectionsReport,
}

/// Runs the context, pace, history and connections passes.
#[derive(Debug, Clone, Default)]
pub struct DerivedFeatureCalculator {
    pace: PaceConfig,
    history: HistoryConfig,
    venues: VenueRegistry,
}

impl DerivedFeatureCalculator {
    pub fn new(pace: PaceConfig, history: HistoryConfig, venues: VenueRegistry) -> Self {
        Self {
            pace,
            history,
            venues,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.pace.clone(),
            config.history.clone(),
            config.venue_registry(),
        )
    }

    pub fn run(
        &self,
        races: &[Race],
        results: &[RaceResult],
        table: &mut FeatureTable,
        progress: &dyn ProgressSink,
    ) -> Result<DeriveReport, TelemetryError> {
        let started = Instant::now();
        progress.emit(&ProgressEvent::StageStarted {
            stage: Stage::Derive,
            target: None,
            total: table.len(),
        });
        let inputs = DeriveInputs::new(races, results, &self.venues);

        let context = context::apply(table, &inputs)?;
        let pace = pace::apply(table, &inputs, &self.pace)?;
        let history = history::apply(table, &inputs, &self.pace, &self.history)?;
        let connections = connections::apply(table, &inputs)?;

        let report = DeriveReport {
            rows: table.len(),
            context,
            pace,
            history,
            connections,
        };
        progress.emit(&ProgressEvent::StageCompleted {
            stage: Stage::Derive,
            target: None,
            changed: report.rows,
            elapsed_ms: elapsed_ms(started),
        });
        info!(
            rows = report.rows,
            bucketed = report.pace.bucketed,
            runners = report.history.runners,
            undated = report.history.undated_rows,
            jockeys = report.connections.jockeys,
            trainers = report.connections.trainers,
            "derived features complete"
        );
        Ok(report)
    }
}

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to(200.0 / 3.0, 2), 66.67);
        assert_eq!(round_to(0.66666, 4), 0.6667);
        assert_eq!(round_to(-0.125, 2), -0.13);
    }
}
