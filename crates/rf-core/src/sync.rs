//! Propagate resolved checkpoint positions into the feature table.

use std::collections::HashMap;
use std::time::Instant;

use rf_common::{MergeOutcome, RaceId, Remaining};
use rf_config::VenueRegistry;
use rf_telemetry::{ColumnKind, FeatureTable, FeatureValue, Race, RaceResult, TelemetryError};
use serde::Serialize;
use tracing::{debug, info};

use crate::progress::{elapsed_ms, ProgressEvent, ProgressSink, Stage};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Results carrying at least one checkpoint position.
    pub considered: usize,
    /// Feature cells that went from null to a value.
    pub filled: usize,
    /// Feature cells that already held a different value, which was kept.
    pub conflicts_kept: usize,
    pub missing_feature_rows: usize,
    pub skipped_no_slug: usize,
}

/// COALESCE-style merge of `position_800m` / `position_400m`.
#[derive(Debug, Clone, Default)]
pub struct FeatureSyncer {
    venues: VenueRegistry,
}

impl FeatureSyncer {
    pub fn new(venues: VenueRegistry) -> Self {
        Self { venues }
    }

    /// Fill null position features from the result store. Never overwrites,
    /// so a second call changes nothing.
    pub fn sync(
        &self,
        results: &[RaceResult],
        races: &[Race],
        table: &mut FeatureTable,
        progress: &dyn ProgressSink,
    ) -> Result<SyncReport, TelemetryError> {
        let started = Instant::now();
        for target in Remaining::ALL {
            table.ensure_column(target.column(), ColumnKind::Int)?;
        }
        let tracks: HashMap<&RaceId, Option<&str>> = races
            .iter()
            .map(|r| (&r.race_id, r.track_name.as_deref()))
            .collect();

        let candidates: Vec<&RaceResult> = results.iter().filter(|r| r.has_checkpoint()).collect();
        progress.emit(&ProgressEvent::StageStarted {
            stage: Stage::Sync,
            target: None,
            total: candidates.len(),
        });

        let mut report = SyncReport {
            considered: candidates.len(),
            ..SyncReport::default()
        };
        for result in candidates {
            let track = tracks.get(&result.race_id).copied().flatten();
            let jurisdiction = self.venues.jurisdiction(track);
            let Some(key) = result.runner_key(jurisdiction) else {
                report.skipped_no_slug += 1;
                continue;
            };
            let Some(row) = table.row_index(&result.race_id, &key) else {
                debug!(race_id = %result.race_id, runner = %key, "no feature row for result");
                report.missing_feature_rows += 1;
                continue;
            };
            for target in Remaining::ALL {
                let Some(position) = result.position(target) else {
                    continue;
                };
                match table.fill_if_null(row, target.column(), FeatureValue::from(position))? {
                    MergeOutcome::Filled => report.filled += 1,
                    MergeOutcome::AlreadyPresent => {}
                    MergeOutcome::Conflict => report.conflicts_kept += 1,
                }
            }
        }

        progress.emit(&ProgressEvent::StageCompleted {
            stage: Stage::Sync,
            target: None,
            changed: report.filled,
            elapsed_ms: elapsed_ms(started),
        });
        info!(
            considered = report.considered,
            filled = report.filled,
            conflicts_kept = report.conflicts_kept,
            missing_feature_rows = report.missing_feature_rows,
            "feature sync complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;
    use rf_common::RunnerKey;

    fn setup() -> (Vec<RaceResult>, Vec<Race>, FeatureTable) {
        let mut race = Race::new("r1");
        race.track_name = Some("Sha Tin".into());
        let mut result = RaceResult::new("r1", "Golden Sixty");
        result.horse_slug = Some("golden-sixty".into());
        result.position_800m = Some(4);
        result.position_400m = Some(2);
        let mut table = FeatureTable::new();
        table
            .push_row(RaceId::from("r1"), RunnerKey::from("golden-sixty_HK"), None)
            .unwrap();
        (vec![result], vec![race], table)
    }

    #[test]
    fn fills_positions_keyed_by_jurisdiction() {
        let (results, races, mut table) = setup();
        let report = FeatureSyncer::default()
            .sync(&results, &races, &mut table, &NoopProgress)
            .unwrap();
        assert_eq!(report.filled, 2);
        assert_eq!(table.get_i64(0, "position_800m"), Some(4));
        assert_eq!(table.get_i64(0, "position_400m"), Some(2));
    }

    #[test]
    fn existing_feature_value_wins() {
        let (results, races, mut table) = setup();
        table.ensure_column("position_800m", ColumnKind::Float).unwrap();
        table.set(0, "position_800m", Some(FeatureValue::Float(9.0))).unwrap();
        let report = FeatureSyncer::default()
            .sync(&results, &races, &mut table, &NoopProgress)
            .unwrap();
        assert_eq!(report.conflicts_kept, 1);
        assert_eq!(report.filled, 1);
        assert_eq!(table.get_i64(0, "position_800m"), Some(9));
    }

    #[test]
    fn missing_rows_and_slugs_are_counted() {
        let (mut results, races, mut table) = setup();
        let mut other = RaceResult::new("r2", "Winx");
        other.horse_slug = Some("winx".into());
        other.position_800m = Some(1);
        let mut no_slug = RaceResult::new("r1", "Unknown");
        no_slug.position_400m = Some(3);
        results.push(other);
        results.push(no_slug);
        results.push(RaceResult::new("r1", "No Positions"));
        let report = FeatureSyncer::default()
            .sync(&results, &races, &mut table, &NoopProgress)
            .unwrap();
        assert_eq!(report.considered, 3);
        assert_eq!(report.missing_feature_rows, 1);
        assert_eq!(report.skipped_no_slug, 1);
    }
}
