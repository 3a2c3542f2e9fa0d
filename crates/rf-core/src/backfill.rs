//! Sectional backfill: resolve and write the 800m/400m-to-go positions.
//!
//! Each target is an independent pass over the result rows whose position
//! is still null. A pass is planned in full (resolver, reconciler, sanity
//! bound) before anything is written, and writes go through
//! [`rf_common::fill_if_null`], so re-running a pass is a no-op.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use rf_common::{fill_if_null, MergeOutcome, RaceId, Remaining};
use rf_config::{EngineConfig, VenueRegistry};
use rf_telemetry::{Race, RaceResult, SectionalTelemetry};
use serde::Serialize;
use tracing::{debug, info};

use crate::checkpoint::{Checkpoint, CheckpointResolver};
use crate::progress::{elapsed_ms, ProgressEvent, ProgressSink, Stage};
use crate::reconcile::{IdentityReconciler, Match, ReconcileError};

/// Why a pending row stayed null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    NoRaceMetadata,
    NoDistance,
    NoMapping,
    NoTelemetryMatch,
    NoValueAtCheckpoint,
    SanityBound,
}

/// Planned outcome of one (row, target) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Resolved(u32),
    Unresolvable(UnresolvedReason),
}

/// Planned outcome of one pass, before any write.
#[derive(Debug, Clone)]
pub struct PassPlan {
    pub target: Remaining,
    /// (result row, state) for every pending row, in race order.
    pub rows: Vec<(usize, RowState)>,
    pub fallback_matches: usize,
    pub batches: usize,
}

impl PassPlan {
    pub fn resolved(&self) -> usize {
        self.rows
            .iter()
            .filter(|(_, s)| matches!(s, RowState::Resolved(_)))
            .count()
    }
}

/// Counts for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub target: Remaining,
    pub pending: usize,
    pub written: usize,
    pub already_present: usize,
    pub fallback_matches: usize,
    pub unresolvable: BTreeMap<UnresolvedReason, usize>,
    pub batches: usize,
}

impl PassReport {
    pub fn unresolvable_total(&self) -> usize {
        self.unresolvable.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub telemetry_rows: usize,
    pub matched_telemetry: usize,
    pub passes: Vec<PassReport>,
}

impl BackfillReport {
    pub fn written(&self) -> usize {
        self.passes.iter().map(|p| p.written).sum()
    }

    pub fn pass(&self, target: Remaining) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.target == target)
    }
}

/// Telemetry claimed by a canonical result row.
#[derive(Debug, Clone, Copy)]
struct Claim {
    telemetry: usize,
    via: Match,
}

/// Orchestrates resolver and reconciler over both targets.
#[derive(Debug, Clone)]
pub struct SectionalBackfiller {
    resolver: CheckpointResolver,
    venues: VenueRegistry,
    sanity_bound: u32,
    batch_size: usize,
}

impl SectionalBackfiller {
    pub fn new(
        resolver: CheckpointResolver,
        venues: VenueRegistry,
        sanity_bound: u32,
        batch_size: usize,
    ) -> Self {
        Self {
            resolver,
            venues,
            sanity_bound,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, rf_common::Error> {
        Ok(Self::new(
            CheckpointResolver::from_config(config)?,
            config.venue_registry(),
            config.sanity_bound,
            config.backfill.batch_size,
        ))
    }

    /// Run the 800m pass, then the 400m pass.
    ///
    /// Telemetry is reconciled once up front; an ambiguous identity aborts
    /// the run before either pass writes.
    pub fn run(
        &self,
        races: &[Race],
        sectionals: &[SectionalTelemetry],
        results: &mut [RaceResult],
        progress: &dyn ProgressSink,
    ) -> Result<BackfillReport, ReconcileError> {
        let race_index: HashMap<&RaceId, &Race> = races.iter().map(|r| (&r.race_id, r)).collect();
        let claims = self.claim_telemetry(&race_index, sectionals, results)?;

        let mut report = BackfillReport {
            telemetry_rows: sectionals.len(),
            matched_telemetry: claims.len(),
            passes: Vec::with_capacity(Remaining::ALL.len()),
        };
        for target in Remaining::ALL {
            let started = Instant::now();
            let plan = self.plan_pass(target, &race_index, sectionals, results, &claims, progress);
            let pass = apply(plan, results);
            progress.emit(&ProgressEvent::StageCompleted {
                stage: Stage::Backfill,
                target: Some(target),
                changed: pass.written,
                elapsed_ms: elapsed_ms(started),
            });
            info!(
                target = %target,
                pending = pass.pending,
                written = pass.written,
                unresolvable = pass.unresolvable_total(),
                fallback = pass.fallback_matches,
                "backfill pass complete"
            );
            report.passes.push(pass);
        }
        Ok(report)
    }

    /// Reconcile telemetry in races that still have a null checkpoint.
    fn claim_telemetry(
        &self,
        race_index: &HashMap<&RaceId, &Race>,
        sectionals: &[SectionalTelemetry],
        results: &[RaceResult],
    ) -> Result<HashMap<usize, Claim>, ReconcileError> {
        let open_races: std::collections::HashSet<&RaceId> = results
            .iter()
            .filter(|r| Remaining::ALL.iter().any(|t| r.position(*t).is_none()))
            .map(|r| &r.race_id)
            .collect();

        let reconciler = IdentityReconciler::new(results);
        let mut claims: HashMap<usize, Claim> = HashMap::new();
        for (t, series) in sectionals.iter().enumerate() {
            if !open_races.contains(&series.race_id) {
                continue;
            }
            let Some(race) = race_index.get(&series.race_id) else {
                continue;
            };
            let profile = self.venues.venue_profile(race.track_name.as_deref());
            let via = reconciler.reconcile(
                &series.race_id,
                &series.horse_name,
                series.runner_number,
                &profile,
            )?;
            let Some(row) = via.row() else {
                debug!(race_id = %series.race_id, name = %series.horse_name, "telemetry row has no canonical match");
                continue;
            };
            if let Some(existing) = claims.get(&row) {
                return Err(ReconcileError::DuplicateTelemetryRow {
                    race_id: series.race_id.to_string(),
                    runner: reconciler.result(row).horse_name.clone(),
                    first: sectionals[existing.telemetry].horse_name.clone(),
                    second: series.horse_name.clone(),
                });
            }
            claims.insert(row, Claim { telemetry: t, via });
        }
        Ok(claims)
    }

    fn plan_pass(
        &self,
        target: Remaining,
        race_index: &HashMap<&RaceId, &Race>,
        sectionals: &[SectionalTelemetry],
        results: &[RaceResult],
        claims: &HashMap<usize, Claim>,
        progress: &dyn ProgressSink,
    ) -> PassPlan {
        let mut by_race: BTreeMap<&RaceId, Vec<usize>> = BTreeMap::new();
        for (i, result) in results.iter().enumerate() {
            if result.position(target).is_none() {
                by_race.entry(&result.race_id).or_default().push(i);
            }
        }
        let total: usize = by_race.values().map(Vec::len).sum();
        progress.emit(&ProgressEvent::StageStarted {
            stage: Stage::Backfill,
            target: Some(target),
            total,
        });

        let race_ids: Vec<&RaceId> = by_race.keys().copied().collect();
        let batches = race_ids.len().div_ceil(self.batch_size);
        let mut plan = PassPlan {
            target,
            rows: Vec::with_capacity(total),
            fallback_matches: 0,
            batches,
        };

        for (batch, chunk) in race_ids.chunks(self.batch_size).enumerate() {
            for race_id in chunk {
                let race = race_index.get(race_id).copied();
                for &row in &by_race[race_id] {
                    let claim = claims.get(&row);
                    let state = match self.resolve_row(target, race, claim, sectionals) {
                        Ok(value) => {
                            if claim.is_some_and(|c| matches!(c.via, Match::RunnerNumber(_))) {
                                plan.fallback_matches += 1;
                            }
                            RowState::Resolved(value)
                        }
                        Err(reason) => RowState::Unresolvable(reason),
                    };
                    plan.rows.push((row, state));
                }
            }
            progress.emit(&ProgressEvent::BatchCompleted {
                stage: Stage::Backfill,
                target: Some(target),
                batch: batch + 1,
                batches,
                done: plan.rows.len(),
                total,
            });
        }
        plan
    }

    fn resolve_row(
        &self,
        target: Remaining,
        race: Option<&Race>,
        claim: Option<&Claim>,
        sectionals: &[SectionalTelemetry],
    ) -> Result<u32, UnresolvedReason> {
        let race = race.ok_or(UnresolvedReason::NoRaceMetadata)?;
        let distance = race.race_distance.ok_or(UnresolvedReason::NoDistance)?;
        let family = self.venues.venue_profile(race.track_name.as_deref()).family;
        let traveled = match self.resolver.resolve(distance, family, target) {
            Checkpoint::Traveled { traveled_m } => traveled_m,
            Checkpoint::NotAvailable => return Err(UnresolvedReason::NoMapping),
        };
        let claim = claim.ok_or(UnresolvedReason::NoTelemetryMatch)?;
        let value = sectionals[claim.telemetry]
            .position_at(traveled)
            .ok_or(UnresolvedReason::NoValueAtCheckpoint)?;
        if value == 0 || value >= self.sanity_bound {
            return Err(UnresolvedReason::SanityBound);
        }
        Ok(value)
    }
}

/// Write the resolved cells of a plan.
fn apply(plan: PassPlan, results: &mut [RaceResult]) -> PassReport {
    let mut report = PassReport {
        target: plan.target,
        pending: plan.rows.len(),
        written: 0,
        already_present: 0,
        fallback_matches: plan.fallback_matches,
        unresolvable: BTreeMap::new(),
        batches: plan.batches,
    };
    for (row, state) in plan.rows {
        match state {
            RowState::Resolved(value) => {
                match fill_if_null(results[row].position_mut(plan.target), value) {
                    MergeOutcome::Filled => report.written += 1,
                    MergeOutcome::AlreadyPresent | MergeOutcome::Conflict => {
                        report.already_present += 1
                    }
                }
            }
            RowState::Unresolvable(reason) => {
                *report.unresolvable.entry(reason).or_default() += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoopProgress, RecordingProgress};

    fn race(id: &str, track: &str, distance: u32) -> Race {
        let mut race = Race::new(id);
        race.track_name = Some(track.to_string());
        race.race_distance = Some(distance);
        race
    }

    fn backfiller() -> SectionalBackfiller {
        SectionalBackfiller::from_config(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn fills_both_targets_from_telemetry() {
        let races = vec![race("r1", "Flemington", 1200)];
        let mut results = vec![RaceResult::new("r1", "Winx")];
        let sectionals = vec![SectionalTelemetry::new("r1", "WINX")
            .with_position(400, 3)
            .with_position(800, 2)];
        let report = backfiller()
            .run(&races, &sectionals, &mut results, &NoopProgress)
            .unwrap();
        assert_eq!(results[0].position_800m, Some(3));
        assert_eq!(results[0].position_400m, Some(2));
        assert_eq!(report.written(), 2);
        assert_eq!(report.matched_telemetry, 1);
    }

    #[test]
    fn existing_positions_are_never_overwritten() {
        let races = vec![race("r1", "Flemington", 1200)];
        let mut result = RaceResult::new("r1", "Winx");
        result.position_800m = Some(7);
        let mut results = vec![result];
        let sectionals = vec![SectionalTelemetry::new("r1", "Winx")
            .with_position(400, 3)
            .with_position(800, 2)];
        let report = backfiller()
            .run(&races, &sectionals, &mut results, &NoopProgress)
            .unwrap();
        assert_eq!(results[0].position_800m, Some(7));
        assert_eq!(results[0].position_400m, Some(2));
        assert_eq!(report.pass(Remaining::M800).unwrap().pending, 0);
    }

    #[test]
    fn unresolvable_rows_are_counted_not_raised() {
        let races = vec![
            race("r1", "Flemington", 1200),
            race("r2", "Flemington", 1234),
            Race::new("r3"),
        ];
        let mut results = vec![
            RaceResult::new("r1", "Winx"),
            RaceResult::new("r1", "Ghost"),
            RaceResult::new("r2", "Hartnell"),
            RaceResult::new("r3", "Redzel"),
            RaceResult::new("r4", "Orphan"),
        ];
        let sectionals = vec![SectionalTelemetry::new("r1", "Winx")
            .with_position(400, 75)
            .with_position(800, 0)];
        let report = backfiller()
            .run(&races, &sectionals, &mut results, &NoopProgress)
            .unwrap();
        let pass = report.pass(Remaining::M800).unwrap();
        assert_eq!(pass.written, 0);
        assert_eq!(pass.unresolvable[&UnresolvedReason::SanityBound], 1);
        assert_eq!(pass.unresolvable[&UnresolvedReason::NoTelemetryMatch], 1);
        assert_eq!(pass.unresolvable[&UnresolvedReason::NoMapping], 1);
        assert_eq!(pass.unresolvable[&UnresolvedReason::NoDistance], 1);
        assert_eq!(pass.unresolvable[&UnresolvedReason::NoRaceMetadata], 1);
        assert!(results.iter().all(|r| !r.has_checkpoint()));
    }

    #[test]
    fn missing_value_at_checkpoint_is_unresolvable() {
        let races = vec![race("r1", "Flemington", 1200)];
        let mut results = vec![RaceResult::new("r1", "Winx")];
        let sectionals = vec![SectionalTelemetry::new("r1", "Winx").with_position(800, 2)];
        let report = backfiller()
            .run(&races, &sectionals, &mut results, &NoopProgress)
            .unwrap();
        let pass = report.pass(Remaining::M800).unwrap();
        assert_eq!(pass.unresolvable[&UnresolvedReason::NoValueAtCheckpoint], 1);
        assert_eq!(results[0].position_400m, Some(2));
    }

    #[test]
    fn coarse_family_uses_its_own_table() {
        let races = vec![race("r1", "Newmarket", 2000)];
        let mut results = vec![RaceResult::new("r1", "Frankel")];
        let sectionals = vec![SectionalTelemetry::new("r1", "Frankel")
            .with_position(1200, 4)
            .with_position(1600, 1)];
        backfiller()
            .run(&races, &sectionals, &mut results, &NoopProgress)
            .unwrap();
        assert_eq!(results[0].position_800m, Some(4));
        assert_eq!(results[0].position_400m, Some(1));
    }

    #[test]
    fn hong_kong_falls_back_to_runner_number() {
        let races = vec![race("hk1", "Sha Tin", 1200)];
        let mut canonical = RaceResult::new("hk1", "Golden Sixty");
        canonical.horse_number = Some("3".into());
        let mut results = vec![canonical];
        let sectionals = vec![SectionalTelemetry::new("hk1", "GOLDEN SIXTY (AUS)")
            .with_number(3)
            .with_position(400, 6)];
        let report = backfiller()
            .run(&races, &sectionals, &mut results, &NoopProgress)
            .unwrap();
        assert_eq!(results[0].position_800m, Some(6));
        assert_eq!(report.pass(Remaining::M800).unwrap().fallback_matches, 1);
    }

    #[test]
    fn ambiguity_aborts_before_any_write() {
        let races = vec![race("hk1", "Sha Tin", 1200), race("r1", "Flemington", 1200)];
        let mut a = RaceResult::new("hk1", "Alpha");
        a.horse_number = Some("5".into());
        let mut b = RaceResult::new("hk1", "Beta");
        b.horse_number = Some("5a".into());
        let mut results = vec![a, b, RaceResult::new("r1", "Winx")];
        let sectionals = vec![
            SectionalTelemetry::new("r1", "Winx").with_position(400, 1),
            SectionalTelemetry::new("hk1", "Gamma")
                .with_number(5)
                .with_position(400, 2),
        ];
        let err = backfiller()
            .run(&races, &sectionals, &mut results, &NoopProgress)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::DuplicateIdentityMatch { .. }));
        assert!(results.iter().all(|r| !r.has_checkpoint()));
    }

    #[test]
    fn two_telemetry_rows_for_one_runner_is_an_error() {
        let races = vec![race("r1", "Flemington", 1200)];
        let mut results = vec![RaceResult::new("r1", "Winx")];
        let sectionals = vec![
            SectionalTelemetry::new("r1", "Winx").with_number(1),
            SectionalTelemetry::new("r1", " winx").with_number(2),
        ];
        let err = backfiller()
            .run(&races, &sectionals, &mut results, &NoopProgress)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::DuplicateTelemetryRow { .. }));
    }

    #[test]
    fn batches_emit_progress() {
        let races: Vec<Race> = (0..5)
            .map(|i| race(&format!("r{i}"), "Flemington", 1200))
            .collect();
        let mut results: Vec<RaceResult> = (0..5)
            .map(|i| RaceResult::new(format!("r{i}"), "Winx"))
            .collect();
        let backfiller = SectionalBackfiller::new(
            CheckpointResolver::builtin(),
            VenueRegistry::default(),
            50,
            2,
        );
        let sink = RecordingProgress::new();
        let report = backfiller.run(&races, &[], &mut results, &sink).unwrap();
        assert_eq!(report.pass(Remaining::M800).unwrap().batches, 3);
        let batch_events = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, ProgressEvent::BatchCompleted { .. }))
            .count();
        assert_eq!(batch_events, 6);
    }
}
