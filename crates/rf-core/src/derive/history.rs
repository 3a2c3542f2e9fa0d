//! Strictly-prior historical aggregates.
//!
//! Rows are partitioned by runner key and ordered by (race date, race id).
//! Every feature of a row is computed from the runner's accumulator before
//! that row is folded in, so nothing from the current race or a later one
//! can reach it. Rows without a race date have no place in the order and
//! receive no history features.

use std::collections::{HashMap, VecDeque};

use chrono::NaiveDate;
use rf_common::{ConditionCategory, RunnerKey};
use rf_config::{HistoryConfig, PaceConfig};
use rf_telemetry::{ColumnKind, FeatureTable, FeatureValue, TelemetryError};
use serde::Serialize;

use super::pace::{PaceBucket, POS_IMPROVEMENT_800_FINISH, RUNNING_STYLE};
use super::{round_to, DeriveInputs};

/// Finishing positions at or above this are non-finishes in the last-5 window.
const LAST_5_POSITION_LIMIT: i64 = 50;
const LAST_5_WINDOW: usize = 5;

const ELO_BASE: f64 = 1500.0;
const ELO_FLOOR: f64 = 1200.0;
const ELO_CEILING: f64 = 2000.0;
/// Starts beyond this add nothing to the rating.
const ELO_EXPERIENCE_CAP: u32 = 50;

// ── Columns ─────────────────────────────────────────────────────────────

pub const TOTAL_RACES: &str = "total_races";
pub const WINS: &str = "wins";
pub const PLACES: &str = "places";
pub const WIN_PERCENTAGE: &str = "win_percentage";
pub const PLACE_PERCENTAGE: &str = "place_percentage";
pub const IS_FIRST_TIMER: &str = "is_first_timer";
pub const DAYS_SINCE_LAST_RACE: &str = "days_since_last_race";
pub const LAST_5_AVG_POSITION: &str = "last_5_avg_position";
pub const LAST_5_WIN_RATE: &str = "last_5_win_rate";
pub const LAST_5_PLACE_RATE: &str = "last_5_place_rate";
pub const FORM_RECENCY_SCORE: &str = "form_recency_score";
pub const FORM_MOMENTUM: &str = "form_momentum";
pub const WET_STARTS: &str = "wet_starts";
pub const DRY_STARTS: &str = "dry_starts";
pub const WET_WIN_RATE: &str = "wet_win_rate";
pub const DRY_WIN_RATE: &str = "dry_win_rate";
pub const WET_TRACK_PREFERENCE: &str = "wet_track_preference";
pub const CONDITION_MATCH_SCORE: &str = "condition_match_score";
pub const PRIOR_RUNNING_STYLE: &str = "prior_running_style";
pub const EARLY_SPEED_PCT: &str = "early_speed_pct";
pub const AVG_PRIOR_IMPROVEMENT: &str = "avg_prior_improvement";
pub const HORSE_ELO: &str = "horse_elo";
pub const IS_ELO_DEFAULT: &str = "is_elo_default";
pub const NEVER_PLACED_FLAG: &str = "never_placed_flag";

/// Every column this pass writes, with its kind.
pub const HISTORY_COLUMNS: &[(&str, ColumnKind)] = &[
    (TOTAL_RACES, ColumnKind::Int),
    (WINS, ColumnKind::Int),
    (PLACES, ColumnKind::Int),
    (WIN_PERCENTAGE, ColumnKind::Float),
    (PLACE_PERCENTAGE, ColumnKind::Float),
    (IS_FIRST_TIMER, ColumnKind::Bool),
    (DAYS_SINCE_LAST_RACE, ColumnKind::Int),
    (LAST_5_AVG_POSITION, ColumnKind::Float),
    (LAST_5_WIN_RATE, ColumnKind::Float),
    (LAST_5_PLACE_RATE, ColumnKind::Float),
    (FORM_RECENCY_SCORE, ColumnKind::Float),
    (FORM_MOMENTUM, ColumnKind::Float),
    (WET_STARTS, ColumnKind::Int),
    (DRY_STARTS, ColumnKind::Int),
    (WET_WIN_RATE, ColumnKind::Float),
    (DRY_WIN_RATE, ColumnKind::Float),
    (WET_TRACK_PREFERENCE, ColumnKind::Float),
    (CONDITION_MATCH_SCORE, ColumnKind::Float),
    (PRIOR_RUNNING_STYLE, ColumnKind::Text),
    (EARLY_SPEED_PCT, ColumnKind::Float),
    (AVG_PRIOR_IMPROVEMENT, ColumnKind::Float),
    (HORSE_ELO, ColumnKind::Int),
    (IS_ELO_DEFAULT, ColumnKind::Bool),
    (NEVER_PLACED_FLAG, ColumnKind::Bool),
];

// ── Condition preference ────────────────────────────────────────────────

/// Prior wins and starts split by going.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConditionRecord {
    pub wet_starts: u32,
    pub wet_wins: u32,
    pub dry_starts: u32,
    pub dry_wins: u32,
}

impl ConditionRecord {
    pub fn record(&mut self, category: ConditionCategory, won: bool) {
        let (starts, wins) = match category {
            ConditionCategory::Wet => (&mut self.wet_starts, &mut self.wet_wins),
            ConditionCategory::Dry => (&mut self.dry_starts, &mut self.dry_wins),
        };
        *starts += 1;
        if won {
            *wins += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreferenceScores {
    pub wet_win_rate: Option<f64>,
    pub dry_win_rate: Option<f64>,
    /// Positive leans wet, negative leans dry.
    pub wet_track_preference: f64,
    pub condition_match_score: f64,
}

fn rate(wins: u32, starts: u32, min_starts: u32) -> Option<f64> {
    (starts >= min_starts && starts > 0).then(|| f64::from(wins) / f64::from(starts))
}

/// Preference and match scores from a prior-only record.
pub fn preference(
    record: &ConditionRecord,
    today: Option<ConditionCategory>,
    config: &HistoryConfig,
) -> PreferenceScores {
    let wet = rate(record.wet_wins, record.wet_starts, config.wet_min_starts);
    let dry = rate(record.dry_wins, record.dry_starts, config.dry_min_starts);
    let preference = match (wet, dry) {
        (Some(wet), Some(dry)) => wet - dry,
        (Some(wet), None) => wet - config.baseline_win_rate,
        (None, Some(dry)) => config.baseline_win_rate - dry,
        (None, None) => 0.0,
    };

    let leaning = if preference > 0.0 {
        Some(ConditionCategory::Wet)
    } else if preference < 0.0 {
        Some(ConditionCategory::Dry)
    } else {
        None
    };
    let condition_match_score = match (leaning, today) {
        (Some(leaning), Some(today)) if leaning == today => {
            preference.abs() * config.match_amplifier
        }
        (Some(_), Some(_)) => -preference.abs(),
        _ => 0.0,
    };

    PreferenceScores {
        wet_win_rate: wet.map(|r| round_to(r, 4)),
        dry_win_rate: dry.map(|r| round_to(r, 4)),
        wet_track_preference: round_to(preference, 4),
        condition_match_score: round_to(condition_match_score, 4),
    }
}

// ── Form scores ─────────────────────────────────────────────────────────

pub fn form_recency_score(days_since_last_race: Option<i64>) -> f64 {
    match days_since_last_race {
        None => 0.5,
        Some(d) if d <= 14 => 1.0,
        Some(d) if d <= 28 => 0.9,
        Some(d) if d <= 60 => 0.6,
        Some(_) => 0.3,
    }
}

pub fn form_momentum(last_5_avg_position: Option<f64>) -> f64 {
    match last_5_avg_position {
        None => 0.0,
        Some(p) if p <= 2.0 => 1.0,
        Some(p) if p <= 4.0 => 0.7,
        Some(p) if p <= 6.0 => 0.4,
        Some(_) => 0.1,
    }
}

/// Rating from the prior win percentage and experience, clamped to 1200-2000.
pub fn horse_elo(win_percentage: f64, total_races: u32) -> i64 {
    let rating = ELO_BASE
        + win_percentage * 5.0
        + f64::from(total_races.min(ELO_EXPERIENCE_CAP)) * 2.0;
    rating.clamp(ELO_FLOOR, ELO_CEILING).round() as i64
}

// ── Accumulator ─────────────────────────────────────────────────────────

/// What a runner has done before the row being computed.
#[derive(Debug, Clone, Default)]
struct RunnerHistory {
    starts: u32,
    wins: u32,
    places: u32,
    last_start: Option<NaiveDate>,
    last_5: VecDeque<i64>,
    conditions: ConditionRecord,
    last_style: Option<PaceBucket>,
    bucketed: u32,
    early: u32,
    improvement_sum: i64,
    improvements: u32,
}

/// One row's own observations, folded in after its features are written.
#[derive(Debug, Clone, Copy)]
struct Observation {
    date: NaiveDate,
    final_position: Option<i64>,
    condition: Option<ConditionCategory>,
    style: Option<PaceBucket>,
    improvement: Option<i64>,
}

impl RunnerHistory {
    fn features(
        &self,
        date: NaiveDate,
        today: Option<ConditionCategory>,
        config: &HistoryConfig,
    ) -> Vec<(&'static str, Option<FeatureValue>)> {
        let starts = self.starts;
        let pct = |n: u32| {
            if starts > 0 {
                round_to(f64::from(n) / f64::from(starts) * 100.0, 2)
            } else {
                0.0
            }
        };
        let days = self.last_start.map(|d| (date - d).num_days());

        let window = self.last_5.len();
        let last_5_avg = (window > 0)
            .then(|| round_to(self.last_5.iter().sum::<i64>() as f64 / window as f64, 2));
        let last_5_rate = |pred: fn(i64) -> bool| {
            if window > 0 {
                let hits = self.last_5.iter().filter(|p| pred(**p)).count();
                round_to(hits as f64 / window.min(LAST_5_WINDOW) as f64, 4)
            } else {
                0.0
            }
        };

        let scores = preference(&self.conditions, today, config);
        let early_speed = (self.bucketed > 0)
            .then(|| round_to(f64::from(self.early) / f64::from(self.bucketed), 4));
        let avg_improvement = (self.improvements > 0).then(|| {
            round_to(
                self.improvement_sum as f64 / f64::from(self.improvements),
                2,
            )
        });

        vec![
            (TOTAL_RACES, Some(starts.into())),
            (WINS, Some(self.wins.into())),
            (PLACES, Some(self.places.into())),
            (WIN_PERCENTAGE, Some(pct(self.wins).into())),
            (PLACE_PERCENTAGE, Some(pct(self.places).into())),
            (IS_FIRST_TIMER, Some((starts == 0).into())),
            (DAYS_SINCE_LAST_RACE, days.map(FeatureValue::Int)),
            (LAST_5_AVG_POSITION, last_5_avg.map(FeatureValue::Float)),
            (LAST_5_WIN_RATE, Some(last_5_rate(|p| p == 1).into())),
            (LAST_5_PLACE_RATE, Some(last_5_rate(|p| p <= 3).into())),
            (FORM_RECENCY_SCORE, Some(form_recency_score(days).into())),
            (FORM_MOMENTUM, Some(form_momentum(last_5_avg).into())),
            (WET_STARTS, Some(self.conditions.wet_starts.into())),
            (DRY_STARTS, Some(self.conditions.dry_starts.into())),
            (WET_WIN_RATE, scores.wet_win_rate.map(FeatureValue::Float)),
            (DRY_WIN_RATE, scores.dry_win_rate.map(FeatureValue::Float)),
            (WET_TRACK_PREFERENCE, Some(scores.wet_track_preference.into())),
            (CONDITION_MATCH_SCORE, Some(scores.condition_match_score.into())),
            (
                PRIOR_RUNNING_STYLE,
                self.last_style.map(|s| s.as_str().into()),
            ),
            (EARLY_SPEED_PCT, early_speed.map(FeatureValue::Float)),
            (AVG_PRIOR_IMPROVEMENT, avg_improvement.map(FeatureValue::Float)),
            (HORSE_ELO, Some(horse_elo(pct(self.wins), starts).into())),
            (IS_ELO_DEFAULT, Some((starts == 0).into())),
            (
                NEVER_PLACED_FLAG,
                Some((starts > 0 && self.places == 0).into()),
            ),
        ]
    }

    fn observe(&mut self, obs: Observation) {
        if let Some(style) = obs.style.filter(|s| *s != PaceBucket::Unknown) {
            self.last_style = Some(style);
            self.bucketed += 1;
            if style.is_early() {
                self.early += 1;
            }
        }
        if let Some(improvement) = obs.improvement {
            self.improvement_sum += improvement;
            self.improvements += 1;
        }

        // Career and condition counts only include completed starts.
        let Some(position) = obs.final_position else {
            return;
        };
        self.starts += 1;
        if position == 1 {
            self.wins += 1;
        }
        if position <= 3 {
            self.places += 1;
        }
        self.last_start = Some(obs.date);
        if position < LAST_5_POSITION_LIMIT {
            if self.last_5.len() == LAST_5_WINDOW {
                self.last_5.pop_front();
            }
            self.last_5.push_back(position);
        }
        if let Some(category) = obs.condition {
            self.conditions.record(category, position == 1);
        }
    }
}

// ── Pass ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryReport {
    pub runners: usize,
    pub rows: usize,
    pub undated_rows: usize,
    pub first_timers: usize,
}

/// Row indices per runner, each in (race date, race id) order.
fn timelines(table: &FeatureTable) -> (Vec<(RunnerKey, Vec<usize>)>, usize) {
    let mut by_runner: HashMap<&RunnerKey, Vec<usize>> = HashMap::new();
    let mut undated = 0;
    for row in 0..table.len() {
        if table.race_date(row).is_none() {
            undated += 1;
            continue;
        }
        by_runner.entry(table.runner_key(row)).or_default().push(row);
    }
    let mut out: Vec<(RunnerKey, Vec<usize>)> = by_runner
        .into_iter()
        .map(|(key, mut rows)| {
            rows.sort_by(|a, b| {
                (table.race_date(*a), table.race_id(*a)).cmp(&(table.race_date(*b), table.race_id(*b)))
            });
            (key.clone(), rows)
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    (out, undated)
}

pub(crate) fn apply(
    table: &mut FeatureTable,
    inputs: &DeriveInputs<'_>,
    pace: &PaceConfig,
    config: &HistoryConfig,
) -> Result<HistoryReport, TelemetryError> {
    for (name, kind) in HISTORY_COLUMNS {
        table.ensure_column(name, *kind)?;
    }
    let (timelines, undated) = timelines(table);
    let mut report = HistoryReport {
        runners: timelines.len(),
        undated_rows: undated,
        ..HistoryReport::default()
    };

    for (_, rows) in &timelines {
        let mut history = RunnerHistory::default();
        for &row in rows {
            let Some(date) = table.race_date(row) else {
                continue;
            };
            let condition = inputs
                .track_condition(table, row)
                .and_then(ConditionCategory::classify);
            let observation = Observation {
                date,
                final_position: inputs.final_position(table, row),
                condition,
                style: row_style(table, row, pace),
                improvement: table.get_i64(row, POS_IMPROVEMENT_800_FINISH),
            };

            if history.starts == 0 {
                report.first_timers += 1;
            }
            for (name, value) in history.features(date, condition, config) {
                table.set(row, name, value)?;
            }
            report.rows += 1;
            history.observe(observation);
        }
    }
    Ok(report)
}

/// Bucket a row ran in, from its label or, failing that, its positions.
fn row_style(table: &FeatureTable, row: usize, pace: &PaceConfig) -> Option<PaceBucket> {
    table
        .get_text(row, RUNNING_STYLE)
        .and_then(PaceBucket::parse)
        .or_else(|| {
            let position = table.get_i64(row, rf_telemetry::columns::POSITION_800M)?;
            let total = table.get_i64(row, super::context::TOTAL_RUNNERS)?;
            Some(PaceBucket::bucket(position, total, pace))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HistoryConfig {
        HistoryConfig::default()
    }

    #[test]
    fn no_qualifying_category_is_neutral() {
        let record = ConditionRecord {
            wet_starts: 1,
            wet_wins: 1,
            dry_starts: 2,
            dry_wins: 0,
        };
        let scores = preference(&record, Some(ConditionCategory::Wet), &config());
        assert_eq!(scores.wet_win_rate, None);
        assert_eq!(scores.dry_win_rate, None);
        assert_eq!(scores.wet_track_preference, 0.0);
        assert_eq!(scores.condition_match_score, 0.0);
    }

    #[test]
    fn both_categories_compare_directly() {
        let record = ConditionRecord {
            wet_starts: 2,
            wet_wins: 1,
            dry_starts: 4,
            dry_wins: 1,
        };
        let wet_day = preference(&record, Some(ConditionCategory::Wet), &config());
        assert_eq!(wet_day.wet_win_rate, Some(0.5));
        assert_eq!(wet_day.dry_win_rate, Some(0.25));
        assert_eq!(wet_day.wet_track_preference, 0.25);
        assert_eq!(wet_day.condition_match_score, 0.375);

        let dry_day = preference(&record, Some(ConditionCategory::Dry), &config());
        assert_eq!(dry_day.condition_match_score, -0.25);

        let unknown = preference(&record, None, &config());
        assert_eq!(unknown.condition_match_score, 0.0);
    }

    #[test]
    fn single_category_uses_baseline_with_wet_positive_sign() {
        let wet_only = ConditionRecord {
            wet_starts: 2,
            wet_wins: 0,
            ..ConditionRecord::default()
        };
        let scores = preference(&wet_only, Some(ConditionCategory::Dry), &config());
        assert_eq!(scores.wet_track_preference, -0.095);
        // Dry-leaning runner on a dry day.
        assert_eq!(scores.condition_match_score, 0.1425);

        let dry_only = ConditionRecord {
            dry_starts: 3,
            dry_wins: 0,
            ..ConditionRecord::default()
        };
        let scores = preference(&dry_only, Some(ConditionCategory::Wet), &config());
        assert_eq!(scores.wet_track_preference, 0.095);
        assert_eq!(scores.condition_match_score, 0.1425);
    }

    #[test]
    fn form_score_steps() {
        assert_eq!(form_recency_score(None), 0.5);
        assert_eq!(form_recency_score(Some(14)), 1.0);
        assert_eq!(form_recency_score(Some(15)), 0.9);
        assert_eq!(form_recency_score(Some(60)), 0.6);
        assert_eq!(form_recency_score(Some(61)), 0.3);
        assert_eq!(form_momentum(None), 0.0);
        assert_eq!(form_momentum(Some(2.0)), 1.0);
        assert_eq!(form_momentum(Some(3.5)), 0.7);
        assert_eq!(form_momentum(Some(6.0)), 0.4);
        assert_eq!(form_momentum(Some(6.2)), 0.1);
    }

    #[test]
    fn elo_grows_with_wins_and_experience() {
        assert_eq!(horse_elo(0.0, 0), 1500);
        assert_eq!(horse_elo(25.0, 4), 1633);
        assert_eq!(horse_elo(100.0, 80), 2000);
        assert_eq!(horse_elo(12.5, 50), horse_elo(12.5, 90));
    }

    #[test]
    fn rating_and_placing_flags_use_prior_starts_only() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let mut history = RunnerHistory::default();
        let value = |h: &RunnerHistory, column: &str| {
            h.features(start, None, &config())
                .into_iter()
                .find(|(name, _)| *name == column)
                .and_then(|(_, v)| v)
        };
        assert_eq!(value(&history, HORSE_ELO), Some(FeatureValue::Int(1500)));
        assert_eq!(value(&history, IS_ELO_DEFAULT), Some(FeatureValue::Bool(true)));
        assert_eq!(value(&history, NEVER_PLACED_FLAG), Some(FeatureValue::Bool(false)));

        for position in [6, 9] {
            history.observe(Observation {
                date: start,
                final_position: Some(position),
                condition: None,
                style: None,
                improvement: None,
            });
        }
        assert_eq!(value(&history, HORSE_ELO), Some(FeatureValue::Int(1504)));
        assert_eq!(value(&history, IS_ELO_DEFAULT), Some(FeatureValue::Bool(false)));
        assert_eq!(value(&history, NEVER_PLACED_FLAG), Some(FeatureValue::Bool(true)));

        history.observe(Observation {
            date: start,
            final_position: Some(1),
            condition: None,
            style: None,
            improvement: None,
        });
        // 33.33% from three starts: 1500 + 166.65 + 6.
        assert_eq!(value(&history, HORSE_ELO), Some(FeatureValue::Int(1673)));
        assert_eq!(value(&history, NEVER_PLACED_FLAG), Some(FeatureValue::Bool(false)));
    }

    #[test]
    fn last_five_window_slides_and_skips_non_finishes() {
        let mut history = RunnerHistory::default();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for (i, position) in [1, 99, 2, 3, 4, 5, 6].into_iter().enumerate() {
            history.observe(Observation {
                date: start + chrono::Days::new(i as u64 * 7),
                final_position: Some(position),
                condition: None,
                style: None,
                improvement: None,
            });
        }
        assert_eq!(history.starts, 7);
        assert_eq!(history.wins, 1);
        assert_eq!(history.places, 3);
        assert_eq!(Vec::from(history.last_5.clone()), vec![2, 3, 4, 5, 6]);
    }
}
