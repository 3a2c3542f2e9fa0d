//! Race-context features: field size, distance range, barrier position,
//! race class flags and rating, track profile, and the pre-race market.
//!
//! Everything here is known before the jump, so none of it is leaky.

use std::collections::HashMap;

use rf_common::{MergeOutcome, RaceId};
use rf_config::TrackCategory;
use rf_telemetry::{ColumnKind, FeatureTable, FeatureValue, TelemetryError};
use serde::Serialize;

use super::{round_to, DeriveInputs};

pub const TOTAL_RUNNERS: &str = "total_runners";
pub const DISTANCE_RANGE: &str = "distance_range";
pub const BARRIER: &str = "barrier";
pub const BARRIER_POSITION: &str = "barrier_position";
pub const IS_MAIDEN: &str = "is_maiden";
pub const IS_HANDICAP: &str = "is_handicap";
pub const CLASS_RATING: &str = "class_rating";
pub const TRACK_DIRECTION: &str = "track_direction";
pub const TRACK_CATEGORY: &str = "track_category";
pub const WIN_ODDS: &str = "win_odds";
pub const ODDS_IMPLIED_PROBABILITY: &str = "odds_implied_probability";
pub const IS_FAVORITE: &str = "is_favorite";
pub const IS_LONGSHOT: &str = "is_longshot";

/// Win odds above this are longshots.
const LONGSHOT_ODDS: f64 = 20.0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextReport {
    pub field_sizes_filled: usize,
    pub distance_ranges: usize,
    pub barrier_positions: usize,
    pub track_profiles: usize,
    pub priced_rows: usize,
}

/// Distance band label for a race distance in metres.
pub fn distance_range(distance_m: i64) -> &'static str {
    match distance_m {
        d if d < 1000 => "Sprint (<1000m)",
        d if d < 1400 => "Speed (1000-1399m)",
        d if d < 1800 => "Mile (1400-1799m)",
        d if d < 2200 => "Middle (1800-2199m)",
        _ => "Staying (2200m+)",
    }
}

/// Barrier band relative to the field size.
pub fn barrier_position(barrier: i64, total_runners: Option<i64>) -> &'static str {
    match total_runners {
        None | Some(0) => "unknown",
        Some(total) => {
            let fraction = barrier as f64 / total as f64;
            if fraction <= 0.33 {
                "inner"
            } else if fraction <= 0.66 {
                "middle"
            } else {
                "outer"
            }
        }
    }
}

/// Class rating from the race class text, falling back to the track category.
pub fn class_rating(race_class: Option<&str>, category: Option<TrackCategory>) -> i64 {
    let class = race_class.map(str::to_lowercase).unwrap_or_default();
    if class.contains("group 1") {
        100
    } else if class.contains("group 2") {
        90
    } else if class.contains("group 3") {
        80
    } else if class.contains("listed") {
        70
    } else if class.contains("benchmark") || class.contains("bm") {
        55
    } else {
        match category {
            Some(TrackCategory::Metro) => 45,
            Some(TrackCategory::Provincial) => 35,
            _ => 25,
        }
    }
}

/// Implied win probability of decimal odds; `None` unless odds are positive.
pub fn implied_probability(odds: f64) -> Option<f64> {
    (odds > 0.0).then(|| round_to(1.0 / odds, 4))
}

/// Shortest positive price in each race.
fn race_favourites(table: &FeatureTable) -> HashMap<RaceId, f64> {
    let mut shortest: HashMap<RaceId, f64> = HashMap::new();
    for row in 0..table.len() {
        let Some(odds) = table.get_f64(row, WIN_ODDS).filter(|o| *o > 0.0) else {
            continue;
        };
        shortest
            .entry(table.race_id(row).clone())
            .and_modify(|best| *best = best.min(odds))
            .or_insert(odds);
    }
    shortest
}

pub(crate) fn apply(
    table: &mut FeatureTable,
    inputs: &DeriveInputs<'_>,
) -> Result<ContextReport, TelemetryError> {
    let mut report = ContextReport::default();

    let mut feature_counts: HashMap<RaceId, usize> = HashMap::new();
    for race_id in table.race_ids() {
        *feature_counts.entry(race_id.clone()).or_default() += 1;
    }

    table.ensure_column(TOTAL_RUNNERS, ColumnKind::Int)?;
    table.ensure_column(DISTANCE_RANGE, ColumnKind::Text)?;
    table.ensure_column(IS_MAIDEN, ColumnKind::Bool)?;
    table.ensure_column(IS_HANDICAP, ColumnKind::Bool)?;
    table.ensure_column(CLASS_RATING, ColumnKind::Int)?;
    table.ensure_column(TRACK_DIRECTION, ColumnKind::Text)?;
    table.ensure_column(TRACK_CATEGORY, ColumnKind::Text)?;
    let has_barrier = table.has_column(BARRIER);
    if has_barrier {
        table.ensure_column(BARRIER_POSITION, ColumnKind::Text)?;
    }
    let has_odds = table.has_column(WIN_ODDS);
    let favourites = if has_odds {
        table.ensure_column(ODDS_IMPLIED_PROBABILITY, ColumnKind::Float)?;
        table.ensure_column(IS_FAVORITE, ColumnKind::Bool)?;
        table.ensure_column(IS_LONGSHOT, ColumnKind::Bool)?;
        race_favourites(table)
    } else {
        HashMap::new()
    };
    let venues = inputs.venues();

    for row in 0..table.len() {
        let race_id = table.race_id(row).clone();
        let field = inputs
            .field_size(&race_id)
            .or_else(|| feature_counts.get(&race_id).copied())
            .unwrap_or(0);
        if field > 0
            && table.fill_if_null(row, TOTAL_RUNNERS, FeatureValue::Int(field as i64))?
                == MergeOutcome::Filled
        {
            report.field_sizes_filled += 1;
        }

        if let Some(distance) = inputs.race_distance(table, row) {
            table.set(row, DISTANCE_RANGE, Some(distance_range(distance).into()))?;
            report.distance_ranges += 1;
        }

        let class_flags = inputs.race_class(table, row).map(|class| {
            let lower = class.to_lowercase();
            (
                lower.contains("maiden"),
                lower.contains("handicap") || lower.contains("hcp"),
            )
        });
        if let Some((maiden, handicap)) = class_flags {
            table.set(row, IS_MAIDEN, Some(maiden.into()))?;
            table.set(row, IS_HANDICAP, Some(handicap.into()))?;
        }

        let track = inputs.track_name(table, row);
        let category = venues.track_category(track);
        if let (Some(direction), Some(category)) = (venues.track_direction(track), category) {
            table.set(row, TRACK_DIRECTION, Some(direction.as_str().into()))?;
            table.set(row, TRACK_CATEGORY, Some(category.as_str().into()))?;
            report.track_profiles += 1;
        }
        let rating = class_rating(inputs.race_class(table, row), category);
        table.set(row, CLASS_RATING, Some(rating.into()))?;

        if has_odds {
            let odds = table.get_f64(row, WIN_ODDS).filter(|o| o.is_finite());
            let favourite = odds
                .filter(|o| *o > 0.0)
                .and_then(|o| favourites.get(&race_id).map(|best| o <= *best));
            table.set(
                row,
                ODDS_IMPLIED_PROBABILITY,
                odds.and_then(implied_probability).map(FeatureValue::Float),
            )?;
            table.set(row, IS_FAVORITE, favourite.map(FeatureValue::Bool))?;
            table.set(
                row,
                IS_LONGSHOT,
                odds.map(|o| FeatureValue::Bool(o > LONGSHOT_ODDS)),
            )?;
            if odds.is_some() {
                report.priced_rows += 1;
            }
        }

        if has_barrier {
            if let Some(barrier) = table.get_i64(row, BARRIER) {
                let total = table.get_i64(row, TOTAL_RUNNERS);
                table.set(row, BARRIER_POSITION, Some(barrier_position(barrier, total).into()))?;
                report.barrier_positions += 1;
            }
        }
    }
    Ok(report)
}
