//! Strictly-prior jockey and trainer records, and cross-jurisdiction history.
//!
//! Rows are walked race by race in (race date, race id) order. Every row of a
//! race reads the accumulators before any row of that race is folded in, so
//! a trainer with two runners in one race sees neither of them. Rows without
//! a race date receive nothing.

use std::collections::{BTreeSet, HashMap};

use rf_telemetry::{ColumnKind, FeatureTable, FeatureValue, TelemetryError};
use serde::Serialize;

use super::{round_to, DeriveInputs};

pub const JOCKEY_KEY: &str = "jockey_location_slug";
pub const TRAINER_KEY: &str = "trainer_location_slug";

pub const JOCKEY_WIN_RATE: &str = "jockey_win_rate";
pub const JOCKEY_PLACE_RATE: &str = "jockey_place_rate";
pub const JOCKEY_TOTAL_RIDES: &str = "jockey_total_rides";
pub const TRAINER_WIN_RATE: &str = "trainer_win_rate";
pub const TRAINER_PLACE_RATE: &str = "trainer_place_rate";
pub const TRAINER_TOTAL_RUNNERS: &str = "trainer_total_runners";
pub const IS_CROSS_REGION_HORSE: &str = "is_cross_region_horse";

/// Output columns for one kind of connection.
#[derive(Debug, Clone, Copy)]
struct Connection {
    key: &'static str,
    win_rate: &'static str,
    place_rate: &'static str,
    total: &'static str,
}

const JOCKEY: Connection = Connection {
    key: JOCKEY_KEY,
    win_rate: JOCKEY_WIN_RATE,
    place_rate: JOCKEY_PLACE_RATE,
    total: JOCKEY_TOTAL_RIDES,
};

const TRAINER: Connection = Connection {
    key: TRAINER_KEY,
    win_rate: TRAINER_WIN_RATE,
    place_rate: TRAINER_PLACE_RATE,
    total: TRAINER_TOTAL_RUNNERS,
};

/// Completed prior runs of one jockey or trainer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConnectionRecord {
    runs: u32,
    wins: u32,
    places: u32,
}

impl ConnectionRecord {
    fn rate(&self, n: u32) -> f64 {
        if self.runs > 0 {
            round_to(f64::from(n) / f64::from(self.runs), 4)
        } else {
            0.0
        }
    }

    fn observe(&mut self, final_position: Option<i64>) {
        let Some(position) = final_position else {
            return;
        };
        self.runs += 1;
        if position == 1 {
            self.wins += 1;
        }
        if position <= 3 {
            self.places += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionsReport {
    pub jockeys: usize,
    pub trainers: usize,
    pub cross_region_rows: usize,
}

/// Dated rows grouped by race, races in (race date, race id) order.
fn race_order(table: &FeatureTable) -> Vec<Vec<usize>> {
    let mut rows: Vec<usize> = (0..table.len())
        .filter(|&row| table.race_date(row).is_some())
        .collect();
    rows.sort_by(|a, b| {
        (table.race_date(*a), table.race_id(*a)).cmp(&(table.race_date(*b), table.race_id(*b)))
    });
    let mut races: Vec<Vec<usize>> = Vec::new();
    for row in rows {
        match races.last_mut() {
            Some(race) if table.race_id(race[0]) == table.race_id(row) => race.push(row),
            _ => races.push(vec![row]),
        }
    }
    races
}

fn connection_key(table: &FeatureTable, row: usize, column: &str) -> Option<String> {
    table
        .get_text(row, column)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

/// Writes one connection's columns; returns how many distinct keys were seen.
fn apply_connection(
    table: &mut FeatureTable,
    inputs: &DeriveInputs<'_>,
    races: &[Vec<usize>],
    connection: Connection,
) -> Result<usize, TelemetryError> {
    table.ensure_column(connection.win_rate, ColumnKind::Float)?;
    table.ensure_column(connection.place_rate, ColumnKind::Float)?;
    table.ensure_column(connection.total, ColumnKind::Int)?;

    let mut records: HashMap<String, ConnectionRecord> = HashMap::new();
    for race in races {
        let keyed: Vec<(usize, Option<String>)> = race
            .iter()
            .map(|&row| (row, connection_key(table, row, connection.key)))
            .collect();
        for (row, key) in &keyed {
            let record = key
                .as_ref()
                .map(|k| records.get(k).copied().unwrap_or_default());
            table.set(
                *row,
                connection.win_rate,
                record.map(|r| r.rate(r.wins).into()),
            )?;
            table.set(
                *row,
                connection.place_rate,
                record.map(|r| r.rate(r.places).into()),
            )?;
            table.set(*row, connection.total, record.map(|r| r.runs.into()))?;
        }
        for (row, key) in keyed {
            if let Some(key) = key {
                records
                    .entry(key)
                    .or_default()
                    .observe(inputs.final_position(table, row));
            }
        }
    }
    Ok(records.len())
}

/// Flags runners that raced in another jurisdiction before this race.
fn apply_cross_region(
    table: &mut FeatureTable,
    races: &[Vec<usize>],
) -> Result<usize, TelemetryError> {
    table.ensure_column(IS_CROSS_REGION_HORSE, ColumnKind::Bool)?;
    let mut seen: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut flagged = 0;
    for race in races {
        let split: Vec<(usize, Option<(String, String)>)> = race
            .iter()
            .map(|&row| {
                let parts = table
                    .runner_key(row)
                    .as_str()
                    .rsplit_once('_')
                    .map(|(slug, code)| (slug.to_string(), code.to_string()));
                (row, parts)
            })
            .collect();
        for (row, parts) in &split {
            let cross = parts.as_ref().map(|(slug, code)| {
                seen.get(slug)
                    .is_some_and(|codes| codes.iter().any(|c| c != code))
            });
            if cross == Some(true) {
                flagged += 1;
            }
            table.set(*row, IS_CROSS_REGION_HORSE, cross.map(FeatureValue::Bool))?;
        }
        for (slug, code) in split.into_iter().filter_map(|(_, parts)| parts) {
            seen.entry(slug).or_default().insert(code);
        }
    }
    Ok(flagged)
}

pub(crate) fn apply(
    table: &mut FeatureTable,
    inputs: &DeriveInputs<'_>,
) -> Result<ConnectionsReport, TelemetryError> {
    let races = race_order(table);
    let mut report = ConnectionsReport::default();
    if table.has_column(JOCKEY_KEY) {
        report.jockeys = apply_connection(table, inputs, &races, JOCKEY)?;
    }
    if table.has_column(TRAINER_KEY) {
        report.trainers = apply_connection(table, inputs, &races, TRAINER)?;
    }
    report.cross_region_rows = apply_cross_region(table, &races)?;
    Ok(report)
}
