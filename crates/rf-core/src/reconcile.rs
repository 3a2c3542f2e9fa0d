//! Matching raw telemetry rows to canonical result rows.
//!
//! The primary key is the runner name within the race, compared after
//! decoding HTML entity artifacts, trimming and lower-casing. Jurisdictions
//! whose profile allows it fall back to the saddle-cloth number: the digits
//! of the canonical `horse_number` against telemetry's numeric runner number.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use rf_common::RaceId;
use rf_config::JurisdictionProfile;
use rf_telemetry::RaceResult;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("ambiguous runner {key} in race {race_id}: {candidates} canonical rows match")]
    DuplicateIdentityMatch {
        race_id: String,
        key: String,
        candidates: usize,
    },

    #[error("telemetry rows {first} and {second} both reconcile to runner {runner} in race {race_id}")]
    DuplicateTelemetryRow {
        race_id: String,
        runner: String,
        first: String,
        second: String,
    },
}

impl From<ReconcileError> for rf_common::Error {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::DuplicateIdentityMatch {
                race_id,
                key,
                candidates,
            } => rf_common::Error::DuplicateIdentityMatch {
                race_id,
                key,
                candidates,
            },
            ReconcileError::DuplicateTelemetryRow {
                race_id,
                runner,
                first,
                second,
            } => rf_common::Error::DuplicateTelemetryRow {
                race_id,
                runner,
                first,
                second,
            },
        }
    }
}

/// How a telemetry row was matched. Indices point into the result slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "via", content = "row", rename_all = "snake_case")]
pub enum Match {
    Name(usize),
    RunnerNumber(usize),
    NoMatch,
}

impl Match {
    pub fn row(self) -> Option<usize> {
        match self {
            Match::Name(row) | Match::RunnerNumber(row) => Some(row),
            Match::NoMatch => None,
        }
    }
}

/// Entity artifacts seen in legacy telemetry names. `&amp;` is decoded last
/// so that an escaped entity is not decoded twice.
const ENTITIES: &[(&str, &str)] = &[
    ("&#39;", "'"),
    ("&#039;", "'"),
    ("&apos;", "'"),
    ("&rsquo;", "'"),
    ("&quot;", "\""),
    ("&amp;", "&"),
];

/// Comparable form of a runner name.
pub fn normalize_name(raw: &str) -> String {
    let mut name = raw.to_string();
    for (entity, replacement) in ENTITIES {
        if name.contains(entity) {
            name = name.replace(entity, replacement);
        }
    }
    name.trim().to_lowercase()
}

/// Digits of a saddle-cloth field, e.g. `"7a"` → 7. `None` without digits.
pub fn number_key(raw: &str) -> Option<u32> {
    static NON_DIGITS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\D+").expect("non-digit regex"));
    let digits = NON_DIGITS.replace_all(raw, "");
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Index over the canonical results of a snapshot.
#[derive(Debug)]
pub struct IdentityReconciler<'a> {
    results: &'a [RaceResult],
    by_name: HashMap<(&'a RaceId, String), Vec<usize>>,
    by_number: HashMap<(&'a RaceId, u32), Vec<usize>>,
}

impl<'a> IdentityReconciler<'a> {
    pub fn new(results: &'a [RaceResult]) -> Self {
        let mut by_name: HashMap<(&RaceId, String), Vec<usize>> = HashMap::new();
        let mut by_number: HashMap<(&RaceId, u32), Vec<usize>> = HashMap::new();
        for (i, result) in results.iter().enumerate() {
            by_name
                .entry((&result.race_id, normalize_name(&result.horse_name)))
                .or_default()
                .push(i);
            if let Some(number) = result.horse_number.as_deref().and_then(number_key) {
                by_number.entry((&result.race_id, number)).or_default().push(i);
            }
        }
        Self {
            results,
            by_name,
            by_number,
        }
    }

    /// Canonical row for one telemetry row.
    pub fn reconcile(
        &self,
        race_id: &RaceId,
        raw_name: &str,
        runner_number: Option<u32>,
        profile: &JurisdictionProfile,
    ) -> Result<Match, ReconcileError> {
        let name = normalize_name(raw_name);
        if let Some(rows) = self.by_name.get(&(race_id, name.clone())) {
            return match rows.as_slice() {
                [row] => Ok(Match::Name(*row)),
                _ => Err(ReconcileError::DuplicateIdentityMatch {
                    race_id: race_id.to_string(),
                    key: format!("name '{}'", name),
                    candidates: rows.len(),
                }),
            };
        }

        if !profile.runner_number_fallback {
            return Ok(Match::NoMatch);
        }
        let Some(number) = runner_number else {
            return Ok(Match::NoMatch);
        };
        match self.by_number.get(&(race_id, number)).map(Vec::as_slice) {
            None | Some([]) => Ok(Match::NoMatch),
            Some([row]) => Ok(Match::RunnerNumber(*row)),
            Some(rows) => Err(ReconcileError::DuplicateIdentityMatch {
                race_id: race_id.to_string(),
                key: format!("number {}", number),
                candidates: rows.len(),
            }),
        }
    }

    pub fn result(&self, row: usize) -> &'a RaceResult {
        &self.results[row]
    }
}
