//! Semantic validation of engine configuration.
//!
//! Parsing only checks shape. Validation checks the values and collects
//! every problem instead of stopping at the first one.

use std::collections::HashSet;

use rf_common::schema::is_compatible;
use rf_common::Jurisdiction;
use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineConfig;

/// Configuration loading and validation errors.
#[derive(Debug, Clone, Error, Serialize)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("schema version {found} is not compatible with {expected}")]
    IncompatibleSchema { found: String, expected: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Collected validation outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error, if any, for callers that only need a pass/fail.
    pub fn into_result(self) -> Result<(), ValidationError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Validate every section of the configuration.
pub fn validate_config(config: &EngineConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !is_compatible(&config.schema_version) {
        result.errors.push(ValidationError::IncompatibleSchema {
            found: config.schema_version.clone(),
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
        });
    }

    if config.sanity_bound < 2 {
        result.errors.push(ValidationError::invalid(
            "sanity_bound",
            "must be at least 2 so that position 1 is accepted",
        ));
    }

    validate_checkpoints(config, &mut result);
    validate_jurisdictions(config, &mut result);
    validate_history(config, &mut result);
    validate_pace(config, &mut result);

    if config.backfill.batch_size == 0 {
        result
            .errors
            .push(ValidationError::invalid("backfill.batch_size", "must be positive"));
    }

    for venue in &config.venues.extra {
        if venue.track_name.trim().is_empty() {
            result
                .errors
                .push(ValidationError::invalid("venues.extra", "empty track name"));
        }
    }

    for column in &config.leakage.extra_suspect_columns {
        if column.trim().is_empty() {
            result.errors.push(ValidationError::invalid(
                "leakage.extra_suspect_columns",
                "empty column name",
            ));
        }
    }

    result
}

fn validate_checkpoints(config: &EngineConfig, result: &mut ValidationResult) {
    let mut seen = HashSet::new();
    for entry in &config.checkpoints.extra {
        if let Err(message) = entry.validate() {
            result
                .errors
                .push(ValidationError::invalid("checkpoints.extra", message));
        }
        if !seen.insert(entry.key()) {
            result.errors.push(ValidationError::invalid(
                "checkpoints.extra",
                format!(
                    "duplicate entry for {}m / {} / {}",
                    entry.distance_m, entry.family, entry.remaining
                ),
            ));
        }
        if entry.distance_m % 50 != 0 {
            result.warnings.push(format!(
                "checkpoint distance {}m is not a multiple of 50m",
                entry.distance_m
            ));
        }
    }
    if config.checkpoint_entries().is_empty() {
        result.errors.push(ValidationError::invalid(
            "checkpoints",
            "table is empty; no checkpoint could ever resolve",
        ));
    }
}

fn validate_jurisdictions(config: &EngineConfig, result: &mut ValidationResult) {
    let mut seen = HashSet::new();
    for profile in &config.jurisdictions {
        if !seen.insert(profile.jurisdiction) {
            result.errors.push(ValidationError::invalid(
                "jurisdictions",
                format!("duplicate profile for {}", profile.jurisdiction),
            ));
        }
    }
    let missing: Vec<&str> = Jurisdiction::ALL
        .iter()
        .filter(|j| !seen.contains(*j))
        .map(|j| j.code())
        .collect();
    if !missing.is_empty() {
        result.warnings.push(format!(
            "no profile for {}; built-in defaults apply",
            missing.join(", ")
        ));
    }
}

fn validate_history(config: &EngineConfig, result: &mut ValidationResult) {
    let history = &config.history;
    if history.wet_min_starts == 0 {
        result.errors.push(ValidationError::invalid(
            "history.wet_min_starts",
            "must be at least 1",
        ));
    }
    if history.dry_min_starts == 0 {
        result.errors.push(ValidationError::invalid(
            "history.dry_min_starts",
            "must be at least 1",
        ));
    }
    if !(0.0..=1.0).contains(&history.baseline_win_rate) {
        result.errors.push(ValidationError::invalid(
            "history.baseline_win_rate",
            format!("must be in [0, 1], got {}", history.baseline_win_rate),
        ));
    }
    if !history.match_amplifier.is_finite() || history.match_amplifier < 1.0 {
        result.errors.push(ValidationError::invalid(
            "history.match_amplifier",
            format!("must be >= 1, got {}", history.match_amplifier),
        ));
    }
}

fn validate_pace(config: &EngineConfig, result: &mut ValidationResult) {
    let cutoffs = config.pace.cutoffs();
    let increasing = cutoffs.windows(2).all(|w| w[0] < w[1]);
    let in_range = cutoffs.iter().all(|c| *c > 0.0 && *c <= 1.0);
    if !increasing || !in_range {
        result.errors.push(ValidationError::invalid(
            "pace",
            format!(
                "bucket cut-offs must be strictly increasing within (0, 1], got {:?}",
                cutoffs
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoints::CheckpointEntry;
    use crate::venues::JurisdictionProfile;
    use rf_common::{GranularityFamily, Remaining};

    #[test]
    fn default_config_is_valid() {
        let result = validate_config(&EngineConfig::default());
        assert!(result.is_ok(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn collects_every_error() {
        let mut config = EngineConfig::default();
        config.sanity_bound = 1;
        config.history.baseline_win_rate = 1.5;
        config.history.match_amplifier = 0.5;
        config.backfill.batch_size = 0;
        let result = validate_config(&config);
        assert_eq!(result.errors.len(), 4);
    }

    #[test]
    fn rejects_bad_checkpoint_extra() {
        let mut config = EngineConfig::default();
        config.checkpoints.extra = vec![
            CheckpointEntry::new(GranularityFamily::Coarse400, 1400, Remaining::M800, 600),
            CheckpointEntry::new(GranularityFamily::Fine200, 1250, Remaining::M800, 400),
            CheckpointEntry::new(GranularityFamily::Fine200, 1250, Remaining::M800, 400),
        ];
        let result = validate_config(&config);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn rejects_non_increasing_pace() {
        let mut config = EngineConfig::default();
        config.pace.on_pace_max = 0.1;
        let err = validate_config(&config).into_result().unwrap_err();
        assert!(err.to_string().contains("pace"));
    }

    #[test]
    fn rejects_incompatible_schema() {
        let mut config = EngineConfig::default();
        config.schema_version = "2.0.0".into();
        let result = validate_config(&config);
        assert!(matches!(
            result.errors[0],
            ValidationError::IncompatibleSchema { .. }
        ));
    }

    #[test]
    fn duplicate_profile_is_error_missing_is_warning() {
        let mut config = EngineConfig::default();
        config.jurisdictions = vec![
            JurisdictionProfile {
                jurisdiction: Jurisdiction::HongKong,
                family: GranularityFamily::Fine200,
                runner_number_fallback: true,
            };
            2
        ];
        let result = validate_config(&config);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn empty_table_is_error() {
        let mut config = EngineConfig::default();
        config.checkpoints.include_builtin = false;
        assert!(!validate_config(&config).is_ok());
    }
}
