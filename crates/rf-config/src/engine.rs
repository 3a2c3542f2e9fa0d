//! Engine configuration types.
//!
//! Every field has a default, so a partial JSON file only needs to name the
//! settings it changes.

use rf_common::{GranularityFamily, Remaining};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::checkpoints::{CheckpointConfig, CheckpointEntry};
use crate::validate::ValidationError;
use crate::venues::{default_profiles, JurisdictionProfile, VenueConfig, VenueRegistry};
use crate::CONFIG_SCHEMA_VERSION;

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub checkpoints: CheckpointConfig,

    #[serde(default = "default_profiles")]
    pub jurisdictions: Vec<JurisdictionProfile>,

    #[serde(default)]
    pub venues: VenueConfig,

    /// Resolved checkpoint positions must satisfy `0 < position < sanity_bound`.
    #[serde(default = "default_sanity_bound")]
    pub sanity_bound: u32,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub pace: PaceConfig,

    #[serde(default)]
    pub backfill: BackfillConfig,

    #[serde(default)]
    pub leakage: LeakageConfig,
}

fn default_schema_version() -> String {
    CONFIG_SCHEMA_VERSION.to_string()
}

fn default_sanity_bound() -> u32 {
    50
}

/// Thresholds for the strictly-prior condition-preference features.
///
/// The defaults were tuned empirically upstream and have no derivation;
/// they are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HistoryConfig {
    /// Prior wet-track starts needed before a wet win rate is emitted.
    #[serde(default = "default_wet_min_starts")]
    pub wet_min_starts: u32,

    /// Prior dry-track starts needed before a dry win rate is emitted.
    #[serde(default = "default_dry_min_starts")]
    pub dry_min_starts: u32,

    /// Win rate a single qualifying category is compared against.
    #[serde(default = "default_baseline_win_rate")]
    pub baseline_win_rate: f64,

    /// Multiplier applied to the preference when today's going suits the runner.
    #[serde(default = "default_match_amplifier")]
    pub match_amplifier: f64,
}

fn default_wet_min_starts() -> u32 {
    2
}

fn default_dry_min_starts() -> u32 {
    3
}

fn default_baseline_win_rate() -> f64 {
    0.095
}

fn default_match_amplifier() -> f64 {
    1.5
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            wet_min_starts: default_wet_min_starts(),
            dry_min_starts: default_dry_min_starts(),
            baseline_win_rate: default_baseline_win_rate(),
            match_amplifier: default_match_amplifier(),
        }
    }
}

/// Upper bounds (inclusive) of the pace-style buckets, as a fraction of the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PaceConfig {
    #[serde(default = "default_leader_max")]
    pub leader_max: f64,
    #[serde(default = "default_on_pace_max")]
    pub on_pace_max: f64,
    #[serde(default = "default_midfield_max")]
    pub midfield_max: f64,
    #[serde(default = "default_off_pace_max")]
    pub off_pace_max: f64,
}

fn default_leader_max() -> f64 {
    0.2
}

fn default_on_pace_max() -> f64 {
    0.4
}

fn default_midfield_max() -> f64 {
    0.6
}

fn default_off_pace_max() -> f64 {
    0.8
}

impl Default for PaceConfig {
    fn default() -> Self {
        Self {
            leader_max: default_leader_max(),
            on_pace_max: default_on_pace_max(),
            midfield_max: default_midfield_max(),
            off_pace_max: default_off_pace_max(),
        }
    }
}

impl PaceConfig {
    pub fn cutoffs(&self) -> [f64; 4] {
        [
            self.leader_max,
            self.on_pace_max,
            self.midfield_max,
            self.off_pace_max,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BackfillConfig {
    /// Races resolved per progress batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    500
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LeakageConfig {
    /// Columns appended to the residual-suspect group of the manifest.
    #[serde(default)]
    pub extra_suspect_columns: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            description: None,
            checkpoints: CheckpointConfig::default(),
            jurisdictions: default_profiles(),
            venues: VenueConfig::default(),
            sanity_bound: default_sanity_bound(),
            history: HistoryConfig::default(),
            pace: PaceConfig::default(),
            backfill: BackfillConfig::default(),
            leakage: LeakageConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse_json(&content)
    }

    /// Parse configuration from a JSON string.
    pub fn parse_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Effective checkpoint table.
    pub fn checkpoint_entries(&self) -> Vec<CheckpointEntry> {
        self.checkpoints.effective_entries()
    }

    pub fn venue_registry(&self) -> VenueRegistry {
        VenueRegistry::new(&self.venues, &self.jurisdictions)
    }

    /// Traveled checkpoint configured for a triple, if any.
    pub fn checkpoint_for(
        &self,
        family: GranularityFamily,
        distance_m: u32,
        remaining: Remaining,
    ) -> Option<u32> {
        self.checkpoint_entries()
            .into_iter()
            .find(|e| e.key() == (family, distance_m, remaining))
            .map(|e| e.traveled_m)
    }

    /// JSON schema for the configuration file.
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(EngineConfig);
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = EngineConfig::parse_json("{}").unwrap();
        assert_eq!(config.schema_version, CONFIG_SCHEMA_VERSION);
        assert_eq!(config.sanity_bound, 50);
        assert_eq!(config.history.wet_min_starts, 2);
        assert_eq!(config.history.dry_min_starts, 3);
        assert!((config.history.baseline_win_rate - 0.095).abs() < f64::EPSILON);
        assert_eq!(config.pace.cutoffs(), [0.2, 0.4, 0.6, 0.8]);
        assert_eq!(config.backfill.batch_size, 500);
        assert_eq!(config.jurisdictions.len(), 7);
    }

    #[test]
    fn partial_json_overrides_selected_fields() {
        let json = r#"{
            "sanity_bound": 30,
            "history": {"baseline_win_rate": 0.11},
            "leakage": {"extra_suspect_columns": ["steward_flag"]}
        }"#;
        let config = EngineConfig::parse_json(json).unwrap();
        assert_eq!(config.sanity_bound, 30);
        assert!((config.history.baseline_win_rate - 0.11).abs() < f64::EPSILON);
        assert_eq!(config.history.dry_min_starts, 3);
        assert_eq!(config.leakage.extra_suspect_columns, vec!["steward_flag"]);
    }

    #[test]
    fn checkpoint_extras_parse_with_wire_names() {
        let json = r#"{
            "checkpoints": {
                "extra": [
                    {"family": "fine_200", "distance_m": 1250, "remaining": "800", "traveled_m": 400}
                ]
            }
        }"#;
        let config = EngineConfig::parse_json(json).unwrap();
        assert_eq!(
            config.checkpoint_for(GranularityFamily::Fine200, 1250, Remaining::M800),
            Some(400)
        );
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = EngineConfig::parse_json("{not json").unwrap_err();
        assert!(matches!(err, ValidationError::ParseError(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::from_file(std::path::Path::new("/nonexistent/rf.json"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::IoError(_)));
    }

    #[test]
    fn schema_mentions_sanity_bound() {
        let schema = EngineConfig::json_schema();
        assert!(schema.to_string().contains("sanity_bound"));
    }
}
