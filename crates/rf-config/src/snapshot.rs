//! Hashed record of the configuration a run used.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::EngineConfig;
use crate::resolve::ConfigSource;
use crate::validate::ValidationError;

/// Snapshot of the effective configuration, embedded in run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub source: ConfigSource,
    pub path: Option<PathBuf>,
    /// SHA-256 of the canonical JSON of the effective config.
    pub sha256: String,
    pub schema_version: String,
    pub captured_at: DateTime<Utc>,
}

impl ConfigSnapshot {
    pub fn capture(
        config: &EngineConfig,
        source: ConfigSource,
        path: Option<PathBuf>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            source,
            path,
            sha256: config_hash(config)?,
            schema_version: config.schema_version.clone(),
            captured_at: Utc::now(),
        })
    }
}

/// Hash of the effective configuration. Two configs that parse to the same
/// values hash the same regardless of whitespace or key order in the file.
pub fn config_hash(config: &EngineConfig) -> Result<String, ValidationError> {
    // Round-trip through Value so object keys are emitted sorted.
    let value = serde_json::to_value(config)
        .map_err(|e| ValidationError::ParseError(format!("Failed to serialize config: {}", e)))?;
    let canonical = serde_json::to_string(&value)
        .map_err(|e| ValidationError::ParseError(format!("Failed to serialize config: {}", e)))?;
    Ok(sha256_hex(canonical.as_bytes()))
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_formatting() {
        let a = EngineConfig::parse_json(r#"{"sanity_bound": 50}"#).unwrap();
        let b = EngineConfig::parse_json("{\n  \"sanity_bound\" :50\n}").unwrap();
        assert_eq!(config_hash(&a).unwrap(), config_hash(&b).unwrap());
    }

    #[test]
    fn hash_changes_with_values() {
        let a = EngineConfig::default();
        let mut b = EngineConfig::default();
        b.history.baseline_win_rate = 0.1;
        assert_ne!(config_hash(&a).unwrap(), config_hash(&b).unwrap());
    }

    #[test]
    fn snapshot_records_source() {
        let snapshot =
            ConfigSnapshot::capture(&EngineConfig::default(), ConfigSource::Default, None).unwrap();
        assert_eq!(snapshot.sha256.len(), 64);
        assert_eq!(snapshot.schema_version, crate::CONFIG_SCHEMA_VERSION);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["source"], "default");
    }
}
