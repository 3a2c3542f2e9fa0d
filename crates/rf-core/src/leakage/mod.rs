//! Leakage removal and validation.
//!
//! Removal drops every manifest column present in the feature table, then
//! re-reads the table's column set and fails hard if anything forbidden
//! survived. [`LeakageClassifier::validate`] is the same check on its own
//! and gates model training.

pub mod manifest;

use chrono::{DateTime, Utc};
use rf_telemetry::FeatureTable;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub use manifest::{
    Classification, LeakageManifest, ManifestGroup, ProvenanceGroup, MANIFEST_VERSION,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeakageError {
    #[error("forbidden columns remain in feature table: {}", columns.join(", "))]
    Violation { columns: Vec<String> },

    #[error("invalid leakage manifest: {0}")]
    InvalidManifest(String),
}

impl From<LeakageError> for rf_common::Error {
    fn from(err: LeakageError) -> Self {
        match err {
            LeakageError::Violation { columns } => {
                rf_common::Error::LeakageManifestViolation { columns }
            }
            LeakageError::InvalidManifest(msg) => rf_common::Error::InvalidManifest(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedColumn {
    pub column: String,
    pub group: ProvenanceGroup,
}

/// Removed/kept column manifest written next to the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakageReport {
    pub manifest_version: String,
    pub fingerprint: String,
    pub dropped: Vec<DroppedColumn>,
    pub kept: Vec<String>,
    pub counterparts_present: Vec<String>,
    pub counterparts_missing: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LeakageClassifier {
    manifest: LeakageManifest,
}

impl LeakageClassifier {
    pub fn new(manifest: LeakageManifest) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &LeakageManifest {
        &self.manifest
    }

    pub fn classify(&self, column: &str) -> Classification {
        self.manifest.classify(column)
    }

    /// Forbidden columns present in the table, in table order.
    pub fn forbidden_columns(&self, table: &FeatureTable) -> Vec<DroppedColumn> {
        table
            .column_names()
            .into_iter()
            .filter_map(|name| match self.classify(name) {
                Classification::Forbidden(group) => Some(DroppedColumn {
                    column: name.to_string(),
                    group,
                }),
                Classification::HistoricallySafe => None,
            })
            .collect()
    }

    /// Fail if any forbidden column is present.
    pub fn validate(&self, table: &FeatureTable) -> Result<(), LeakageError> {
        let remaining = self.forbidden_columns(table);
        if remaining.is_empty() {
            return Ok(());
        }
        let columns: Vec<String> = remaining.into_iter().map(|d| d.column).collect();
        warn!(columns = ?columns, "forbidden columns present in feature table");
        Err(LeakageError::Violation { columns })
    }

    /// Drop every forbidden column, then re-validate.
    pub fn remove(&self, table: &mut FeatureTable) -> Result<LeakageReport, LeakageError> {
        let dropped = self.forbidden_columns(table);
        for column in &dropped {
            table.drop_column(&column.column);
        }
        self.validate(table)?;

        let kept: Vec<String> = table
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let (counterparts_present, counterparts_missing): (Vec<String>, Vec<String>) = self
            .manifest
            .counterparts()
            .map(str::to_string)
            .partition(|c| kept.iter().any(|k| k.trim().eq_ignore_ascii_case(c)));

        info!(
            dropped = dropped.len(),
            kept = kept.len(),
            counterparts_missing = counterparts_missing.len(),
            "leakage removal complete"
        );
        Ok(LeakageReport {
            manifest_version: self.manifest.version.clone(),
            fingerprint: self.manifest.fingerprint(),
            dropped,
            kept,
            counterparts_present,
            counterparts_missing,
            generated_at: Utc::now(),
        })
    }
}
