//! Error types for the race features engine.

use thiserror::Error;

/// Result type alias for race features operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the race features engine.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid checkpoint table: {0}")]
    InvalidCheckpointTable(String),

    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    // Input errors (20-29)
    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("race {race_id} not found in race metadata")]
    RaceNotFound { race_id: String },

    #[error("missing required column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    // Reconciliation errors (30-39)
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

    // Leakage errors (40-49)
    #[error("leakage manifest violation: forbidden columns remain after removal: {columns:?}")]
    LeakageManifestViolation { columns: Vec<String> },

    #[error("invalid leakage manifest: {0}")]
    InvalidManifest(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidCheckpointTable(_) => 11,
            Error::SchemaValidation(_) => 12,
            Error::Snapshot(_) => 20,
            Error::RaceNotFound { .. } => 21,
            Error::MissingColumn { .. } => 22,
            Error::DuplicateIdentityMatch { .. } => 30,
            Error::DuplicateTelemetryRow { .. } => 31,
            Error::LeakageManifestViolation { .. } => 40,
            Error::InvalidManifest(_) => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Whether this error means the reconciliation of a race was ambiguous.
    pub fn is_identity_ambiguity(&self) -> bool {
        matches!(
            self,
            Error::DuplicateIdentityMatch { .. } | Error::DuplicateTelemetryRow { .. }
        )
    }
}
