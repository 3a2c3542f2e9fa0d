//! Errors raised while reading or writing snapshot tables.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("missing required column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    #[error("column '{column}' in {table} has type {found}, expected {expected}")]
    ColumnType {
        table: String,
        column: String,
        expected: String,
        found: String,
    },

    #[error("null value in key column '{column}' of {table} at row {row}")]
    NullKey {
        table: String,
        column: String,
        row: usize,
    },

    #[error("duplicate feature row for race {race_id}, runner {runner}")]
    DuplicateRow { race_id: String, runner: String },

    #[error("unknown feature column '{0}'")]
    UnknownColumn(String),
}

impl TelemetryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TelemetryError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<TelemetryError> for rf_common::Error {
    fn from(err: TelemetryError) -> Self {
        match err {
            TelemetryError::Io { path, source } => rf_common::Error::Io(std::io::Error::new(
                source.kind(),
                format!("{}: {}", path.display(), source),
            )),
            TelemetryError::MissingColumn { table, column } => {
                rf_common::Error::MissingColumn { table, column }
            }
            other => rf_common::Error::Snapshot(other.to_string()),
        }
    }
}
