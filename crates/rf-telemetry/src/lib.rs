//! Race features tabular storage.
//!
//! This crate provides:
//! - Row types for races, results and sectional telemetry
//! - The column-oriented feature table
//! - Arrow schema definitions for the snapshot tables
//! - Parquet readers and writers, and the snapshot directory layout

pub mod error;
pub mod features;
pub mod model;
pub mod reader;
pub mod schema;
pub mod snapshot;
pub mod writer;

pub use error::TelemetryError;
pub use features::{Column, ColumnData, ColumnKind, FeatureTable, FeatureValue};
pub use model::{group_sectionals, Race, RaceResult, SectionalRow, SectionalTelemetry};
pub use schema::{columns, TableName};
pub use snapshot::{Snapshot, SnapshotPaths, LEAKAGE_REPORT_FILE, RUN_REPORT_FILE};
pub use writer::WriterConfig;

/// Schema version for snapshot tables.
pub const SCHEMA_VERSION: &str = "1.0.0";
