//! Parquet writers for the snapshot tables.
//!
//! Files are written to a sibling temporary path and renamed into place, so
//! a failed write never leaves a truncated table behind.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tracing::debug;

use crate::error::TelemetryError;
use crate::features::{ColumnData, FeatureTable};
use crate::model::{Race, RaceResult, SectionalTelemetry};
use crate::schema::{
    race_results_schema, races_schema, sectional_times_schema, training_key_fields,
};

/// Days from 0001-01-01 to 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Writer settings.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub compression: Compression,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::ZSTD(ZstdLevel::default()),
        }
    }
}

/// Write one record batch to `path`.
pub fn write_table(path: &Path, batch: &RecordBatch, config: &WriterConfig) -> Result<(), TelemetryError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TelemetryError::io(parent, e))?;
    }
    let tmp = tmp_path(path);
    let file = File::create(&tmp).map_err(|e| TelemetryError::io(&tmp, e))?;
    let props = WriterProperties::builder()
        .set_compression(config.compression)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    std::fs::rename(&tmp, path).map_err(|e| TelemetryError::io(path, e))?;
    debug!(path = %path.display(), rows = batch.num_rows(), "wrote parquet table");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn write_races(path: &Path, races: &[Race], config: &WriterConfig) -> Result<(), TelemetryError> {
    write_table(path, &races_to_batch(races)?, config)
}

pub fn write_results(path: &Path, results: &[RaceResult], config: &WriterConfig) -> Result<(), TelemetryError> {
    write_table(path, &results_to_batch(results)?, config)
}

pub fn write_sectionals(
    path: &Path,
    sectionals: &[SectionalTelemetry],
    config: &WriterConfig,
) -> Result<(), TelemetryError> {
    write_table(path, &sectionals_to_batch(sectionals)?, config)
}

pub fn write_features(path: &Path, table: &FeatureTable, config: &WriterConfig) -> Result<(), TelemetryError> {
    write_table(path, &features_to_batch(table)?, config)
}

// ── Batch builders ──────────────────────────────────────────────────

fn strings<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(StringArray::from(values.collect::<Vec<_>>()))
}

fn ints(values: impl Iterator<Item = Option<i64>>) -> ArrayRef {
    Arc::new(Int64Array::from(values.collect::<Vec<_>>()))
}

fn dates(values: impl Iterator<Item = Option<NaiveDate>>) -> ArrayRef {
    Arc::new(Date32Array::from(
        values
            .map(|d| d.map(|d| d.num_days_from_ce() - EPOCH_DAYS_FROM_CE))
            .collect::<Vec<_>>(),
    ))
}

pub fn races_to_batch(races: &[Race]) -> Result<RecordBatch, TelemetryError> {
    let columns = vec![
        strings(races.iter().map(|r| Some(r.race_id.as_str()))),
        dates(races.iter().map(|r| r.race_date)),
        strings(races.iter().map(|r| r.track_name.as_deref())),
        ints(races.iter().map(|r| r.race_distance.map(i64::from))),
        strings(races.iter().map(|r| r.track_condition.as_deref())),
        strings(races.iter().map(|r| r.race_class.as_deref())),
    ];
    Ok(RecordBatch::try_new(races_schema(), columns)?)
}

pub fn results_to_batch(results: &[RaceResult]) -> Result<RecordBatch, TelemetryError> {
    let columns = vec![
        strings(results.iter().map(|r| Some(r.race_id.as_str()))),
        strings(results.iter().map(|r| Some(r.horse_name.as_str()))),
        strings(results.iter().map(|r| r.horse_slug.as_deref())),
        strings(results.iter().map(|r| r.horse_number.as_deref())),
        ints(results.iter().map(|r| r.final_position.map(i64::from))),
        ints(results.iter().map(|r| r.position_800m.map(i64::from))),
        ints(results.iter().map(|r| r.position_400m.map(i64::from))),
    ];
    Ok(RecordBatch::try_new(race_results_schema(), columns)?)
}

/// Flatten series back to the long format.
pub fn sectionals_to_batch(sectionals: &[SectionalTelemetry]) -> Result<RecordBatch, TelemetryError> {
    let rows: Vec<(&SectionalTelemetry, u32, u32)> = sectionals
        .iter()
        .flat_map(|s| s.positions.iter().map(move |(d, p)| (s, *d, *p)))
        .collect();
    let columns = vec![
        strings(rows.iter().map(|(s, _, _)| Some(s.race_id.as_str()))),
        strings(rows.iter().map(|(s, _, _)| Some(s.horse_name.as_str()))),
        ints(rows.iter().map(|(s, _, _)| s.runner_number.map(i64::from))),
        ints(rows.iter().map(|(_, d, _)| Some(i64::from(*d)))),
        ints(rows.iter().map(|(_, _, p)| Some(i64::from(*p)))),
    ];
    Ok(RecordBatch::try_new(sectional_times_schema(), columns)?)
}

pub fn features_to_batch(table: &FeatureTable) -> Result<RecordBatch, TelemetryError> {
    let mut fields = training_key_fields();
    let mut columns = vec![
        strings(table.race_ids().iter().map(|r| Some(r.as_str()))),
        strings(table.runner_keys().iter().map(|k| Some(k.as_str()))),
        dates(table.race_dates().iter().copied()),
    ];
    for column in table.columns() {
        let (data_type, array): (DataType, ArrayRef) = match &column.data {
            ColumnData::Int(v) => (DataType::Int64, Arc::new(Int64Array::from(v.clone()))),
            ColumnData::Float(v) => (DataType::Float64, Arc::new(Float64Array::from(v.clone()))),
            ColumnData::Text(v) => (
                DataType::Utf8,
                strings(v.iter().map(|s| s.as_deref())),
            ),
            ColumnData::Bool(v) => (DataType::Boolean, Arc::new(BooleanArray::from(v.clone()))),
        };
        fields.push(Field::new(column.name.as_str(), data_type, true));
        columns.push(array);
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
