//! Parquet readers for the snapshot tables.

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::compute::{can_cast_types, cast, concat_batches};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rf_common::{RaceId, RunnerKey};
use tracing::debug;

use crate::error::TelemetryError;
use crate::features::{ColumnData, ColumnKind, FeatureTable};
use crate::model::{group_sectionals, Race, RaceResult, SectionalRow, SectionalTelemetry};
use crate::schema::columns::*;
use crate::schema::TableName;

/// Read a whole Parquet file into one record batch.
pub fn read_table(path: &Path) -> Result<RecordBatch, TelemetryError> {
    let file = File::open(path).map_err(|e| TelemetryError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;
    debug!(path = %path.display(), rows = batch.num_rows(), "read parquet table");
    Ok(batch)
}

pub fn read_races(path: &Path) -> Result<Vec<Race>, TelemetryError> {
    let batch = read_table(path)?;
    races_from_batch(&batch)
}

pub fn read_results(path: &Path) -> Result<Vec<RaceResult>, TelemetryError> {
    let batch = read_table(path)?;
    results_from_batch(&batch)
}

pub fn read_sectionals(path: &Path) -> Result<Vec<SectionalTelemetry>, TelemetryError> {
    let batch = read_table(path)?;
    sectionals_from_batch(&batch)
}

pub fn read_features(path: &Path) -> Result<FeatureTable, TelemetryError> {
    let batch = read_table(path)?;
    features_from_batch(&batch)
}

pub fn races_from_batch(batch: &RecordBatch) -> Result<Vec<Race>, TelemetryError> {
    let t = TableName::Races;
    let ids = key_values(batch, t, RACE_ID)?;
    let dates = optional(batch, RACE_DATE, |c| date_values(c, t, RACE_DATE))?;
    let tracks = optional(batch, TRACK_NAME, |c| text_values(c, t, TRACK_NAME))?;
    let distances = optional(batch, RACE_DISTANCE, |c| int_values(c, t, RACE_DISTANCE))?;
    let conditions = optional(batch, TRACK_CONDITION, |c| text_values(c, t, TRACK_CONDITION))?;
    let classes = optional(batch, RACE_CLASS, |c| text_values(c, t, RACE_CLASS))?;

    Ok((0..batch.num_rows())
        .map(|i| Race {
            race_id: RaceId::new(ids[i].clone()),
            race_date: dates.as_ref().and_then(|v| v[i]),
            track_name: tracks.as_ref().and_then(|v| v[i].clone()),
            race_distance: distances.as_ref().and_then(|v| v[i]).and_then(to_u32),
            track_condition: conditions.as_ref().and_then(|v| v[i].clone()),
            race_class: classes.as_ref().and_then(|v| v[i].clone()),
        })
        .collect())
}

pub fn results_from_batch(batch: &RecordBatch) -> Result<Vec<RaceResult>, TelemetryError> {
    let t = TableName::RaceResults;
    let ids = key_values(batch, t, RACE_ID)?;
    let names = key_values(batch, t, HORSE_NAME)?;
    let slugs = optional(batch, HORSE_SLUG, |c| text_values(c, t, HORSE_SLUG))?;
    let numbers = optional(batch, HORSE_NUMBER, |c| text_values(c, t, HORSE_NUMBER))?;
    let finals = optional(batch, FINAL_POSITION, |c| int_values(c, t, FINAL_POSITION))?;
    let p800 = optional(batch, POSITION_800M, |c| int_values(c, t, POSITION_800M))?;
    let p400 = optional(batch, POSITION_400M, |c| int_values(c, t, POSITION_400M))?;

    let int_at = |v: &Option<Vec<Option<i64>>>, i: usize| v.as_ref().and_then(|v| v[i]).and_then(to_u32);
    Ok((0..batch.num_rows())
        .map(|i| RaceResult {
            race_id: RaceId::new(ids[i].clone()),
            horse_name: names[i].clone(),
            horse_slug: slugs.as_ref().and_then(|v| v[i].clone()),
            horse_number: numbers.as_ref().and_then(|v| v[i].clone()),
            final_position: int_at(&finals, i),
            position_800m: int_at(&p800, i),
            position_400m: int_at(&p400, i),
        })
        .collect())
}

pub fn sectionals_from_batch(batch: &RecordBatch) -> Result<Vec<SectionalTelemetry>, TelemetryError> {
    let t = TableName::SectionalTimes;
    let ids = key_values(batch, t, RACE_ID)?;
    let names = key_values(batch, t, HORSE_NAME)?;
    let numbers = optional(batch, RUNNER_NUMBER, |c| int_values(c, t, RUNNER_NUMBER))?;
    let distances = int_values(required(batch, t, DISTANCE_M)?, t, DISTANCE_M)?;
    let positions = int_values(required(batch, t, POSITION)?, t, POSITION)?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        // A checkpoint without a distance cannot be keyed.
        let Some(distance_m) = distances[i].and_then(to_u32) else {
            continue;
        };
        rows.push(SectionalRow {
            race_id: RaceId::new(ids[i].clone()),
            horse_name: names[i].clone(),
            runner_number: numbers.as_ref().and_then(|v| v[i]).and_then(to_u32),
            distance_m,
            position: positions[i].and_then(to_u32),
        });
    }
    Ok(group_sectionals(rows))
}

pub fn features_from_batch(batch: &RecordBatch) -> Result<FeatureTable, TelemetryError> {
    let t = TableName::TrainingDataset;
    let ids = key_values(batch, t, RACE_ID)?;
    let keys = key_values(batch, t, HORSE_LOCATION_SLUG)?;
    let dates = optional(batch, RACE_DATE, |c| date_values(c, t, RACE_DATE))?;

    let mut table = FeatureTable::new();
    for i in 0..batch.num_rows() {
        table.push_row(
            RaceId::new(ids[i].clone()),
            RunnerKey(keys[i].clone()),
            dates.as_ref().and_then(|v| v[i]),
        )?;
    }

    let schema = batch.schema();
    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        let name = field.name().as_str();
        if matches!(name, RACE_ID | HORSE_LOCATION_SLUG | RACE_DATE) {
            continue;
        }
        let data = match feature_kind(array.data_type()) {
            Some(ColumnKind::Int) => ColumnData::Int(int_values(array, t, name)?),
            Some(ColumnKind::Float) => ColumnData::Float(float_values(array, t, name)?),
            Some(ColumnKind::Bool) => ColumnData::Bool(bool_values(array, t, name)?),
            Some(ColumnKind::Text) => ColumnData::Text(text_values(array, t, name)?),
            None => return Err(type_error(t, name, "int, float, text or bool", array.data_type())),
        };
        table.add_column(name, data)?;
    }
    Ok(table)
}

/// Storage kind a feature column of this Arrow type is read into.
fn feature_kind(data_type: &DataType) -> Option<ColumnKind> {
    if data_type.is_integer() {
        Some(ColumnKind::Int)
    } else if data_type.is_floating() || matches!(data_type, DataType::Decimal128(..)) {
        Some(ColumnKind::Float)
    } else if data_type == &DataType::Boolean {
        Some(ColumnKind::Bool)
    } else if can_cast_types(data_type, &DataType::Utf8) {
        Some(ColumnKind::Text)
    } else {
        None
    }
}

// ── Column helpers ──────────────────────────────────────────────────

fn required<'a>(batch: &'a RecordBatch, table: TableName, name: &str) -> Result<&'a ArrayRef, TelemetryError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| TelemetryError::MissingColumn {
            table: table.to_string(),
            column: name.to_string(),
        })
}

fn optional<T>(
    batch: &RecordBatch,
    name: &str,
    read: impl FnOnce(&ArrayRef) -> Result<T, TelemetryError>,
) -> Result<Option<T>, TelemetryError> {
    batch.column_by_name(name).map(read).transpose()
}

/// Non-null text key column.
fn key_values(batch: &RecordBatch, table: TableName, name: &str) -> Result<Vec<String>, TelemetryError> {
    text_values(required(batch, table, name)?, table, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| TelemetryError::NullKey {
                table: table.to_string(),
                column: name.to_string(),
                row,
            })
        })
        .collect()
}

fn int_values(array: &ArrayRef, table: TableName, name: &str) -> Result<Vec<Option<i64>>, TelemetryError> {
    if !array.data_type().is_numeric() {
        return Err(type_error(table, name, "integer", array.data_type()));
    }
    let cast_array = cast(array.as_ref(), &DataType::Int64)?;
    let values = downcast::<Int64Array>(&cast_array, table, name, "Int64")?;
    Ok(values.iter().collect())
}

fn float_values(array: &ArrayRef, table: TableName, name: &str) -> Result<Vec<Option<f64>>, TelemetryError> {
    let cast_array = cast(array.as_ref(), &DataType::Float64)?;
    let values = downcast::<Float64Array>(&cast_array, table, name, "Float64")?;
    Ok(values.iter().collect())
}

fn bool_values(array: &ArrayRef, table: TableName, name: &str) -> Result<Vec<Option<bool>>, TelemetryError> {
    let values = downcast::<BooleanArray>(array, table, name, "Boolean")?;
    Ok(values.iter().collect())
}

fn text_values(array: &ArrayRef, table: TableName, name: &str) -> Result<Vec<Option<String>>, TelemetryError> {
    if !can_cast_types(array.data_type(), &DataType::Utf8) {
        return Err(type_error(table, name, "Utf8", array.data_type()));
    }
    let cast_array = cast(array.as_ref(), &DataType::Utf8)?;
    let values = downcast::<StringArray>(&cast_array, table, name, "Utf8")?;
    Ok(values.iter().map(|v| v.map(str::to_string)).collect())
}

fn date_values(array: &ArrayRef, table: TableName, name: &str) -> Result<Vec<Option<NaiveDate>>, TelemetryError> {
    if !can_cast_types(array.data_type(), &DataType::Date32) {
        return Err(type_error(table, name, "Date32", array.data_type()));
    }
    let cast_array = cast(array.as_ref(), &DataType::Date32)?;
    let values = downcast::<Date32Array>(&cast_array, table, name, "Date32")?;
    Ok((0..values.len())
        .map(|i| {
            if values.is_null(i) {
                None
            } else {
                values.value_as_date(i)
            }
        })
        .collect())
}

fn downcast<'a, T: 'static>(
    array: &'a ArrayRef,
    table: TableName,
    name: &str,
    expected: &str,
) -> Result<&'a T, TelemetryError> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| type_error(table, name, expected, array.data_type()))
}

fn type_error(table: TableName, name: &str, expected: &str, found: &DataType) -> TelemetryError {
    TelemetryError::ColumnType {
        table: table.to_string(),
        column: name.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

fn to_u32(v: i64) -> Option<u32> {
    u32::try_from(v).ok()
}
