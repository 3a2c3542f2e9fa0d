//! Column-oriented feature table.
//!
//! Rows are keyed by (race id, runner-location key) and carry the race date.
//! Every other column is named, typed and nullable. Column order is kept as
//! read so a rewritten snapshot lines up with its input.

use std::collections::HashMap;

use chrono::NaiveDate;
use rf_common::{fill_if_null, MergeOutcome, RaceId, RunnerKey};
use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// Storage type of a feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Int,
    Float,
    Text,
    Bool,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Int => write!(f, "int"),
            ColumnKind::Float => write!(f, "float"),
            ColumnKind::Text => write!(f, "text"),
            ColumnKind::Bool => write!(f, "bool"),
        }
    }
}

/// A single non-null cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl FeatureValue {
    pub fn kind(&self) -> ColumnKind {
        match self {
            FeatureValue::Int(_) => ColumnKind::Int,
            FeatureValue::Float(_) => ColumnKind::Float,
            FeatureValue::Text(_) => ColumnKind::Text,
            FeatureValue::Bool(_) => ColumnKind::Bool,
        }
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Int(v)
    }
}

impl From<u32> for FeatureValue {
    fn from(v: u32) -> Self {
        FeatureValue::Int(i64::from(v))
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Float(v)
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Bool(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        FeatureValue::Text(v)
    }
}

/// Values of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Bool(Vec<Option<bool>>),
}

impl ColumnData {
    pub fn nulls(kind: ColumnKind, len: usize) -> Self {
        match kind {
            ColumnKind::Int => ColumnData::Int(vec![None; len]),
            ColumnKind::Float => ColumnData::Float(vec![None; len]),
            ColumnKind::Text => ColumnData::Text(vec![None; len]),
            ColumnKind::Bool => ColumnData::Bool(vec![None; len]),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Int(_) => ColumnKind::Int,
            ColumnData::Float(_) => ColumnKind::Float,
            ColumnData::Text(_) => ColumnKind::Text,
            ColumnData::Bool(_) => ColumnKind::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_null(&mut self) {
        match self {
            ColumnData::Int(v) => v.push(None),
            ColumnData::Float(v) => v.push(None),
            ColumnData::Text(v) => v.push(None),
            ColumnData::Bool(v) => v.push(None),
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnData::Int(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Float(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Text(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Bool(v) => v.get(row).map_or(true, Option::is_none),
        }
    }

    pub fn get(&self, row: usize) -> Option<FeatureValue> {
        match self {
            ColumnData::Int(v) => v.get(row).copied().flatten().map(FeatureValue::Int),
            ColumnData::Float(v) => v.get(row).copied().flatten().map(FeatureValue::Float),
            ColumnData::Text(v) => v.get(row).cloned().flatten().map(FeatureValue::Text),
            ColumnData::Bool(v) => v.get(row).copied().flatten().map(FeatureValue::Bool),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Model-facing feature table.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    race_ids: Vec<RaceId>,
    runner_keys: Vec<RunnerKey>,
    race_dates: Vec<Option<NaiveDate>>,
    columns: Vec<Column>,
    index: HashMap<(RaceId, RunnerKey), usize>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.race_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.race_ids.is_empty()
    }

    /// Append a row; every existing column gets a null cell.
    pub fn push_row(
        &mut self,
        race_id: RaceId,
        runner_key: RunnerKey,
        race_date: Option<NaiveDate>,
    ) -> Result<usize, TelemetryError> {
        let key = (race_id.clone(), runner_key.clone());
        if self.index.contains_key(&key) {
            return Err(TelemetryError::DuplicateRow {
                race_id: race_id.to_string(),
                runner: runner_key.to_string(),
            });
        }
        let row = self.race_ids.len();
        self.race_ids.push(race_id);
        self.runner_keys.push(runner_key);
        self.race_dates.push(race_date);
        for column in &mut self.columns {
            column.data.push_null();
        }
        self.index.insert(key, row);
        Ok(row)
    }

    pub fn row_index(&self, race_id: &RaceId, runner_key: &RunnerKey) -> Option<usize> {
        // Keys are owned in the index; clone once per lookup.
        self.index.get(&(race_id.clone(), runner_key.clone())).copied()
    }

    pub fn race_id(&self, row: usize) -> &RaceId {
        &self.race_ids[row]
    }

    pub fn runner_key(&self, row: usize) -> &RunnerKey {
        &self.runner_keys[row]
    }

    pub fn race_date(&self, row: usize) -> Option<NaiveDate> {
        self.race_dates.get(row).copied().flatten()
    }

    pub fn race_ids(&self) -> &[RaceId] {
        &self.race_ids
    }

    pub fn runner_keys(&self) -> &[RunnerKey] {
        &self.runner_keys
    }

    pub fn race_dates(&self) -> &[Option<NaiveDate>] {
        &self.race_dates
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.position(name).map(|i| &self.columns[i].data)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Add a column with the given data. Its length must match the table.
    pub fn add_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<(), TelemetryError> {
        let name = name.into();
        if data.len() != self.len() {
            return Err(TelemetryError::ColumnType {
                table: "features".into(),
                column: name,
                expected: format!("{} rows", self.len()),
                found: format!("{} rows", data.len()),
            });
        }
        match self.position(&name) {
            Some(i) => self.columns[i].data = data,
            None => self.columns.push(Column { name, data }),
        }
        Ok(())
    }

    /// Create an all-null column if absent.
    ///
    /// An existing float column satisfies an int request, since nullable
    /// integer columns often arrive as floats.
    pub fn ensure_column(&mut self, name: &str, kind: ColumnKind) -> Result<(), TelemetryError> {
        match self.column(name).map(ColumnData::kind) {
            None => {
                self.columns.push(Column {
                    name: name.to_string(),
                    data: ColumnData::nulls(kind, self.len()),
                });
                Ok(())
            }
            Some(found) if found == kind => Ok(()),
            Some(ColumnKind::Float) if kind == ColumnKind::Int => Ok(()),
            Some(found) => Err(type_mismatch(name, kind, found)),
        }
    }

    /// Remove a column by exact name. Returns whether it existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(i) => {
                self.columns.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, row: usize, name: &str) -> Option<FeatureValue> {
        self.column(name).and_then(|c| c.get(row))
    }

    /// Integer view of a cell. Whole floats are accepted.
    pub fn get_i64(&self, row: usize, name: &str) -> Option<i64> {
        match self.get(row, name)? {
            FeatureValue::Int(v) => Some(v),
            FeatureValue::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
            _ => None,
        }
    }

    pub fn get_f64(&self, row: usize, name: &str) -> Option<f64> {
        match self.get(row, name)? {
            FeatureValue::Int(v) => Some(v as f64),
            FeatureValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_text(&self, row: usize, name: &str) -> Option<&str> {
        match self.column(name)? {
            ColumnData::Text(v) => v.get(row)?.as_deref(),
            _ => None,
        }
    }

    pub fn get_bool(&self, row: usize, name: &str) -> Option<bool> {
        match self.get(row, name)? {
            FeatureValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Overwrite a cell. The column must exist.
    pub fn set(&mut self, row: usize, name: &str, value: Option<FeatureValue>) -> Result<(), TelemetryError> {
        let data = self.column_mut(name)?;
        match (data, value) {
            (ColumnData::Int(v), None) => v[row] = None,
            (ColumnData::Float(v), None) => v[row] = None,
            (ColumnData::Text(v), None) => v[row] = None,
            (ColumnData::Bool(v), None) => v[row] = None,
            (ColumnData::Int(v), Some(FeatureValue::Int(x))) => v[row] = Some(x),
            (ColumnData::Float(v), Some(FeatureValue::Float(x))) => v[row] = Some(x),
            (ColumnData::Float(v), Some(FeatureValue::Int(x))) => v[row] = Some(x as f64),
            (ColumnData::Text(v), Some(FeatureValue::Text(x))) => v[row] = Some(x),
            (ColumnData::Bool(v), Some(FeatureValue::Bool(x))) => v[row] = Some(x),
            (data, Some(value)) => return Err(type_mismatch(name, value.kind(), data.kind())),
        }
        Ok(())
    }

    /// Populate-if-null write of one cell. The column must exist.
    pub fn fill_if_null(
        &mut self,
        row: usize,
        name: &str,
        value: FeatureValue,
    ) -> Result<MergeOutcome, TelemetryError> {
        let data = self.column_mut(name)?;
        let outcome = match (data, value) {
            (ColumnData::Int(v), FeatureValue::Int(x)) => fill_if_null(&mut v[row], x),
            (ColumnData::Float(v), FeatureValue::Float(x)) => fill_if_null(&mut v[row], x),
            (ColumnData::Float(v), FeatureValue::Int(x)) => fill_if_null(&mut v[row], x as f64),
            (ColumnData::Text(v), FeatureValue::Text(x)) => fill_if_null(&mut v[row], x),
            (ColumnData::Bool(v), FeatureValue::Bool(x)) => fill_if_null(&mut v[row], x),
            (data, value) => return Err(type_mismatch(name, value.kind(), data.kind())),
        };
        Ok(outcome)
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut ColumnData, TelemetryError> {
        let i = self
            .position(name)
            .ok_or_else(|| TelemetryError::UnknownColumn(name.to_string()))?;
        Ok(&mut self.columns[i].data)
    }
}

fn type_mismatch(name: &str, expected: ColumnKind, found: ColumnKind) -> TelemetryError {
    TelemetryError::ColumnType {
        table: "features".into(),
        column: name.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}
