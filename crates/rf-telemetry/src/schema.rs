//! Arrow schemas for the snapshot tables.
//!
//! Readers accept any integer width and both string encodings for these
//! columns; writers always emit the types below.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

/// Snapshot table names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableName {
    Races,
    RaceResults,
    SectionalTimes,
    TrainingDataset,
}

impl TableName {
    pub const ALL: [TableName; 4] = [
        TableName::Races,
        TableName::RaceResults,
        TableName::SectionalTimes,
        TableName::TrainingDataset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Races => "races",
            TableName::RaceResults => "race_results",
            TableName::SectionalTimes => "sectional_times",
            TableName::TrainingDataset => "race_training_dataset",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.parquet", self.as_str())
    }

    pub fn schema(&self) -> SchemaRef {
        match self {
            TableName::Races => races_schema(),
            TableName::RaceResults => race_results_schema(),
            TableName::SectionalTimes => sectional_times_schema(),
            TableName::TrainingDataset => training_key_schema(),
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column names shared by readers, writers and the engine.
pub mod columns {
    pub const RACE_ID: &str = "race_id";
    pub const RACE_DATE: &str = "race_date";
    pub const TRACK_NAME: &str = "track_name";
    pub const RACE_DISTANCE: &str = "race_distance";
    pub const TRACK_CONDITION: &str = "track_condition";
    pub const RACE_CLASS: &str = "race_class";

    pub const HORSE_NAME: &str = "horse_name";
    pub const HORSE_SLUG: &str = "horse_slug";
    pub const HORSE_NUMBER: &str = "horse_number";
    pub const FINAL_POSITION: &str = "final_position";
    pub const POSITION_800M: &str = "position_800m";
    pub const POSITION_400M: &str = "position_400m";

    pub const RUNNER_NUMBER: &str = "runner_number";
    pub const DISTANCE_M: &str = "distance_m";
    pub const POSITION: &str = "position";

    pub const HORSE_LOCATION_SLUG: &str = "horse_location_slug";
}

use columns::*;

/// `races.parquet`
pub fn races_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(RACE_ID, DataType::Utf8, false),
        Field::new(RACE_DATE, DataType::Date32, true),
        Field::new(TRACK_NAME, DataType::Utf8, true),
        Field::new(RACE_DISTANCE, DataType::Int64, true),
        Field::new(TRACK_CONDITION, DataType::Utf8, true),
        Field::new(RACE_CLASS, DataType::Utf8, true),
    ]))
}

/// `race_results.parquet`
pub fn race_results_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(RACE_ID, DataType::Utf8, false),
        Field::new(HORSE_NAME, DataType::Utf8, false),
        Field::new(HORSE_SLUG, DataType::Utf8, true),
        Field::new(HORSE_NUMBER, DataType::Utf8, true),
        Field::new(FINAL_POSITION, DataType::Int64, true),
        Field::new(POSITION_800M, DataType::Int64, true),
        Field::new(POSITION_400M, DataType::Int64, true),
    ]))
}

/// `sectional_times.parquet`, long format: one row per runner per checkpoint.
pub fn sectional_times_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(RACE_ID, DataType::Utf8, false),
        Field::new(HORSE_NAME, DataType::Utf8, false),
        Field::new(RUNNER_NUMBER, DataType::Int64, true),
        Field::new(DISTANCE_M, DataType::Int64, false),
        Field::new(POSITION, DataType::Int64, true),
    ]))
}

/// Key columns of `race_training_dataset.parquet`. Feature columns follow.
pub fn training_key_schema() -> SchemaRef {
    Arc::new(Schema::new(training_key_fields()))
}

pub(crate) fn training_key_fields() -> Vec<Field> {
    vec![
        Field::new(RACE_ID, DataType::Utf8, false),
        Field::new(HORSE_LOCATION_SLUG, DataType::Utf8, false),
        Field::new(RACE_DATE, DataType::Date32, true),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_leads_with_race_id() {
        for table in TableName::ALL {
            let schema = table.schema();
            assert_eq!(schema.field(0).name(), RACE_ID);
            assert!(!schema.field(0).is_nullable());
        }
    }

    #[test]
    fn result_checkpoints_are_nullable() {
        let schema = race_results_schema();
        for name in [POSITION_800M, POSITION_400M] {
            let field = schema.field_with_name(name).unwrap();
            assert!(field.is_nullable());
            assert_eq!(field.data_type(), &DataType::Int64);
        }
    }

    #[test]
    fn file_names() {
        assert_eq!(TableName::Races.file_name(), "races.parquet");
        assert_eq!(
            TableName::TrainingDataset.file_name(),
            "race_training_dataset.parquet"
        );
    }
}
