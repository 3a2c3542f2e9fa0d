//! Snapshot tables survive a Parquet write and read.

use chrono::NaiveDate;
use rf_common::{RaceId, RunnerKey};
use rf_telemetry::reader::{read_features, read_races, read_results, read_sectionals};
use rf_telemetry::writer::{write_features, write_races, write_results, write_sectionals};
use rf_telemetry::{
    ColumnData, ColumnKind, FeatureTable, Race, RaceResult, SectionalTelemetry, Snapshot,
    SnapshotPaths, TableName, WriterConfig,
};
use tempfile::TempDir;

fn sample_races() -> Vec<Race> {
    let mut race = Race::new("r1");
    race.race_date = NaiveDate::from_ymd_opt(2024, 3, 9);
    race.track_name = Some("Flemington".into());
    race.race_distance = Some(1650);
    race.track_condition = Some("Soft 6".into());
    vec![race, Race::new("r2")]
}

fn sample_results() -> Vec<RaceResult> {
    let mut a = RaceResult::new("r1", "Winx");
    a.horse_slug = Some("winx".into());
    a.horse_number = Some("7a".into());
    a.final_position = Some(1);
    a.position_800m = Some(3);
    let b = RaceResult::new("r1", "Hartnell");
    vec![a, b]
}

fn sample_features() -> FeatureTable {
    let mut table = FeatureTable::new();
    table
        .push_row(
            RaceId::from("r1"),
            RunnerKey::from("winx_AU"),
            NaiveDate::from_ymd_opt(2024, 3, 9),
        )
        .unwrap();
    table
        .push_row(RaceId::from("r1"), RunnerKey::from("hartnell_AU"), None)
        .unwrap();
    table
        .add_column("avg_speed_figure", ColumnData::Float(vec![Some(101.5), None]))
        .unwrap();
    table
        .add_column("is_first_timer", ColumnData::Bool(vec![Some(false), Some(true)]))
        .unwrap();
    table
        .add_column(
            "running_style",
            ColumnData::Text(vec![Some("leader".into()), None]),
        )
        .unwrap();
    table.ensure_column("position_800m", ColumnKind::Int).unwrap();
    table
}

#[test]
fn races_and_results_roundtrip() {
    let dir = TempDir::new().unwrap();
    let config = WriterConfig::default();
    let races_path = dir.path().join("races.parquet");
    let results_path = dir.path().join("race_results.parquet");

    write_races(&races_path, &sample_races(), &config).unwrap();
    write_results(&results_path, &sample_results(), &config).unwrap();

    assert_eq!(read_races(&races_path).unwrap(), sample_races());
    assert_eq!(read_results(&results_path).unwrap(), sample_results());
}

#[test]
fn sectionals_roundtrip_through_long_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sectional_times.parquet");
    let series = vec![
        SectionalTelemetry::new("r1", "Winx")
            .with_number(7)
            .with_position(800, 3)
            .with_position(1200, 2),
        SectionalTelemetry::new("r1", "Hartnell").with_position(800, 5),
    ];
    write_sectionals(&path, &series, &WriterConfig::default()).unwrap();
    assert_eq!(read_sectionals(&path).unwrap(), series);
}

#[test]
fn feature_table_keeps_columns_order_and_types() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("race_training_dataset.parquet");
    write_features(&path, &sample_features(), &WriterConfig::default()).unwrap();

    let table = read_features(&path).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(
        table.column_names(),
        vec!["avg_speed_figure", "is_first_timer", "running_style", "position_800m"]
    );
    assert_eq!(table.get_f64(0, "avg_speed_figure"), Some(101.5));
    assert_eq!(table.get_bool(1, "is_first_timer"), Some(true));
    assert_eq!(table.get_text(0, "running_style"), Some("leader"));
    assert_eq!(table.get_i64(0, "position_800m"), None);
    assert_eq!(
        table.column("position_800m").map(ColumnData::kind),
        Some(ColumnKind::Int)
    );
    assert_eq!(table.race_date(0), NaiveDate::from_ymd_opt(2024, 3, 9));
    assert_eq!(table.race_date(1), None);
}

#[test]
fn snapshot_save_copies_read_only_tables() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let source = SnapshotPaths::new(input.path());
    let config = WriterConfig::default();

    write_races(&source.races(), &sample_races(), &config).unwrap();
    write_results(&source.results(), &sample_results(), &config).unwrap();
    write_sectionals(&source.sectionals(), &[], &config).unwrap();
    write_features(&source.features(), &sample_features(), &config).unwrap();
    assert!(source.missing().is_empty());

    let snapshot = Snapshot::load(&source).unwrap();
    let out = SnapshotPaths::new(output.path().join("next"));
    snapshot.save(&source, &out, &config).unwrap();

    assert!(out.missing().is_empty());
    let reloaded = Snapshot::load(&out).unwrap();
    assert_eq!(reloaded.results, snapshot.results);
    assert_eq!(reloaded.races, snapshot.races);
}

#[test]
fn missing_table_is_reported() {
    let dir = TempDir::new().unwrap();
    let paths = SnapshotPaths::new(dir.path());
    assert_eq!(paths.missing().len(), TableName::ALL.len());
    assert!(Snapshot::load(&paths).is_err());
}
