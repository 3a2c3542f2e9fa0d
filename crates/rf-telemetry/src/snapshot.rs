//! Snapshot directory layout and whole-snapshot load/save.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::TelemetryError;
use crate::features::FeatureTable;
use crate::model::{Race, RaceResult, SectionalTelemetry};
use crate::reader::{read_features, read_races, read_results, read_sectionals};
use crate::schema::TableName;
use crate::writer::{write_features, write_results, WriterConfig};

/// File name of the leakage report written next to the tables.
pub const LEAKAGE_REPORT_FILE: &str = "leakage_report.json";

/// File name of the run report.
pub const RUN_REPORT_FILE: &str = "run_report.json";

/// Paths of the tables in a snapshot directory.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotPaths {
    pub root: PathBuf,
}

impl SnapshotPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table(&self, table: TableName) -> PathBuf {
        self.root.join(table.file_name())
    }

    pub fn races(&self) -> PathBuf {
        self.table(TableName::Races)
    }

    pub fn results(&self) -> PathBuf {
        self.table(TableName::RaceResults)
    }

    pub fn sectionals(&self) -> PathBuf {
        self.table(TableName::SectionalTimes)
    }

    pub fn features(&self) -> PathBuf {
        self.table(TableName::TrainingDataset)
    }

    pub fn leakage_report(&self) -> PathBuf {
        self.root.join(LEAKAGE_REPORT_FILE)
    }

    pub fn run_report(&self) -> PathBuf {
        self.root.join(RUN_REPORT_FILE)
    }

    /// Tables that are required but absent.
    pub fn missing(&self) -> Vec<TableName> {
        TableName::ALL
            .into_iter()
            .filter(|t| !self.table(*t).is_file())
            .collect()
    }
}

/// All four tables of a snapshot, in memory.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub races: Vec<Race>,
    pub results: Vec<RaceResult>,
    pub sectionals: Vec<SectionalTelemetry>,
    pub features: FeatureTable,
}

impl Snapshot {
    pub fn load(paths: &SnapshotPaths) -> Result<Self, TelemetryError> {
        if let Some(table) = paths.missing().first() {
            return Err(TelemetryError::io(
                paths.table(*table),
                std::io::Error::new(std::io::ErrorKind::NotFound, "snapshot table not found"),
            ));
        }
        let snapshot = Self {
            races: read_races(&paths.races())?,
            results: read_results(&paths.results())?,
            sectionals: read_sectionals(&paths.sectionals())?,
            features: read_features(&paths.features())?,
        };
        info!(
            root = %paths.root.display(),
            races = snapshot.races.len(),
            results = snapshot.results.len(),
            sectionals = snapshot.sectionals.len(),
            features = snapshot.features.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    /// Write the tables the engine mutates: results and features.
    ///
    /// Race metadata and sectional telemetry are read-only and are copied
    /// unchanged when the output directory differs from the input.
    pub fn save(&self, source: &SnapshotPaths, out: &SnapshotPaths, config: &WriterConfig) -> Result<(), TelemetryError> {
        std::fs::create_dir_all(&out.root).map_err(|e| TelemetryError::io(&out.root, e))?;
        write_results(&out.results(), &self.results, config)?;
        write_features(&out.features(), &self.features, config)?;
        if !same_dir(&source.root, &out.root) {
            for table in [TableName::Races, TableName::SectionalTimes] {
                let to = out.table(table);
                std::fs::copy(source.table(table), &to).map_err(|e| TelemetryError::io(&to, e))?;
            }
        }
        info!(root = %out.root.display(), "saved snapshot");
        Ok(())
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
