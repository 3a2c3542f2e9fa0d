//! End-to-end run over a snapshot directory.
//!
//! Stages run in order, each reading and writing the whole in-memory
//! snapshot: backfill → sync → derive → leakage. Nothing is written to disk
//! until every stage has succeeded, so a failed run leaves the snapshot as
//! it was and can simply be retried.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rf_common::RunId;
use rf_config::{ConfigSnapshot, EngineConfig, ValidationError};
use rf_telemetry::{Snapshot, SnapshotPaths, TelemetryError, WriterConfig};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span};

use crate::backfill::{BackfillReport, SectionalBackfiller};
use crate::derive::{DeriveReport, DerivedFeatureCalculator};
use crate::exit_codes::ExitCode;
use crate::leakage::{LeakageClassifier, LeakageError, LeakageManifest, LeakageReport};
use crate::progress::{elapsed_ms, ProgressEvent, ProgressSink, Stage};
use crate::reconcile::ReconcileError;
use crate::sync::{FeatureSyncer, SyncReport};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ValidationError),

    #[error("invalid checkpoint table: {0}")]
    CheckpointTable(String),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Leakage(#[from] LeakageError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            PipelineError::Config(_) | PipelineError::CheckpointTable(_) => ExitCode::ConfigError,
            PipelineError::Telemetry(TelemetryError::Io { .. }) => ExitCode::IoError,
            PipelineError::Telemetry(_) => ExitCode::InputError,
            PipelineError::Reconcile(_) => ExitCode::IdentityAmbiguity,
            PipelineError::Leakage(LeakageError::Violation { .. }) => ExitCode::LeakageViolation,
            PipelineError::Leakage(LeakageError::InvalidManifest(_)) => ExitCode::ConfigError,
            PipelineError::Io { .. } | PipelineError::Json(_) => ExitCode::IoError,
        }
    }
}

impl From<PipelineError> for rf_common::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Config(e) => rf_common::Error::Config(e.to_string()),
            PipelineError::CheckpointTable(msg) => rf_common::Error::InvalidCheckpointTable(msg),
            PipelineError::Telemetry(e) => e.into(),
            PipelineError::Reconcile(e) => e.into(),
            PipelineError::Leakage(e) => e.into(),
            PipelineError::Io { path, source } => rf_common::Error::Io(std::io::Error::new(
                source.kind(),
                format!("{}: {}", path.display(), source),
            )),
            PipelineError::Json(e) => rf_common::Error::Json(e),
        }
    }
}

/// Per-stage reports of one in-memory run.
#[derive(Debug, Clone, Serialize)]
pub struct StageReports {
    pub backfill: BackfillReport,
    pub sync: SyncReport,
    pub derive: DeriveReport,
    pub leakage: Option<LeakageReport>,
}

/// Summary written to `run_report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub schema_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub config: ConfigSnapshot,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(flatten)]
    pub stages: StageReports,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub snapshot: PathBuf,
    /// Output directory; the input snapshot is updated in place when unset.
    pub out: Option<PathBuf>,
    pub skip_leakage: bool,
    pub writer: WriterConfig,
}

impl RunOptions {
    pub fn new(snapshot: impl Into<PathBuf>) -> Self {
        Self {
            snapshot: snapshot.into(),
            out: None,
            skip_leakage: false,
            writer: WriterConfig::default(),
        }
    }
}

pub struct Pipeline {
    config_snapshot: ConfigSnapshot,
    backfiller: SectionalBackfiller,
    syncer: FeatureSyncer,
    calculator: DerivedFeatureCalculator,
    classifier: LeakageClassifier,
}

impl Pipeline {
    pub fn new(config: &EngineConfig, config_snapshot: ConfigSnapshot) -> Result<Self, PipelineError> {
        let backfiller = SectionalBackfiller::from_config(config)
            .map_err(|e| PipelineError::CheckpointTable(e.to_string()))?;
        let manifest = LeakageManifest::with_extra_suspects(&config.leakage.extra_suspect_columns)?;
        Ok(Self {
            config_snapshot,
            backfiller,
            syncer: FeatureSyncer::new(config.venue_registry()),
            calculator: DerivedFeatureCalculator::from_config(config),
            classifier: LeakageClassifier::new(manifest),
        })
    }

    pub fn classifier(&self) -> &LeakageClassifier {
        &self.classifier
    }

    /// Run every stage against an in-memory snapshot.
    pub fn run_in_memory(
        &self,
        snapshot: &mut Snapshot,
        skip_leakage: bool,
        progress: &dyn ProgressSink,
    ) -> Result<StageReports, PipelineError> {
        let backfill = {
            let _span = info_span!("backfill").entered();
            self.backfiller.run(
                &snapshot.races,
                &snapshot.sectionals,
                &mut snapshot.results,
                progress,
            )?
        };
        let sync = {
            let _span = info_span!("sync").entered();
            self.syncer.sync(
                &snapshot.results,
                &snapshot.races,
                &mut snapshot.features,
                progress,
            )?
        };
        let derive = {
            let _span = info_span!("derive").entered();
            self.calculator.run(
                &snapshot.races,
                &snapshot.results,
                &mut snapshot.features,
                progress,
            )?
        };
        let leakage = if skip_leakage {
            info!("leakage removal skipped");
            None
        } else {
            let _span = info_span!("leakage").entered();
            let started = Instant::now();
            progress.emit(&ProgressEvent::StageStarted {
                stage: Stage::Leakage,
                target: None,
                total: snapshot.features.columns().len(),
            });
            let report = self.classifier.remove(&mut snapshot.features)?;
            progress.emit(&ProgressEvent::StageCompleted {
                stage: Stage::Leakage,
                target: None,
                changed: report.dropped.len(),
                elapsed_ms: elapsed_ms(started),
            });
            Some(report)
        };
        Ok(StageReports {
            backfill,
            sync,
            derive,
            leakage,
        })
    }

    /// Load, run, and save a snapshot directory with its reports.
    pub fn run(&self, options: &RunOptions, progress: &dyn ProgressSink) -> Result<RunReport, PipelineError> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let started = Instant::now();
        let _span = info_span!("run", run_id = %run_id).entered();

        let input = SnapshotPaths::new(&options.snapshot);
        let output = SnapshotPaths::new(options.out.as_deref().unwrap_or(options.snapshot.as_path()));
        let mut snapshot = Snapshot::load(&input)?;
        let stages = self.run_in_memory(&mut snapshot, options.skip_leakage, progress)?;

        snapshot.save(&input, &output, &options.writer)?;
        if let Some(leakage) = &stages.leakage {
            write_json(&output.leakage_report(), leakage)?;
        }
        let report = RunReport {
            run_id,
            schema_version: rf_common::SCHEMA_VERSION.to_string(),
            started_at,
            finished_at: Utc::now(),
            duration_ms: elapsed_ms(started),
            config: self.config_snapshot.clone(),
            input_dir: input.root.clone(),
            output_dir: output.root.clone(),
            stages,
        };
        write_json(&output.run_report(), &report)?;
        info!(
            output = %output.root.display(),
            written = report.stages.backfill.written(),
            duration_ms = report.duration_ms,
            "run complete"
        );
        Ok(report)
    }
}

/// Pretty JSON written via a temporary file and rename.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let body = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body).map_err(|source| PipelineError::Io {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;
    use rf_common::{RaceId, RunnerKey};
    use rf_config::ConfigSource;
    use rf_telemetry::{ColumnData, Race, RaceResult, SectionalTelemetry};

    fn pipeline(config: &EngineConfig) -> Pipeline {
        let snapshot = ConfigSnapshot::capture(config, ConfigSource::Default, None).unwrap();
        Pipeline::new(config, snapshot).unwrap()
    }

    fn snapshot() -> Snapshot {
        let mut race = Race::new("r1");
        race.track_name = Some("Flemington".into());
        race.race_distance = Some(1200);
        race.race_date = chrono::NaiveDate::from_ymd_opt(2024, 3, 2);
        let mut result = RaceResult::new("r1", "Winx");
        result.horse_slug = Some("winx".into());
        result.final_position = Some(1);
        let mut features = rf_telemetry::FeatureTable::new();
        features
            .push_row(RaceId::from("r1"), RunnerKey::from("winx_AU"), race.race_date)
            .unwrap();
        features
            .add_column("final_position", ColumnData::Int(vec![Some(1)]))
            .unwrap();
        // Two more starters without slugs make a field of three.
        let others = vec![RaceResult::new("r1", "Alpha"), RaceResult::new("r1", "Beta")];
        Snapshot {
            races: vec![race],
            results: std::iter::once(result).chain(others).collect(),
            sectionals: vec![SectionalTelemetry::new("r1", "Winx")
                .with_position(400, 1)
                .with_position(800, 1)],
            features,
        }
    }

    #[test]
    fn in_memory_run_fills_and_strips() {
        let mut data = snapshot();
        let reports = pipeline(&EngineConfig::default())
            .run_in_memory(&mut data, false, &NoopProgress)
            .unwrap();
        assert_eq!(data.results[0].position_800m, Some(1));
        assert_eq!(reports.sync.filled, 2);
        assert!(!data.features.has_column("final_position"));
        assert!(!data.features.has_column("position_800m"));
        assert!(data.features.has_column("total_races"));
        let leakage = reports.leakage.unwrap();
        assert!(leakage.dropped.iter().any(|d| d.column == "running_style"));
    }

    #[test]
    fn skip_leakage_keeps_columns() {
        let mut data = snapshot();
        let reports = pipeline(&EngineConfig::default())
            .run_in_memory(&mut data, true, &NoopProgress)
            .unwrap();
        assert!(reports.leakage.is_none());
        assert_eq!(data.features.get_i64(0, "total_runners"), Some(3));
        assert_eq!(data.features.get_text(0, "running_style"), Some("on_pace"));
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let err = PipelineError::Leakage(LeakageError::Violation {
            columns: vec!["margin".into()],
        });
        assert_eq!(err.exit_code(), ExitCode::LeakageViolation);
        let err = PipelineError::Reconcile(ReconcileError::DuplicateIdentityMatch {
            race_id: "r1".into(),
            key: "number 2".into(),
            candidates: 2,
        });
        assert_eq!(err.exit_code(), ExitCode::IdentityAmbiguity);
        let err = PipelineError::Telemetry(TelemetryError::UnknownColumn("x".into()));
        assert_eq!(err.exit_code(), ExitCode::InputError);
    }
}
