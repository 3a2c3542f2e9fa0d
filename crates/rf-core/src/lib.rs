//! Race features engine.
//!
//! Resolves sparse traveled-distance sectional telemetry into 800m/400m-to-go
//! positions, merges them into the feature table, derives pace and
//! strictly-prior history features, and strips outcome-dependent columns
//! before a table reaches model training.

pub mod backfill;
pub mod checkpoint;
pub mod derive;
pub mod exit_codes;
pub mod leakage;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod sync;

pub use backfill::{BackfillReport, PassReport, SectionalBackfiller, UnresolvedReason};
pub use checkpoint::{Checkpoint, CheckpointResolver};
pub use derive::{DeriveReport, DerivedFeatureCalculator, PaceBucket};
pub use exit_codes::ExitCode;
pub use leakage::{
    Classification, LeakageClassifier, LeakageError, LeakageManifest, LeakageReport,
    ProvenanceGroup,
};
pub use pipeline::{Pipeline, PipelineError, RunOptions, RunReport, StageReports};
pub use progress::{NoopProgress, ProgressEvent, ProgressSink, RecordingProgress, Stage, TracingProgress};
pub use reconcile::{normalize_name, IdentityReconciler, Match, ReconcileError};
pub use sync::{FeatureSyncer, SyncReport};
