//! Race features configuration loading and validation.
//!
//! This crate provides:
//! - The explicit distance → traveled-checkpoint table per granularity family
//! - The venue → jurisdiction registry and per-jurisdiction profiles
//! - Typed engine settings (sanity bound, history thresholds, pace cut-offs)
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation and hashed config snapshots for run reports

pub mod checkpoints;
pub mod engine;
pub mod resolve;
pub mod snapshot;
pub mod validate;
pub mod venues;

pub use checkpoints::{CheckpointConfig, CheckpointEntry, DEFAULT_CHECKPOINTS};
pub use engine::{
    BackfillConfig, EngineConfig, HistoryConfig, LeakageConfig, PaceConfig,
};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};
pub use venues::{
    JurisdictionProfile, TrackCategory, TrackDirection, VenueConfig, VenueEntry, VenueRegistry,
};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
