//! Race features common types, identities, and errors.
//!
//! This crate provides foundational types shared across the rf-* crates:
//! - Race and runner identity types
//! - Racing enumerations (jurisdiction, granularity family, checkpoint targets)
//! - The populate-if-null merge primitive
//! - Common error types and schema versioning

pub mod error;
pub mod id;
pub mod merge;
pub mod racing;
pub mod schema;

pub use error::{Error, Result};
pub use id::{RaceId, RunId, RunnerKey};
pub use merge::{fill_if_null, MergeOutcome};
pub use racing::{ConditionCategory, GranularityFamily, Jurisdiction, Remaining};
pub use schema::SCHEMA_VERSION;
