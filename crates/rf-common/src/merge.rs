//! Populate-if-null merge primitive.
//!
//! Every write the engine makes into the result store or the feature table
//! goes through [`fill_if_null`]: a merge whose precondition is that the
//! target is still empty. Repeating a merge over overlapping batches is
//! therefore a no-op, and an existing value is never replaced.

use serde::{Deserialize, Serialize};

/// Outcome of a single populate-if-null merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Target was null and now holds the value.
    Filled,
    /// Target already held the same value.
    AlreadyPresent,
    /// Target held a different value, which was kept.
    Conflict,
}

impl MergeOutcome {
    pub fn changed(self) -> bool {
        matches!(self, MergeOutcome::Filled)
    }
}

/// Write `value` into `slot` only if `slot` is `None`.
pub fn fill_if_null<T: PartialEq>(slot: &mut Option<T>, value: T) -> MergeOutcome {
    match slot {
        None => {
            *slot = Some(value);
            MergeOutcome::Filled
        }
        Some(existing) if *existing == value => MergeOutcome::AlreadyPresent,
        Some(_) => MergeOutcome::Conflict,
    }
}
