//! Distance-remaining → distance-traveled checkpoint resolution.
//!
//! Resolution is a lookup in the configured table and nothing else. A
//! triple the table does not list is not available; the caller leaves the
//! position null rather than guessing a neighbouring checkpoint.

use std::collections::{BTreeMap, HashMap};

use rf_common::{Error, GranularityFamily, Remaining};
use rf_config::{CheckpointEntry, EngineConfig, DEFAULT_CHECKPOINTS};
use serde::Serialize;

/// Result of resolving one (distance, family, remaining) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Checkpoint {
    Traveled { traveled_m: u32 },
    NotAvailable,
}

impl Checkpoint {
    pub fn traveled(self) -> Option<u32> {
        match self {
            Checkpoint::Traveled { traveled_m } => Some(traveled_m),
            Checkpoint::NotAvailable => None,
        }
    }
}

type Key = (GranularityFamily, u32, Remaining);

/// Table-driven checkpoint resolver.
#[derive(Debug, Clone)]
pub struct CheckpointResolver {
    table: HashMap<Key, u32>,
}

impl CheckpointResolver {
    /// Build from explicit entries, rejecting invalid or duplicate rows.
    pub fn from_entries(entries: &[CheckpointEntry]) -> Result<Self, Error> {
        let mut table = HashMap::with_capacity(entries.len());
        for entry in entries {
            entry.validate().map_err(Error::InvalidCheckpointTable)?;
            if table.insert(entry.key(), entry.traveled_m).is_some() {
                return Err(Error::InvalidCheckpointTable(format!(
                    "duplicate entry for {}m / {} / {}",
                    entry.distance_m, entry.family, entry.remaining
                )));
            }
        }
        Ok(Self { table })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, Error> {
        Self::from_entries(&config.checkpoint_entries())
    }

    /// Resolver over the built-in table.
    pub fn builtin() -> Self {
        Self {
            table: DEFAULT_CHECKPOINTS
                .iter()
                .map(|e| (e.key(), e.traveled_m))
                .collect(),
        }
    }

    pub fn resolve(
        &self,
        distance_m: u32,
        family: GranularityFamily,
        remaining: Remaining,
    ) -> Checkpoint {
        match self.table.get(&(family, distance_m, remaining)) {
            Some(&traveled_m) => Checkpoint::Traveled { traveled_m },
            None => Checkpoint::NotAvailable,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Every entry, ordered by family, distance and target.
    pub fn entries(&self) -> Vec<CheckpointEntry> {
        let sorted: BTreeMap<Key, u32> = self.table.iter().map(|(k, v)| (*k, *v)).collect();
        sorted
            .into_iter()
            .map(|((family, distance_m, remaining), traveled_m)| {
                CheckpointEntry::new(family, distance_m, remaining, traveled_m)
            })
            .collect()
    }
}

impl Default for CheckpointResolver {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use GranularityFamily::{Coarse400, Fine200};
    use Remaining::{M400, M800};

    #[test]
    fn exact_distances_resolve() {
        let resolver = CheckpointResolver::builtin();
        assert_eq!(resolver.resolve(1200, Fine200, M800).traveled(), Some(400));
        assert_eq!(resolver.resolve(1200, Fine200, M400).traveled(), Some(800));
        assert_eq!(resolver.resolve(2000, Coarse400, M800).traveled(), Some(1200));
    }

    #[test]
    fn odd_distance_rounds_down() {
        let resolver = CheckpointResolver::builtin();
        assert_eq!(resolver.resolve(1650, Fine200, M800).traveled(), Some(800));
        assert_eq!(resolver.resolve(1650, Fine200, M400).traveled(), Some(1200));
        assert_eq!(resolver.resolve(1400, Coarse400, M800).traveled(), Some(400));
    }

    #[test]
    fn unlisted_triples_are_not_available() {
        let resolver = CheckpointResolver::builtin();
        assert_eq!(resolver.resolve(1650, Coarse400, M800), Checkpoint::NotAvailable);
        assert_eq!(resolver.resolve(1000, Coarse400, M800), Checkpoint::NotAvailable);
        assert_eq!(resolver.resolve(800, Fine200, M800), Checkpoint::NotAvailable);
        assert_eq!(resolver.resolve(1234, Fine200, M400), Checkpoint::NotAvailable);
    }

    #[test]
    fn from_entries_rejects_duplicates_and_off_grid() {
        let dup = [
            CheckpointEntry::new(Fine200, 1200, M800, 400),
            CheckpointEntry::new(Fine200, 1200, M800, 400),
        ];
        assert!(CheckpointResolver::from_entries(&dup).is_err());
        let off_grid = [CheckpointEntry::new(Coarse400, 1400, M800, 600)];
        assert!(matches!(
            CheckpointResolver::from_entries(&off_grid),
            Err(Error::InvalidCheckpointTable(_))
        ));
    }

    #[test]
    fn config_extras_extend_table() {
        let mut config = EngineConfig::default();
        config
            .checkpoints
            .extra
            .push(CheckpointEntry::new(Fine200, 1250, M800, 400));
        let resolver = CheckpointResolver::from_config(&config).unwrap();
        assert_eq!(resolver.len(), DEFAULT_CHECKPOINTS.len() + 1);
        assert_eq!(resolver.resolve(1250, Fine200, M800).traveled(), Some(400));
    }

    #[test]
    fn entries_are_sorted() {
        let entries = CheckpointResolver::builtin().entries();
        assert_eq!(entries.len(), DEFAULT_CHECKPOINTS.len());
        assert!(entries.windows(2).all(|w| w[0].key() < w[1].key()));
    }
}
