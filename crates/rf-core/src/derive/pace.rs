//! Running-style bucket from the 800m-to-go position.

use rf_config::PaceConfig;
use rf_telemetry::{columns, ColumnKind, FeatureTable, FeatureValue, TelemetryError};
use serde::{Deserialize, Serialize};

use super::context::TOTAL_RUNNERS;
use super::DeriveInputs;

pub const RUNNING_STYLE: &str = "running_style";
pub const POS_IMPROVEMENT_800_FINISH: &str = "pos_improvement_800_finish";

/// Pace-style bucket, by share of the field ahead at the 800m mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceBucket {
    Leader,
    OnPace,
    Midfield,
    OffPace,
    Closer,
    Unknown,
}

impl PaceBucket {
    pub const ALL: [PaceBucket; 6] = [
        PaceBucket::Leader,
        PaceBucket::OnPace,
        PaceBucket::Midfield,
        PaceBucket::OffPace,
        PaceBucket::Closer,
        PaceBucket::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaceBucket::Leader => "leader",
            PaceBucket::OnPace => "on_pace",
            PaceBucket::Midfield => "midfield",
            PaceBucket::OffPace => "off_pace",
            PaceBucket::Closer => "closer",
            PaceBucket::Unknown => "unknown",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|b| b.as_str() == label)
    }

    /// Bucket for `position` in a field of `total_runners`.
    pub fn bucket(position: i64, total_runners: i64, config: &PaceConfig) -> Self {
        if position <= 0 || total_runners <= 0 {
            return PaceBucket::Unknown;
        }
        let fraction = position as f64 / total_runners as f64;
        if fraction <= config.leader_max {
            PaceBucket::Leader
        } else if fraction <= config.on_pace_max {
            PaceBucket::OnPace
        } else if fraction <= config.midfield_max {
            PaceBucket::Midfield
        } else if fraction <= config.off_pace_max {
            PaceBucket::OffPace
        } else {
            PaceBucket::Closer
        }
    }

    /// Settled on or near the pace.
    pub fn is_early(self) -> bool {
        matches!(self, PaceBucket::Leader | PaceBucket::OnPace)
    }
}

impl std::fmt::Display for PaceBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaceReport {
    pub bucketed: usize,
    pub kept_previous: usize,
    pub unknown: usize,
    pub improvements: usize,
}

pub(crate) fn apply(
    table: &mut FeatureTable,
    inputs: &DeriveInputs<'_>,
    config: &PaceConfig,
) -> Result<PaceReport, TelemetryError> {
    table.ensure_column(RUNNING_STYLE, ColumnKind::Text)?;
    table.ensure_column(POS_IMPROVEMENT_800_FINISH, ColumnKind::Int)?;

    let mut report = PaceReport::default();
    for row in 0..table.len() {
        let position = table.get_i64(row, columns::POSITION_800M);
        let total = table.get_i64(row, TOTAL_RUNNERS);

        match (position, total) {
            (Some(position), Some(total)) => {
                let bucket = PaceBucket::bucket(position, total, config);
                table.set(row, RUNNING_STYLE, Some(bucket.as_str().into()))?;
                report.bucketed += 1;
            }
            // No position this run: a bucket computed earlier stands.
            _ if table.get_text(row, RUNNING_STYLE).is_some() => report.kept_previous += 1,
            _ => {
                table.set(row, RUNNING_STYLE, Some(PaceBucket::Unknown.as_str().into()))?;
                report.unknown += 1;
            }
        }

        let improvement = match (position, inputs.final_position(table, row)) {
            (Some(at_800), Some(finish)) => Some(FeatureValue::Int(at_800 - finish)),
            _ => None,
        };
        if improvement.is_some() {
            report.improvements += 1;
        }
        table.set(row, POS_IMPROVEMENT_800_FINISH, improvement)?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_common::{RaceId, RunnerKey};
    use rf_config::VenueRegistry;
    use rf_telemetry::{ColumnData, RaceResult};

    #[test]
    fn documented_buckets() {
        let config = PaceConfig::default();
        assert_eq!(PaceBucket::bucket(2, 10, &config), PaceBucket::Leader);
        assert_eq!(PaceBucket::bucket(4, 10, &config), PaceBucket::OnPace);
        assert_eq!(PaceBucket::bucket(6, 10, &config), PaceBucket::Midfield);
        assert_eq!(PaceBucket::bucket(8, 10, &config), PaceBucket::OffPace);
        assert_eq!(PaceBucket::bucket(9, 10, &config), PaceBucket::Closer);
        assert_eq!(PaceBucket::bucket(1, 0, &config), PaceBucket::Unknown);
    }

    #[test]
    fn labels_parse_back() {
        for bucket in PaceBucket::ALL {
            assert_eq!(PaceBucket::parse(bucket.as_str()), Some(bucket));
        }
        assert_eq!(PaceBucket::parse("stalker"), None);
    }

    fn table(positions: Vec<Option<i64>>, styles: Vec<Option<String>>) -> FeatureTable {
        let mut t = FeatureTable::new();
        for i in 0..positions.len() {
            t.push_row(RaceId::from("r1"), RunnerKey::from(format!("h{i}_AU").as_str()), None)
                .unwrap();
        }
        let n = positions.len();
        t.add_column(columns::POSITION_800M, ColumnData::Int(positions)).unwrap();
        t.add_column(TOTAL_RUNNERS, ColumnData::Int(vec![Some(10); n])).unwrap();
        t.add_column(RUNNING_STYLE, ColumnData::Text(styles)).unwrap();
        t
    }

    #[test]
    fn null_position_keeps_previous_bucket() {
        let mut t = table(
            vec![Some(2), None, None],
            vec![None, Some("closer".into()), None],
        );
        let venues = VenueRegistry::default();
        let inputs = DeriveInputs::new(&[], &[], &venues);
        let report = apply(&mut t, &inputs, &PaceConfig::default()).unwrap();
        assert_eq!(t.get_text(0, RUNNING_STYLE), Some("leader"));
        assert_eq!(t.get_text(1, RUNNING_STYLE), Some("closer"));
        assert_eq!(t.get_text(2, RUNNING_STYLE), Some("unknown"));
        assert_eq!(report.kept_previous, 1);
    }

    #[test]
    fn improvement_uses_result_store_final_position() {
        let mut t = table(vec![Some(7)], vec![None]);
        let mut result = RaceResult::new("r1", "H0");
        result.horse_slug = Some("h0".into());
        result.final_position = Some(2);
        let results = vec![result];
        let venues = VenueRegistry::default();
        let inputs = DeriveInputs::new(&[], &results, &venues);
        apply(&mut t, &inputs, &PaceConfig::default()).unwrap();
        assert_eq!(t.get_i64(0, POS_IMPROVEMENT_800_FINISH), Some(5));
    }
}
