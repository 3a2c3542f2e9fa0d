//! Versioned leakage manifest.
//!
//! Each group lists the columns whose value depends on the current race's
//! outcome or in-race telemetry, and the historically-safe counterparts that
//! stand in for them. A counterpart can never also be a member of a group.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::LeakageError;

/// Bump whenever a group's membership changes.
pub const MANIFEST_VERSION: &str = "1.0.0";

/// Provenance group of a forbidden column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceGroup {
    Outcome,
    InRacePosition,
    PositionImprovement,
    DerivedScore,
    CurrentRaceSpeed,
    ResidualSuspect,
}

impl ProvenanceGroup {
    pub const ALL: [ProvenanceGroup; 6] = [
        ProvenanceGroup::Outcome,
        ProvenanceGroup::InRacePosition,
        ProvenanceGroup::PositionImprovement,
        ProvenanceGroup::DerivedScore,
        ProvenanceGroup::CurrentRaceSpeed,
        ProvenanceGroup::ResidualSuspect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProvenanceGroup::Outcome => "outcome",
            ProvenanceGroup::InRacePosition => "in_race_position",
            ProvenanceGroup::PositionImprovement => "position_improvement",
            ProvenanceGroup::DerivedScore => "derived_score",
            ProvenanceGroup::CurrentRaceSpeed => "current_race_speed",
            ProvenanceGroup::ResidualSuspect => "residual_suspect",
        }
    }
}

impl std::fmt::Display for ProvenanceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a single column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "class", content = "group", rename_all = "snake_case")]
pub enum Classification {
    Forbidden(ProvenanceGroup),
    HistoricallySafe,
}

struct GroupSpec {
    group: ProvenanceGroup,
    members: &'static [&'static str],
    counterparts: &'static [&'static str],
}

static BUILTIN_GROUPS: &[GroupSpec] = &[
    GroupSpec {
        group: ProvenanceGroup::Outcome,
        members: &[
            "final_position",
            "position_at_end",
            "margin",
            "raw_time_seconds",
            "finish_time",
        ],
        counterparts: &[
            "win_percentage",
            "place_percentage",
            "last_5_avg_position",
            "last_5_win_rate",
            "last_5_place_rate",
        ],
    },
    GroupSpec {
        group: ProvenanceGroup::InRacePosition,
        members: &[
            "position_800m",
            "position_400m",
            "position_at_800",
            "position_at_400",
            "sectional_position_800m",
            "sectional_position_400m",
            "sectional_position_200m",
            "running_style",
        ],
        counterparts: &["prior_running_style", "early_speed_pct"],
    },
    GroupSpec {
        group: ProvenanceGroup::PositionImprovement,
        members: &[
            "pos_improvement_800_finish",
            "pos_improvement_400_finish",
            "pos_improvement_800_400",
            "position_change_800_400",
            "position_change_400_finish",
            "best_late_improvement",
        ],
        counterparts: &["avg_prior_improvement", "finishing_kick_consistency"],
    },
    GroupSpec {
        group: ProvenanceGroup::DerivedScore,
        members: &[
            "closing_ability_score",
            "early_speed_score",
            "sustained_run_score",
            "closing_power_score",
        ],
        counterparts: &["strong_finish_pct", "pos_volatility_800"],
    },
    GroupSpec {
        group: ProvenanceGroup::CurrentRaceSpeed,
        members: &[
            "speed_figure",
            "speed_rating",
            "early_speed_rating",
            "finish_speed_rating",
        ],
        counterparts: &["avg_speed_figure"],
    },
    GroupSpec {
        group: ProvenanceGroup::ResidualSuspect,
        members: &["elo_races_count", "feature_maturity_score"],
        counterparts: &["total_races"],
    },
];

fn normalize(column: &str) -> String {
    column.trim().to_lowercase()
}

/// One group as published in reports and `rf-core manifest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestGroup {
    pub group: ProvenanceGroup,
    pub members: Vec<String>,
    pub counterparts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakageManifest {
    pub version: String,
    pub groups: Vec<ManifestGroup>,
    #[serde(skip)]
    forbidden: BTreeMap<String, ProvenanceGroup>,
    #[serde(skip)]
    counterparts: BTreeSet<String>,
}

impl LeakageManifest {
    pub fn builtin() -> Result<Self, LeakageError> {
        Self::with_extra_suspects(&[])
    }

    /// Built-in groups plus configured residual suspects.
    pub fn with_extra_suspects(extra: &[String]) -> Result<Self, LeakageError> {
        let mut groups: Vec<ManifestGroup> = BUILTIN_GROUPS
            .iter()
            .map(|spec| ManifestGroup {
                group: spec.group,
                members: spec.members.iter().map(|m| normalize(m)).collect(),
                counterparts: spec.counterparts.iter().map(|c| normalize(c)).collect(),
            })
            .collect();
        if let Some(residual) = groups
            .iter_mut()
            .find(|g| g.group == ProvenanceGroup::ResidualSuspect)
        {
            for column in extra {
                let column = normalize(column);
                if !column.is_empty() && !residual.members.contains(&column) {
                    residual.members.push(column);
                }
            }
        }
        Self::from_groups(groups)
    }

    /// Build from explicit groups, checking the counterpart exemption.
    pub fn from_groups(groups: Vec<ManifestGroup>) -> Result<Self, LeakageError> {
        let counterparts: BTreeSet<String> = groups
            .iter()
            .flat_map(|g| g.counterparts.iter().map(|c| normalize(c)))
            .collect();
        let mut forbidden = BTreeMap::new();
        for group in &groups {
            for member in &group.members {
                let member = normalize(member);
                if counterparts.contains(&member) {
                    return Err(LeakageError::InvalidManifest(format!(
                        "historically-safe column '{}' listed as {} member",
                        member, group.group
                    )));
                }
                if let Some(previous) = forbidden.insert(member.clone(), group.group) {
                    if previous != group.group {
                        return Err(LeakageError::InvalidManifest(format!(
                            "column '{}' listed in both {} and {}",
                            member, previous, group.group
                        )));
                    }
                }
            }
        }
        Ok(Self {
            version: MANIFEST_VERSION.to_string(),
            groups,
            forbidden,
            counterparts,
        })
    }

    pub fn classify(&self, column: &str) -> Classification {
        match self.forbidden.get(&normalize(column)) {
            Some(group) => Classification::Forbidden(*group),
            None => Classification::HistoricallySafe,
        }
    }

    pub fn is_counterpart(&self, column: &str) -> bool {
        self.counterparts.contains(&normalize(column))
    }

    pub fn counterparts(&self) -> impl Iterator<Item = &str> {
        self.counterparts.iter().map(String::as_str)
    }

    pub fn forbidden_count(&self) -> usize {
        self.forbidden.len()
    }

    /// SHA-256 over the version and sorted group contents.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.as_bytes());
        for (column, group) in &self.forbidden {
            hasher.update(b"\n-");
            hasher.update(group.as_str().as_bytes());
            hasher.update(b":");
            hasher.update(column.as_bytes());
        }
        for column in &self.counterparts {
            hasher.update(b"\n+");
            hasher.update(column.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_groups_classify() {
        let manifest = LeakageManifest::builtin().unwrap();
        assert_eq!(
            manifest.classify("final_position"),
            Classification::Forbidden(ProvenanceGroup::Outcome)
        );
        assert_eq!(
            manifest.classify(" Position_800M "),
            Classification::Forbidden(ProvenanceGroup::InRacePosition)
        );
        assert_eq!(
            manifest.classify("best_late_improvement"),
            Classification::Forbidden(ProvenanceGroup::PositionImprovement)
        );
        assert_eq!(manifest.classify("avg_speed_figure"), Classification::HistoricallySafe);
        assert_eq!(manifest.classify("barrier"), Classification::HistoricallySafe);
        assert!(manifest.is_counterpart("prior_running_style"));
    }

    #[test]
    fn every_group_has_members_and_counterparts() {
        let manifest = LeakageManifest::builtin().unwrap();
        for group in ProvenanceGroup::ALL {
            let spec = manifest.groups.iter().find(|g| g.group == group).unwrap();
            assert!(!spec.members.is_empty(), "{group} has no members");
            assert!(!spec.counterparts.is_empty(), "{group} has no counterparts");
        }
    }

    #[test]
    fn counterpart_cannot_be_forbidden() {
        let err = LeakageManifest::with_extra_suspects(&["Total_Races".into()]).unwrap_err();
        assert!(matches!(err, LeakageError::InvalidManifest(_)));
    }

    #[test]
    fn extra_suspects_join_residual_group() {
        let manifest = LeakageManifest::with_extra_suspects(&["steward_flag".into()]).unwrap();
        assert_eq!(
            manifest.classify("steward_flag"),
            Classification::Forbidden(ProvenanceGroup::ResidualSuspect)
        );
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = LeakageManifest::builtin().unwrap();
        let b = LeakageManifest::builtin().unwrap();
        let c = LeakageManifest::with_extra_suspects(&["steward_flag".into()]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
