//! Racing enumerations shared by the resolver, reconciler and feature passes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Racing jurisdiction a venue belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Jurisdiction {
    #[serde(rename = "AU")]
    Australia,
    #[serde(rename = "HK")]
    HongKong,
    #[serde(rename = "UK")]
    UnitedKingdom,
    #[serde(rename = "IE")]
    Ireland,
    #[serde(rename = "FR")]
    France,
    #[serde(rename = "JP")]
    Japan,
    #[serde(rename = "AE")]
    UnitedArabEmirates,
}

impl Jurisdiction {
    pub const ALL: [Jurisdiction; 7] = [
        Jurisdiction::Australia,
        Jurisdiction::HongKong,
        Jurisdiction::UnitedKingdom,
        Jurisdiction::Ireland,
        Jurisdiction::France,
        Jurisdiction::Japan,
        Jurisdiction::UnitedArabEmirates,
    ];

    /// Two-letter code used in runner keys and snapshot files.
    pub fn code(self) -> &'static str {
        match self {
            Jurisdiction::Australia => "AU",
            Jurisdiction::HongKong => "HK",
            Jurisdiction::UnitedKingdom => "UK",
            Jurisdiction::Ireland => "IE",
            Jurisdiction::France => "FR",
            Jurisdiction::Japan => "JP",
            Jurisdiction::UnitedArabEmirates => "AE",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|j| j.code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Spacing family of the traveled checkpoints recorded in sectional telemetry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum GranularityFamily {
    /// Checkpoints every 200m traveled.
    Fine200,
    /// Checkpoints every 400m traveled.
    Coarse400,
}

impl GranularityFamily {
    pub fn spacing_m(self) -> u32 {
        match self {
            GranularityFamily::Fine200 => 200,
            GranularityFamily::Coarse400 => 400,
        }
    }

    /// Whether `traveled_m` is a checkpoint this family records.
    pub fn records(self, traveled_m: u32) -> bool {
        traveled_m > 0 && traveled_m % self.spacing_m() == 0
    }
}

impl fmt::Display for GranularityFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GranularityFamily::Fine200 => write!(f, "fine_200"),
            GranularityFamily::Coarse400 => write!(f, "coarse_400"),
        }
    }
}

/// Distance-remaining checkpoint targets supported by the resolver.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Remaining {
    #[serde(rename = "800")]
    M800,
    #[serde(rename = "400")]
    M400,
}

impl Remaining {
    pub const ALL: [Remaining; 2] = [Remaining::M800, Remaining::M400];

    pub fn metres(self) -> u32 {
        match self {
            Remaining::M800 => 800,
            Remaining::M400 => 400,
        }
    }

    pub fn from_metres(metres: u32) -> Option<Self> {
        match metres {
            800 => Some(Remaining::M800),
            400 => Some(Remaining::M400),
            _ => None,
        }
    }

    /// Column that holds the resolved position in results and features.
    pub fn column(self) -> &'static str {
        match self {
            Remaining::M800 => "position_800m",
            Remaining::M400 => "position_400m",
        }
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.metres())
    }
}

/// Going category used by the condition-preference features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCategory {
    Wet,
    Dry,
}

const WET_MARKERS: &[&str] = &[
    "heavy", "soft", "yielding", "wet", "sloppy", "muddy", "slow",
];
const DRY_MARKERS: &[&str] = &["firm", "good", "fast", "hard", "standard"];

impl ConditionCategory {
    /// Classify a free-text track-condition descriptor.
    ///
    /// Descriptors such as `"Heavy 8"` or `"Soft (7)"` are wet, `"Good 4"`
    /// or `"Good to Firm"` are dry. Without a known marker the last rating
    /// number decides on the 1-10 scale (1-4 dry, 5-10 wet), so `"Dead 5"`
    /// and a bare `"6"` are wet. Anything else (synthetic, unknown, empty)
    /// is unclassified.
    pub fn classify(descriptor: &str) -> Option<Self> {
        let lower = descriptor.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return None;
        }
        // "Good to Soft" is wet: the wetter qualifier wins.
        if WET_MARKERS.iter().any(|m| lower.contains(m)) {
            return Some(ConditionCategory::Wet);
        }
        if DRY_MARKERS.iter().any(|m| lower.contains(m)) {
            return Some(ConditionCategory::Dry);
        }
        let rating = lower
            .split(|c: char| !c.is_ascii_digit())
            .rfind(|digits| !digits.is_empty())?;
        match rating.parse::<u32>() {
            Ok(1..=4) => Some(ConditionCategory::Dry),
            Ok(5..=10) => Some(ConditionCategory::Wet),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jurisdiction_codes_roundtrip() {
        for j in Jurisdiction::ALL {
            assert_eq!(Jurisdiction::from_code(j.code()), Some(j));
        }
        assert_eq!(Jurisdiction::from_code("hk"), Some(Jurisdiction::HongKong));
        assert_eq!(Jurisdiction::from_code("US"), None);
    }

    #[test]
    fn jurisdiction_serializes_as_code() {
        let json = serde_json::to_string(&Jurisdiction::HongKong).unwrap();
        assert_eq!(json, "\"HK\"");
    }

    #[test]
    fn family_records_only_multiples() {
        assert!(GranularityFamily::Fine200.records(1200));
        assert!(!GranularityFamily::Fine200.records(1250));
        assert!(!GranularityFamily::Fine200.records(0));
        assert!(GranularityFamily::Coarse400.records(800));
        assert!(!GranularityFamily::Coarse400.records(600));
    }

    #[test]
    fn remaining_columns() {
        assert_eq!(Remaining::M800.column(), "position_800m");
        assert_eq!(Remaining::M400.column(), "position_400m");
        assert_eq!(Remaining::from_metres(400), Some(Remaining::M400));
        assert_eq!(Remaining::from_metres(600), None);
    }

    #[test]
    fn classify_conditions() {
        assert_eq!(ConditionCategory::classify("Heavy 8"), Some(ConditionCategory::Wet));
        assert_eq!(ConditionCategory::classify("Soft (7)"), Some(ConditionCategory::Wet));
        assert_eq!(ConditionCategory::classify("Good 4"), Some(ConditionCategory::Dry));
        assert_eq!(ConditionCategory::classify("Good to Soft"), Some(ConditionCategory::Wet));
        assert_eq!(ConditionCategory::classify("Firm"), Some(ConditionCategory::Dry));
        assert_eq!(ConditionCategory::classify("6"), Some(ConditionCategory::Wet));
        assert_eq!(ConditionCategory::classify("3"), Some(ConditionCategory::Dry));
        assert_eq!(ConditionCategory::classify("Synthetic"), None);
        assert_eq!(ConditionCategory::classify("Dead 5"), Some(ConditionCategory::Wet));
        assert_eq!(ConditionCategory::classify("Dead (4)"), Some(ConditionCategory::Dry));
        assert_eq!(ConditionCategory::classify("Dead"), None);
        assert_eq!(ConditionCategory::classify("Rating 12"), None);
        assert_eq!(ConditionCategory::classify(""), None);
    }
}
