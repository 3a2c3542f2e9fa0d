//! Venue → jurisdiction registry and per-jurisdiction profiles.
//!
//! Venues are identified by an explicit list of track names. A venue missing
//! from the list belongs to the configured default jurisdiction (Australia),
//! which is how the upstream race tables treat unlabeled meetings.
//!
//! The registry also carries each track's running direction and category;
//! a track missing from those lists is anti-clockwise and country.

use std::collections::{HashMap, HashSet};

use rf_common::{GranularityFamily, Jurisdiction};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Built-in venue list. Matching is case-insensitive on the trimmed name.
pub static DEFAULT_VENUES: &[(&str, Jurisdiction)] = &[
    ("Sha Tin", Jurisdiction::HongKong),
    ("Happy Valley", Jurisdiction::HongKong),
    ("Royal Ascot", Jurisdiction::UnitedKingdom),
    ("Newmarket", Jurisdiction::UnitedKingdom),
    ("Epsom Downs", Jurisdiction::UnitedKingdom),
    ("York", Jurisdiction::UnitedKingdom),
    ("Goodwood", Jurisdiction::UnitedKingdom),
    ("Cheltenham", Jurisdiction::UnitedKingdom),
    ("Aintree", Jurisdiction::UnitedKingdom),
    ("Newbury", Jurisdiction::UnitedKingdom),
    ("Sandown Park", Jurisdiction::UnitedKingdom),
    ("Doncaster", Jurisdiction::UnitedKingdom),
    ("Haydock", Jurisdiction::UnitedKingdom),
    ("Kempton", Jurisdiction::UnitedKingdom),
    ("Wolverhampton", Jurisdiction::UnitedKingdom),
    ("Southwell", Jurisdiction::UnitedKingdom),
    ("Lingfield", Jurisdiction::UnitedKingdom),
    ("Chester", Jurisdiction::UnitedKingdom),
    ("Hamilton", Jurisdiction::UnitedKingdom),
    ("Musselburgh", Jurisdiction::UnitedKingdom),
    ("Nottingham", Jurisdiction::UnitedKingdom),
    ("Pontefract", Jurisdiction::UnitedKingdom),
    ("Sedgefield", Jurisdiction::UnitedKingdom),
    ("Plumpton", Jurisdiction::UnitedKingdom),
    ("Yarmouth", Jurisdiction::UnitedKingdom),
    ("Down Royal", Jurisdiction::UnitedKingdom),
    ("Curragh", Jurisdiction::Ireland),
    ("Leopardstown", Jurisdiction::Ireland),
    ("Punchestown", Jurisdiction::Ireland),
    ("Fairyhouse", Jurisdiction::Ireland),
    ("Naas", Jurisdiction::Ireland),
    ("Gowran Park", Jurisdiction::Ireland),
    ("Galway", Jurisdiction::Ireland),
    ("Cork", Jurisdiction::Ireland),
    ("Killarney", Jurisdiction::Ireland),
    ("Dundalk", Jurisdiction::Ireland),
    ("Navan", Jurisdiction::Ireland),
    ("Thurles", Jurisdiction::Ireland),
    ("ParisLongchamp", Jurisdiction::France),
    ("Chantilly", Jurisdiction::France),
    ("Deauville", Jurisdiction::France),
    ("Saint-Cloud", Jurisdiction::France),
    ("Compiegne", Jurisdiction::France),
    ("Fontainebleau", Jurisdiction::France),
    ("Lyon-Parilly", Jurisdiction::France),
    ("Vichy", Jurisdiction::France),
    ("Tokyo", Jurisdiction::Japan),
    ("Kyoto", Jurisdiction::Japan),
    ("Hanshin", Jurisdiction::Japan),
    ("Nakayama", Jurisdiction::Japan),
    ("Chukyo", Jurisdiction::Japan),
    ("Niigata", Jurisdiction::Japan),
    ("Fukushima", Jurisdiction::Japan),
    ("Kokura", Jurisdiction::Japan),
    ("Sapporo", Jurisdiction::Japan),
    ("Meydan", Jurisdiction::UnitedArabEmirates),
];

/// Tracks raced clockwise.
pub static CLOCKWISE_TRACKS: &[&str] = &[
    "Flemington",
    "Caulfield",
    "Moonee Valley",
    "Sandown Lakeside",
    "Ballarat",
    "Bendigo",
    "Geelong",
    "Mornington",
    "Pakenham Synthetic",
    "Randwick",
    "Rosehill",
    "Canterbury Park",
    "Warwick Farm",
    "Newcastle",
    "Eagle Farm",
    "Doomben",
    "Sunshine Coast",
    "Gold Coast",
    "Sha Tin",
    "Happy Valley",
];

pub static METRO_TRACKS: &[&str] = &[
    "Flemington",
    "Caulfield",
    "Moonee Valley",
    "Randwick",
    "Rosehill",
    "Eagle Farm",
    "Doomben",
    "Morphettville",
    "Sha Tin",
    "Happy Valley",
];

pub static PROVINCIAL_TRACKS: &[&str] = &[
    "Sandown Lakeside",
    "Sandown Hillside",
    "Cranbourne",
    "Canterbury Park",
    "Warwick Farm",
    "Newcastle",
    "Kembla Grange",
    "Sunshine Coast",
    "Gold Coast",
    "Ipswich",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackDirection {
    Clockwise,
    AntiClockwise,
}

impl TrackDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackDirection::Clockwise => "Clockwise",
            TrackDirection::AntiClockwise => "Anti-Clockwise",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackCategory {
    Metro,
    Provincial,
    Country,
}

impl TrackCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackCategory::Metro => "Metro",
            TrackCategory::Provincial => "Provincial",
            TrackCategory::Country => "Country",
        }
    }
}

/// Telemetry layout and reconciliation rules for one jurisdiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JurisdictionProfile {
    pub jurisdiction: Jurisdiction,
    pub family: GranularityFamily,
    /// Runner numbers are the stable identity across within-meeting name
    /// changes, so reconciliation may fall back to them.
    #[serde(default)]
    pub runner_number_fallback: bool,
}

/// Default profiles: Australia and Hong Kong record every 200m, the rest
/// every 400m; only Hong Kong reconciles by runner number.
pub fn default_profiles() -> Vec<JurisdictionProfile> {
    Jurisdiction::ALL
        .into_iter()
        .map(|jurisdiction| {
            let family = match jurisdiction {
                Jurisdiction::Australia | Jurisdiction::HongKong => GranularityFamily::Fine200,
                _ => GranularityFamily::Coarse400,
            };
            JurisdictionProfile {
                jurisdiction,
                family,
                runner_number_fallback: jurisdiction == Jurisdiction::HongKong,
            }
        })
        .collect()
}

/// A configured venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VenueEntry {
    pub track_name: String,
    pub jurisdiction: Jurisdiction,
    #[serde(default)]
    pub direction: Option<TrackDirection>,
    #[serde(default)]
    pub category: Option<TrackCategory>,
}

/// Venue settings in the engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VenueConfig {
    #[serde(default = "default_jurisdiction")]
    pub default_jurisdiction: Jurisdiction,

    /// Venues added to (or re-assigned on top of) the built-in list.
    #[serde(default)]
    pub extra: Vec<VenueEntry>,
}

fn default_jurisdiction() -> Jurisdiction {
    Jurisdiction::Australia
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            default_jurisdiction: default_jurisdiction(),
            extra: Vec::new(),
        }
    }
}

/// Resolved lookup from track name to jurisdiction and profile.
#[derive(Debug, Clone)]
pub struct VenueRegistry {
    venues: HashMap<String, Jurisdiction>,
    profiles: HashMap<Jurisdiction, JurisdictionProfile>,
    default_jurisdiction: Jurisdiction,
    clockwise: HashSet<String>,
    categories: HashMap<String, TrackCategory>,
}

fn normalize_venue(name: &str) -> String {
    name.trim().to_lowercase()
}

impl VenueRegistry {
    pub fn new(config: &VenueConfig, profiles: &[JurisdictionProfile]) -> Self {
        let mut venues: HashMap<String, Jurisdiction> = DEFAULT_VENUES
            .iter()
            .map(|(name, j)| (normalize_venue(name), *j))
            .collect();
        let mut clockwise: HashSet<String> =
            CLOCKWISE_TRACKS.iter().map(|name| normalize_venue(name)).collect();
        let mut categories: HashMap<String, TrackCategory> = PROVINCIAL_TRACKS
            .iter()
            .map(|name| (normalize_venue(name), TrackCategory::Provincial))
            .chain(
                METRO_TRACKS
                    .iter()
                    .map(|name| (normalize_venue(name), TrackCategory::Metro)),
            )
            .collect();
        for entry in &config.extra {
            let name = normalize_venue(&entry.track_name);
            venues.insert(name.clone(), entry.jurisdiction);
            match entry.direction {
                Some(TrackDirection::Clockwise) => {
                    clockwise.insert(name.clone());
                }
                Some(TrackDirection::AntiClockwise) => {
                    clockwise.remove(&name);
                }
                None => {}
            }
            if let Some(category) = entry.category {
                categories.insert(name, category);
            }
        }
        let mut by_jurisdiction: HashMap<Jurisdiction, JurisdictionProfile> = default_profiles()
            .into_iter()
            .map(|p| (p.jurisdiction, p))
            .collect();
        for profile in profiles {
            by_jurisdiction.insert(profile.jurisdiction, *profile);
        }
        Self {
            venues,
            profiles: by_jurisdiction,
            default_jurisdiction: config.default_jurisdiction,
            clockwise,
            categories,
        }
    }

    /// Jurisdiction of a venue; unknown or missing names use the default.
    pub fn jurisdiction(&self, track_name: Option<&str>) -> Jurisdiction {
        track_name
            .and_then(|name| self.venues.get(&normalize_venue(name)).copied())
            .unwrap_or(self.default_jurisdiction)
    }

    pub fn profile(&self, jurisdiction: Jurisdiction) -> JurisdictionProfile {
        self.profiles
            .get(&jurisdiction)
            .copied()
            .unwrap_or(JurisdictionProfile {
                jurisdiction,
                family: GranularityFamily::Coarse400,
                runner_number_fallback: false,
            })
    }

    /// Profile for a venue.
    pub fn venue_profile(&self, track_name: Option<&str>) -> JurisdictionProfile {
        self.profile(self.jurisdiction(track_name))
    }

    /// Running direction; `None` only when the race has no track name.
    pub fn track_direction(&self, track_name: Option<&str>) -> Option<TrackDirection> {
        track_name.map(|name| {
            if self.clockwise.contains(&normalize_venue(name)) {
                TrackDirection::Clockwise
            } else {
                TrackDirection::AntiClockwise
            }
        })
    }

    /// Track category; `None` only when the race has no track name.
    pub fn track_category(&self, track_name: Option<&str>) -> Option<TrackCategory> {
        track_name.map(|name| {
            self.categories
                .get(&normalize_venue(name))
                .copied()
                .unwrap_or(TrackCategory::Country)
        })
    }

    pub fn venue_count(&self) -> usize {
        self.venues.len()
    }
}

impl Default for VenueRegistry {
    fn default() -> Self {
        Self::new(&VenueConfig::default(), &default_profiles())
    }
}
