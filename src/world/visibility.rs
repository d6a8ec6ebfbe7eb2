//! League Airspace
//!
//! A viewer sees a hazard when it lies inside the airspace of the viewer's
//! league tier, or when the viewer placed it.

use serde::{Serialize, Deserialize};

use crate::core::geo::{distance, GeoLocation};

/// Radius for tiers not in the table.
pub const DEFAULT_VISIBILITY_RADIUS_M: f64 = 20.0;

/// League tiers with a dedicated airspace radius.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    /// 60 m
    Bronze,
    /// 80 m
    Silver,
    /// 120 m
    Gold,
    /// 140 m
    Diamond,
    /// 200 m
    Legend,
}

impl League {
    /// Parse a tier name, ignoring case and surrounding whitespace.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bronze" => Some(Self::Bronze),
            "silver" => Some(Self::Silver),
            "gold" => Some(Self::Gold),
            "diamond" => Some(Self::Diamond),
            "legend" => Some(Self::Legend),
            _ => None,
        }
    }

    /// Airspace radius in metres.
    pub const fn radius_m(self) -> f64 {
        match self {
            Self::Bronze => 60.0,
            Self::Silver => 80.0,
            Self::Gold => 120.0,
            Self::Diamond => 140.0,
            Self::Legend => 200.0,
        }
    }
}

/// Airspace radius in metres for a tier name; unknown tiers get the default.
pub fn visibility_radius(tier: &str) -> f64 {
    League::parse(tier)
        .map(League::radius_m)
        .unwrap_or(DEFAULT_VISIBILITY_RADIUS_M)
}

/// Whether an entity at `entity_location` owned by `owner` is visible.
///
/// Ownership is checked first and always wins. With no viewer location only
/// owned entities are visible.
pub fn is_visible(
    viewer: Option<&GeoLocation>,
    viewer_name: &str,
    tier: &str,
    entity_location: &GeoLocation,
    owner: Option<&str>,
) -> bool {
    if owner.is_some_and(|owner| !owner.is_empty() && owner == viewer_name) {
        return true;
    }
    match viewer {
        Some(viewer) => distance(viewer, entity_location) <= visibility_radius(tier),
        None => false,
    }
}
