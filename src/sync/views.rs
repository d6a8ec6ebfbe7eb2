//! Derived views.
//!
//! Pure functions from store snapshots to what a map screen draws. Nothing
//! here is cached: expiry text depends on `now` and player markers draw fresh
//! jitter on every call.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::debug;

use crate::core::geo::{within_radius, GeoLocation};
use crate::sync::entity::{Landmine, Loot, Missile, PlayerPosition};
use crate::sync::location::ViewerLocation;
use crate::world::expiry::{format_expiry, format_impact, parse_timestamp};
use crate::world::jitter::{obfuscate, JitterConfig, ObfuscatedPosition};
use crate::world::trajectory::remaining_path;
use crate::world::visibility::is_visible;

/// The local player looking at the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    /// Username.
    pub username: String,
    /// League tier name; decides the visibility radius.
    pub tier: String,
    /// Where the viewer is, if known.
    pub location: ViewerLocation,
}

/// Lookup from an opaque loot key to an image identifier.
pub trait ImageCatalog: Send + Sync {
    /// Image for `key`, if the catalog has one.
    fn image_for(&self, key: &str) -> Option<String>;
}

/// In-flight missile ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct MissileView {
    /// The missile.
    pub missile: Missile,
    /// Remaining flight path, current position to destination.
    pub path: Vec<GeoLocation>,
    /// Time-to-impact label; `None` if the server timestamp is unreadable.
    pub impact: Option<String>,
    /// Whether the viewer stands inside the blast radius at the destination.
    pub viewer_in_blast_radius: bool,
}

/// Loot drop ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct LootView {
    /// The drop.
    pub loot: Loot,
    /// Expiry label; `None` if the server timestamp is unreadable.
    pub expiry: Option<String>,
    /// Image from the catalog.
    pub image: Option<String>,
}

/// Another player's marker.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMarker {
    /// Username.
    pub username: String,
    /// Drawn position.
    pub position: ObfuscatedPosition,
    /// Health points, if reported.
    pub health: Option<f64>,
}

fn label(
    timestamp: &str,
    now: DateTime<Utc>,
    format: fn(DateTime<Utc>, DateTime<Utc>) -> String,
) -> Option<String> {
    match parse_timestamp(timestamp) {
        Ok(at) => Some(format(at, now)),
        Err(e) => {
            debug!(error = %e, "unreadable timestamp");
            None
        }
    }
}

/// Landmines the viewer may see: their own anywhere, others within the
/// tier radius.
pub fn visible_landmines(landmines: &[Landmine], viewer: &Viewer) -> Vec<Landmine> {
    let here = viewer.location.location();
    landmines
        .iter()
        .filter(|mine| {
            is_visible(
                here.as_ref(),
                &viewer.username,
                &viewer.tier,
                &mine.location,
                Some(mine.placed_by.as_str()),
            )
        })
        .cloned()
        .collect()
}

/// Draw data for each missile.
pub fn missile_views(
    missiles: &[Missile],
    viewer: &Viewer,
    segments: usize,
    now: DateTime<Utc>,
) -> Vec<MissileView> {
    let here = viewer.location.location();
    missiles
        .iter()
        .map(|missile| MissileView {
            path: remaining_path(missile.current_location, missile.destination, segments),
            impact: label(&missile.eta_time_to_impact, now, format_impact),
            viewer_in_blast_radius: here
                .map(|here| within_radius(&here, &missile.destination, missile.radius))
                .unwrap_or(false),
            missile: missile.clone(),
        })
        .collect()
}

/// Draw data for each loot drop.
pub fn loot_views(loot: &[Loot], catalog: &dyn ImageCatalog, now: DateTime<Utc>) -> Vec<LootView> {
    loot.iter()
        .map(|drop| LootView {
            expiry: label(&drop.eta_time_to_expiry, now, format_expiry),
            image: catalog.image_for(drop.image_key()),
            loot: drop.clone(),
        })
        .collect()
}

/// Markers for active players.
///
/// Friends and the viewer themselves are drawn at their true location;
/// everyone else is jittered afresh.
pub fn player_markers<R: Rng + ?Sized>(
    players: &[PlayerPosition],
    viewer_name: &str,
    friends: &HashSet<String>,
    jitter: &JitterConfig,
    inactive_after: Duration,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<PlayerMarker> {
    players
        .iter()
        .filter(|player| player.is_active(now, inactive_after))
        .map(|player| {
            let exact = player.username == viewer_name || friends.contains(&player.username);
            PlayerMarker {
                username: player.username.clone(),
                position: obfuscate(rng, player.location(), exact, jitter),
                health: player.health,
            }
        })
        .collect()
}
