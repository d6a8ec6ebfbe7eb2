//! Entity Model
//!
//! Server-pushed world entities as a closed sum type over the recognized
//! `itemType` tags. Anything else lands in [`Entity::Unrecognized`] and is
//! dropped by the router.

use std::fmt;
use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Deserialize};

use crate::core::geo::GeoLocation;
use crate::network::protocol::Request;
use crate::world::expiry::parse_timestamp;

/// Players not updated for this long are inactive.
pub const INACTIVE_AFTER_HOURS: i64 = 12;

/// Server-assigned identifier; numeric or textual depending on the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric id.
    Number(i64),
    /// Textual id.
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// In-flight projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Missile {
    /// Identifier.
    #[serde(default)]
    pub id: Option<EntityId>,
    /// Missile model name.
    #[serde(rename = "type", default)]
    pub missile_type: String,
    /// Launch point, when the server includes it.
    #[serde(default)]
    pub location: Option<GeoLocation>,
    /// Current position along the flight path.
    pub current_location: GeoLocation,
    /// Target.
    pub destination: GeoLocation,
    /// Blast radius in metres.
    #[serde(default)]
    pub radius: f64,
    /// Damage on impact.
    #[serde(default)]
    pub damage: Option<f64>,
    /// Server status string (e.g. "Incoming", "Hit").
    #[serde(default)]
    pub status: String,
    /// Sender username.
    #[serde(default)]
    pub sent_by_username: String,
    /// Launch time (ISO-8601).
    #[serde(default)]
    pub time_sent: Option<String>,
    /// Impact time (ISO-8601).
    pub eta_time_to_impact: String,
}

impl Missile {
    /// Start of the full flight path: launch point if known, else the current position.
    pub fn origin(&self) -> GeoLocation {
        self.location.unwrap_or(self.current_location)
    }
}

/// Placed hazard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Landmine {
    /// Identifier.
    #[serde(default)]
    pub id: Option<EntityId>,
    /// Hazard type name.
    #[serde(rename = "type", default)]
    pub landmine_type: String,
    /// Position.
    pub location: GeoLocation,
    /// Username of the player who placed it.
    #[serde(default)]
    pub placed_by: String,
    /// Placement time (ISO-8601).
    #[serde(default)]
    pub placed_time: Option<String>,
    /// Expiry time (ISO-8601).
    pub eta_time_to_expiry: String,
    /// Damage when triggered.
    #[serde(default)]
    pub damage: Option<f64>,
}

/// Loot drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loot {
    /// Identifier.
    #[serde(default)]
    pub id: Option<EntityId>,
    /// Item name, used as the image catalog key when present.
    #[serde(default)]
    pub name: Option<String>,
    /// Rarity tier.
    #[serde(default)]
    pub rarity: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Position.
    pub location: GeoLocation,
    /// Expiry time (ISO-8601).
    pub eta_time_to_expiry: String,
}

impl Loot {
    /// Catalog key for this drop's image.
    pub fn image_key(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.rarity)
    }
}

/// Generic world object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Other {
    /// Identifier.
    #[serde(default)]
    pub id: Option<EntityId>,
    /// Object type name.
    #[serde(rename = "type", default)]
    pub other_type: String,
    /// Position.
    pub location: GeoLocation,
    /// Owner, if any.
    #[serde(default)]
    pub placed_by: Option<String>,
    /// Expiry time (ISO-8601).
    #[serde(default)]
    pub eta_time_to_expiry: Option<String>,
}

/// Reported position of another player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPosition {
    /// Username.
    pub username: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Health points.
    #[serde(default)]
    pub health: Option<f64>,
    /// Transport mode (walking, driving, ...).
    #[serde(default)]
    pub transport_status: Option<String>,
    /// Whether the player opted into a randomized location.
    #[serde(default)]
    pub random_location: bool,
    /// Creation time (ISO-8601).
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update time (ISO-8601).
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Soft-delete time (ISO-8601).
    #[serde(default)]
    pub deleted_at: Option<String>,
}

impl PlayerPosition {
    /// Position as a location.
    pub fn location(&self) -> GeoLocation {
        GeoLocation::new(self.latitude, self.longitude)
    }

    /// Whether the player belongs in the live view at `now`.
    ///
    /// Deleted players and players with a missing, unparseable, or too old
    /// `updatedAt` are inactive.
    pub fn is_active(&self, now: DateTime<Utc>, inactive_after: Duration) -> bool {
        if self.deleted_at.is_some() {
            return false;
        }
        match self.updated_at.as_deref().map(parse_timestamp) {
            Some(Ok(updated)) => now.signed_duration_since(updated) < inactive_after,
            _ => false,
        }
    }
}

/// A server-pushed entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "itemType")]
pub enum Entity {
    /// In-flight projectile.
    Missile(Missile),
    /// Placed hazard.
    Landmine(Landmine),
    /// Loot drop.
    Loot(Loot),
    /// Generic world object.
    Other(Other),
    /// Player position.
    #[serde(rename = "PlayerLocation")]
    Player(PlayerPosition),
    /// Any other `itemType`.
    #[serde(other)]
    Unrecognized,
}

impl Entity {
    /// Kind of this entity, `None` for unrecognized tags.
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            Self::Missile(_) => Some(EntityKind::Missile),
            Self::Landmine(_) => Some(EntityKind::Landmine),
            Self::Loot(_) => Some(EntityKind::Loot),
            Self::Other(_) => Some(EntityKind::Other),
            Self::Player(_) => Some(EntityKind::Player),
            Self::Unrecognized => None,
        }
    }
}

/// Recognized entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// Projectiles.
    Missile,
    /// Hazards.
    Landmine,
    /// Loot.
    Loot,
    /// Generic objects.
    Other,
    /// Player positions.
    Player,
}

impl EntityKind {
    /// All kinds.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Missile,
        EntityKind::Landmine,
        EntityKind::Loot,
        EntityKind::Other,
        EntityKind::Player,
    ];

    /// Wire `itemType` tag.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Missile => "Missile",
            Self::Landmine => "Landmine",
            Self::Loot => "Loot",
            Self::Other => "Other",
            Self::Player => "PlayerLocation",
        }
    }

    /// Pull request for this kind, if the server supports one.
    pub fn fetch_request(self) -> Option<Request> {
        match self {
            Self::Missile => Some(Request::FetchMissiles),
            Self::Landmine => Some(Request::FetchLandmines),
            Self::Loot => Some(Request::FetchLoot),
            Self::Other | Self::Player => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_missile() {
        let value = json!({
            "itemType": "Missile",
            "id": 17,
            "type": "Ballista",
            "currentLocation": { "latitude": 1.0, "longitude": 2.0 },
            "destination": { "latitude": 1.1, "longitude": 2.1 },
            "radius": 50,
            "status": "Incoming",
            "sentByUsername": "bob",
            "etaTimeToImpact": "2024-01-01T00:10:00Z"
        });

        let entity: Entity = serde_json::from_value(value).unwrap();
        let Entity::Missile(missile) = entity else {
            panic!("Wrong entity kind");
        };
        assert_eq!(missile.id, Some(EntityId::Number(17)));
        assert_eq!(missile.radius, 50.0);
        assert_eq!(missile.sent_by_username, "bob");
        assert_eq!(missile.origin(), GeoLocation::new(1.0, 2.0));
    }

    #[test]
    fn test_parse_landmine_with_text_id() {
        let value = json!({
            "itemType": "Landmine",
            "id": "lm-9",
            "type": "Claymore",
            "location": { "latitude": 5.0, "longitude": 6.0 },
            "placedBy": "carol",
            "etaTimeToExpiry": "2024-01-01T00:00:00Z"
        });

        let entity: Entity = serde_json::from_value(value).unwrap();
        assert_eq!(entity.kind(), Some(EntityKind::Landmine));
        if let Entity::Landmine(mine) = entity {
            assert_eq!(mine.id, Some(EntityId::Text("lm-9".into())));
            assert_eq!(mine.placed_by, "carol");
        }
    }

    #[test]
    fn test_unknown_tag_is_unrecognized() {
        let entity: Entity =
            serde_json::from_value(json!({ "itemType": "Spaceship", "x": 1 })).unwrap();
        assert_eq!(entity, Entity::Unrecognized);
        assert_eq!(entity.kind(), None);
    }

    #[test]
    fn test_missing_tag_is_error() {
        assert!(serde_json::from_value::<Entity>(json!({ "rarity": "rare" })).is_err());
    }

    #[test]
    fn test_player_activity() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut player = PlayerPosition {
            username: "dave".into(),
            latitude: 0.0,
            longitude: 0.0,
            health: Some(100.0),
            transport_status: None,
            random_location: false,
            created_at: None,
            updated_at: Some("2024-06-01T01:00:00Z".into()),
            deleted_at: None,
        };
        let window = Duration::hours(INACTIVE_AFTER_HOURS);

        assert!(player.is_active(now, window));

        player.updated_at = Some("2024-06-01T00:00:00Z".into());
        assert!(!player.is_active(now, window), "exactly 12h is inactive");

        player.updated_at = Some("2024-06-01T11:00:00Z".into());
        player.deleted_at = Some("2024-06-01T11:30:00Z".into());
        assert!(!player.is_active(now, window));

        player.deleted_at = None;
        player.updated_at = None;
        assert!(!player.is_active(now, window));
    }

    #[test]
    fn test_fetch_requests() {
        assert_eq!(EntityKind::Missile.fetch_request(), Some(Request::FetchMissiles));
        assert_eq!(EntityKind::Landmine.fetch_request(), Some(Request::FetchLandmines));
        assert_eq!(EntityKind::Loot.fetch_request(), Some(Request::FetchLoot));
        assert_eq!(EntityKind::Player.fetch_request(), None);
    }
}
