//! Sync Layer
//!
//! Entity model, the typed store the connection driver writes into, the
//! event bus, and the [`SyncContext`] that ties them to a connection.

pub mod context;
pub mod entity;
pub mod events;
pub mod location;
pub mod store;
pub mod views;

pub use context::SyncContext;
pub use entity::{Entity, EntityId, EntityKind, Landmine, Loot, Missile, Other, PlayerPosition};
pub use events::{EventBus, Subscription, SyncEvent, Topic};
pub use location::{LocationError, LocationProvider, ViewerLocation};
pub use store::{EntityStore, RouteOutcome, SinglePayloadPolicy};
pub use views::{ImageCatalog, LootView, MissileView, PlayerMarker, Viewer};
