//! Typed Entity Store
//!
//! Routes decoded payloads into per-kind collections. Each kind present in a
//! batch replaces that kind's collection wholesale; kinds absent from the
//! batch are left alone. Readers get `Arc<[T]>` snapshots and never block the
//! writer for longer than a pointer swap.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use serde::{Serialize, Deserialize};
use serde_json::Value;
use tracing::debug;

use crate::network::codec::Payload;
use crate::sync::entity::{Entity, EntityKind, Landmine, Loot, Missile, Other, PlayerPosition};

/// What to do with a single-object (non-array) payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinglePayloadPolicy {
    /// Treat it as a one-element batch: the kind's collection becomes just this entity.
    #[default]
    Replace,
    /// Append it to the kind's current collection.
    Append,
}

/// Result of routing one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Kinds whose collection changed, in [`EntityKind`] order.
    pub updated: Vec<EntityKind>,
    /// Elements ignored: missing or unknown `itemType`, or a malformed body.
    pub dropped: usize,
}

#[derive(Debug, Clone)]
struct Collections {
    missiles: Arc<[Missile]>,
    landmines: Arc<[Landmine]>,
    loot: Arc<[Loot]>,
    others: Arc<[Other]>,
    players: Arc<[PlayerPosition]>,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            missiles: Arc::from(Vec::new()),
            landmines: Arc::from(Vec::new()),
            loot: Arc::from(Vec::new()),
            others: Arc::from(Vec::new()),
            players: Arc::from(Vec::new()),
        }
    }
}

/// Entities of one payload, grouped by kind. `None` means the kind was absent.
#[derive(Default)]
struct Batch {
    missiles: Option<Vec<Missile>>,
    landmines: Option<Vec<Landmine>>,
    loot: Option<Vec<Loot>>,
    others: Option<Vec<Other>>,
    players: Option<Vec<PlayerPosition>>,
    dropped: usize,
}

impl Batch {
    fn push(&mut self, value: Value) {
        let entity = match serde_json::from_value::<Entity>(value) {
            Ok(entity) => entity,
            Err(e) => {
                debug!(error = %e, "ignoring entity without a usable itemType or body");
                self.dropped += 1;
                return;
            }
        };
        match entity {
            Entity::Missile(m) => self.missiles.get_or_insert_with(Vec::new).push(m),
            Entity::Landmine(l) => self.landmines.get_or_insert_with(Vec::new).push(l),
            Entity::Loot(l) => self.loot.get_or_insert_with(Vec::new).push(l),
            Entity::Other(o) => self.others.get_or_insert_with(Vec::new).push(o),
            Entity::Player(p) => self.players.get_or_insert_with(Vec::new).push(p),
            Entity::Unrecognized => {
                debug!("ignoring entity with unrecognized itemType");
                self.dropped += 1;
            }
        }
    }
}

fn merge<T: Clone>(
    slot: &mut Arc<[T]>,
    incoming: Option<Vec<T>>,
    append: bool,
    kind: EntityKind,
    updated: &mut Vec<EntityKind>,
) {
    let Some(incoming) = incoming else {
        return;
    };
    *slot = if append {
        slot.iter().cloned().chain(incoming).collect()
    } else {
        Arc::from(incoming)
    };
    updated.push(kind);
}

/// Per-kind entity collections.
#[derive(Debug, Default)]
pub struct EntityStore {
    collections: RwLock<Collections>,
    policy: SinglePayloadPolicy,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new(policy: SinglePayloadPolicy) -> Self {
        Self {
            collections: RwLock::new(Collections::default()),
            policy,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.collections.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current missiles.
    pub fn missiles(&self) -> Arc<[Missile]> {
        self.read().missiles.clone()
    }

    /// Current landmines.
    pub fn landmines(&self) -> Arc<[Landmine]> {
        self.read().landmines.clone()
    }

    /// Current loot.
    pub fn loot(&self) -> Arc<[Loot]> {
        self.read().loot.clone()
    }

    /// Current generic objects.
    pub fn others(&self) -> Arc<[Other]> {
        self.read().others.clone()
    }

    /// Current player positions, active or not.
    pub fn player_positions(&self) -> Arc<[PlayerPosition]> {
        self.read().players.clone()
    }

    /// Number of entities of a kind.
    pub fn count(&self, kind: EntityKind) -> usize {
        let collections = self.read();
        match kind {
            EntityKind::Missile => collections.missiles.len(),
            EntityKind::Landmine => collections.landmines.len(),
            EntityKind::Loot => collections.loot.len(),
            EntityKind::Other => collections.others.len(),
            EntityKind::Player => collections.players.len(),
        }
    }

    /// Route a decoded payload into the collections.
    ///
    /// Only the connection driver calls this; consumers have read access only.
    pub(crate) fn apply(&self, payload: Payload) -> RouteOutcome {
        let mut batch = Batch::default();
        let append = match payload {
            Payload::Batch(items) => {
                for item in items {
                    batch.push(item);
                }
                false
            }
            Payload::Single(item) => {
                batch.push(item);
                self.policy == SinglePayloadPolicy::Append
            }
        };

        let mut updated = Vec::new();
        {
            let mut c = self.collections.write().unwrap_or_else(PoisonError::into_inner);
            merge(&mut c.missiles, batch.missiles, append, EntityKind::Missile, &mut updated);
            merge(&mut c.landmines, batch.landmines, append, EntityKind::Landmine, &mut updated);
            merge(&mut c.loot, batch.loot, append, EntityKind::Loot, &mut updated);
            merge(&mut c.others, batch.others, append, EntityKind::Other, &mut updated);
            merge(&mut c.players, batch.players, append, EntityKind::Player, &mut updated);
        }

        RouteOutcome {
            updated,
            dropped: batch.dropped,
        }
    }
}
