//! Sync Context
//!
//! Composition root. One context owns one connection manager, one entity
//! store and one event bus; clones share them. Dropping the last clone tears
//! the connection down.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{info, instrument};

use crate::config::SyncConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::core::geo::GeoLocation;
use crate::error::SyncError;
use crate::network::connection::{ConnectionManager, ConnectionStatus};
use crate::network::protocol::{Command, Envelope};
use crate::network::storage::LocalStore;
use crate::sync::entity::{EntityKind, Landmine, Loot, Missile, Other, PlayerPosition};
use crate::sync::events::{EventBus, Subscription, SyncEvent, Topic};
use crate::sync::location::{LocationProvider, ViewerLocation};
use crate::sync::store::EntityStore;
use crate::sync::views::{self, ImageCatalog, LootView, MissileView, PlayerMarker, Viewer};

struct Inner {
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    local: Arc<LocalStore>,
    store: Arc<EntityStore>,
    bus: EventBus,
    manager: ConnectionManager,
}

/// Shared handle to the sync client.
#[derive(Clone)]
pub struct SyncContext {
    inner: Arc<Inner>,
}

impl SyncContext {
    /// Build a context on the system clock. Does not connect.
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a context from `GEOSTRIKE_*` environment variables.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::new(SyncConfig::from_env()?)
    }

    /// Build a context on an injected clock.
    pub fn with_clock(config: SyncConfig, clock: Arc<dyn Clock>) -> Result<Self, SyncError> {
        let local = Arc::new(match &config.store_path {
            Some(path) => LocalStore::open(path)?,
            None => LocalStore::in_memory(),
        });
        let store = Arc::new(EntityStore::new(config.single_payload_policy));
        let bus = EventBus::new(config.event_capacity);
        let manager = ConnectionManager::new(
            config.connection.clone(),
            store.clone(),
            bus.clone(),
            local.clone(),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                clock,
                local,
                store,
                bus,
                manager,
            }),
        })
    }

    /// Open the connection.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), SyncError> {
        self.inner.manager.connect().await?;
        Ok(())
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn shutdown(&self) {
        info!("shutting down sync context");
        self.inner.manager.shutdown();
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.manager.status()
    }

    /// Persisted connection health flag.
    pub fn connection_healthy(&self) -> bool {
        self.inner.local.connection_healthy()
    }

    /// Configuration in use.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Subscribe to one topic.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.inner.bus.subscribe(topic)
    }

    /// Subscribe to every topic.
    pub fn subscribe_all(&self) -> Subscription {
        self.inner.bus.subscribe_all()
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Current missiles.
    pub fn missiles(&self) -> Arc<[Missile]> {
        self.inner.store.missiles()
    }

    /// Current landmines, unfiltered.
    pub fn landmines(&self) -> Arc<[Landmine]> {
        self.inner.store.landmines()
    }

    /// Current loot.
    pub fn loot(&self) -> Arc<[Loot]> {
        self.inner.store.loot()
    }

    /// Current generic objects.
    pub fn others(&self) -> Arc<[Other]> {
        self.inner.store.others()
    }

    /// Current player positions, including inactive ones.
    pub fn player_positions(&self) -> Arc<[PlayerPosition]> {
        self.inner.store.player_positions()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Ask the server to push the current collection of `kind`.
    pub fn request(&self, kind: EntityKind) -> Result<(), SyncError> {
        let request = kind.fetch_request().ok_or(SyncError::NotFetchable(kind))?;
        self.inner.manager.send(&Envelope::single(request))?;
        Ok(())
    }

    /// Request `kind` and wait for the next entity update.
    ///
    /// Updates are broadcasts without correlation ids, so this resolves on
    /// the next update of any kind. Returns the kinds that changed.
    pub async fn fetch(
        &self,
        kind: EntityKind,
        timeout: Duration,
    ) -> Result<Vec<EntityKind>, SyncError> {
        // Subscribe before sending so a fast reply cannot be missed.
        let mut updates = self.subscribe(Topic::EntitiesUpdated);
        self.request(kind)?;

        match tokio::time::timeout(timeout, updates.recv()).await {
            Ok(Some(SyncEvent::EntitiesUpdated { kinds, .. })) => Ok(kinds),
            Ok(_) => Err(SyncError::Closed),
            Err(_) => Err(SyncError::Timeout(timeout)),
        }
    }

    /// Report the device location to the server and cache it locally.
    ///
    /// The location is cached even if sending fails.
    pub fn report_location(&self, location: GeoLocation) -> Result<(), SyncError> {
        self.inner.local.remember_location(location, self.inner.clock.now())?;
        self.inner.manager.send(&Envelope::single(Command::location(location)))?;
        Ok(())
    }

    /// Resolve the viewer's location from a live provider, falling back to
    /// the cached fix.
    pub fn locate(&self, provider: &dyn LocationProvider) -> ViewerLocation {
        let now = self.inner.clock.now();
        ViewerLocation::resolve(provider.current_location(), &self.inner.local, now)
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Landmines visible to `viewer`.
    pub fn visible_landmines(&self, viewer: &Viewer) -> Vec<Landmine> {
        views::visible_landmines(&self.landmines(), viewer)
    }

    /// Flight paths and impact labels for every missile.
    pub fn missile_views(&self, viewer: &Viewer) -> Vec<MissileView> {
        views::missile_views(
            &self.missiles(),
            viewer,
            self.inner.config.trajectory_segments,
            self.inner.clock.now(),
        )
    }

    /// Expiry labels and images for every loot drop.
    pub fn loot_views(&self, catalog: &dyn ImageCatalog) -> Vec<LootView> {
        views::loot_views(&self.loot(), catalog, self.inner.clock.now())
    }

    /// Markers for active players, jittered afresh on every call.
    pub fn player_markers<R: Rng + ?Sized>(
        &self,
        viewer_name: &str,
        friends: &HashSet<String>,
        rng: &mut R,
    ) -> Vec<PlayerMarker> {
        views::player_markers(
            &self.player_positions(),
            viewer_name,
            friends,
            &self.inner.config.jitter,
            self.inner.config.inactive_after,
            self.inner.clock.now(),
            rng,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::network::connection::ConnectionState;
    use crate::sync::location::LocationError;
    use chrono::{TimeZone, Utc};

    struct Denied;

    impl LocationProvider for Denied {
        fn current_location(&self) -> Result<GeoLocation, LocationError> {
            Err(LocationError::PermissionDenied)
        }
    }

    struct Flaky;

    impl LocationProvider for Flaky {
        fn current_location(&self) -> Result<GeoLocation, LocationError> {
            Err(LocationError::Unavailable)
        }
    }

    fn context() -> SyncContext {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        SyncContext::with_clock(SyncConfig::default(), clock).unwrap()
    }

    #[test]
    fn test_new_context_is_idle() {
        let ctx = context();
        assert_eq!(ctx.status().state, ConnectionState::Closed);
        assert!(!ctx.connection_healthy());
        assert!(ctx.missiles().is_empty());
        assert!(ctx.player_positions().is_empty());
    }

    #[test]
    fn test_push_only_kinds_not_fetchable() {
        let ctx = context();
        assert!(matches!(
            ctx.request(EntityKind::Player),
            Err(SyncError::NotFetchable(EntityKind::Player))
        ));
        assert!(matches!(ctx.request(EntityKind::Other), Err(SyncError::NotFetchable(_))));
    }

    #[test]
    fn test_request_while_closed() {
        let ctx = context();
        assert!(matches!(ctx.request(EntityKind::Loot), Err(SyncError::Connection(_))));
    }

    #[test]
    fn test_report_location_caches_even_when_offline() {
        let ctx = context();
        let here = GeoLocation::new(12.0, 34.0);

        assert!(ctx.report_location(here).is_err());
        assert!(matches!(ctx.locate(&Flaky), ViewerLocation::Cached(c) if c.location == here));
        assert!(ctx.locate(&Denied).is_permission_denied());
    }

    #[test]
    fn test_clones_share_state() {
        let ctx = context();
        let other = ctx.clone();
        let _sub = ctx.subscribe(Topic::EntitiesUpdated);
        assert_eq!(other.inner.bus.subscriber_count(), 1);
    }

    #[test]
    fn test_from_env_reports_bad_config() {
        std::env::set_var("GEOSTRIKE_BACKOFF_BASE_MS", "soon");
        let result = SyncContext::from_env();
        std::env::remove_var("GEOSTRIKE_BACKOFF_BASE_MS");

        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[tokio::test]
    async fn test_fetch_fails_fast_when_closed() {
        let ctx = context();
        let result = ctx.fetch(EntityKind::Missile, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(SyncError::Connection(_))));
    }
}
