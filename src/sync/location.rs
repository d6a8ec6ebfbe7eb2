//! Viewer location resolution.
//!
//! A live fix wins. If the device momentarily cannot produce one, the last
//! known location from the local store stands in. A denied permission is a
//! state the views handle, not an error.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::core::geo::GeoLocation;
use crate::network::storage::{CachedLocation, LocalStore};

/// Why a live fix could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The user denied location access.
    #[error("location permission denied")]
    PermissionDenied,
    /// No fix available right now.
    #[error("location unavailable")]
    Unavailable,
}

/// Source of live device fixes.
pub trait LocationProvider: Send + Sync {
    /// Current device location.
    fn current_location(&self) -> Result<GeoLocation, LocationError>;
}

/// Resolved viewer location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerLocation {
    /// Fresh fix.
    Live(GeoLocation),
    /// Last known location, used while live fixes are unavailable.
    Cached(CachedLocation),
    /// The user denied location access.
    PermissionDenied,
    /// No live fix and nothing cached.
    Unknown,
}

impl ViewerLocation {
    /// Resolve a live fix result against the cached fallback.
    ///
    /// A successful live fix is also remembered as the new last known
    /// location, stamped with `now`.
    pub fn resolve(
        live: Result<GeoLocation, LocationError>,
        local: &LocalStore,
        now: DateTime<Utc>,
    ) -> Self {
        match live {
            Ok(location) => {
                if let Err(e) = local.remember_location(location, now) {
                    debug!(error = %e, "failed to cache live location");
                }
                Self::Live(location)
            }
            Err(LocationError::PermissionDenied) => Self::PermissionDenied,
            Err(LocationError::Unavailable) => match local.last_known_location() {
                Some(cached) => Self::Cached(cached),
                None => Self::Unknown,
            },
        }
    }

    /// Usable location, if any.
    pub fn location(&self) -> Option<GeoLocation> {
        match self {
            Self::Live(location) => Some(*location),
            Self::Cached(cached) => Some(cached.location),
            Self::PermissionDenied | Self::Unknown => None,
        }
    }

    /// Whether access was denied.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}
