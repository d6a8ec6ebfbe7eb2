//! Durable Local Flags
//!
//! A tiny bincode file holding the keys other parts of the client read
//! without touching the socket: whether the connection is healthy, and the
//! last known device location.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::geo::GeoLocation;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure.
    #[error("storage encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Last known device location with its fix time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CachedLocation {
    /// Location.
    pub location: GeoLocation,
    /// When the fix was taken.
    pub recorded_at: DateTime<Utc>,
}

/// Persisted keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalState {
    /// Whether a live connection is currently open.
    pub connection_healthy: bool,
    /// Last known device location.
    pub last_known_location: Option<CachedLocation>,
}

/// File-backed (or in-memory) store for [`LocalState`].
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    state: Mutex<LocalState>,
}

impl LocalStore {
    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(LocalState::default()),
        }
    }

    /// Open a file-backed store, loading existing state.
    ///
    /// A missing file starts empty. A corrupt file is logged and replaced on
    /// the next write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read(&path) {
            Ok(bytes) => match bincode::deserialize::<LocalState>(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding corrupt local state");
                    LocalState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocalState::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of all keys.
    pub fn snapshot(&self) -> LocalState {
        self.lock().clone()
    }

    /// Whether a live connection is currently open.
    pub fn connection_healthy(&self) -> bool {
        self.lock().connection_healthy
    }

    /// Record connection health. Writes only when the value changes.
    pub fn set_connection_healthy(&self, healthy: bool) -> Result<(), StorageError> {
        let mut state = self.lock();
        if state.connection_healthy == healthy {
            return Ok(());
        }
        let next = LocalState {
            connection_healthy: healthy,
            ..state.clone()
        };
        self.commit(&mut state, next)
    }

    /// Last known device location.
    pub fn last_known_location(&self) -> Option<CachedLocation> {
        self.lock().last_known_location
    }

    /// Record a fresh device location fix.
    pub fn remember_location(
        &self,
        location: GeoLocation,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock();
        let next = LocalState {
            last_known_location: Some(CachedLocation { location, recorded_at }),
            ..state.clone()
        };
        self.commit(&mut state, next)
    }

    /// Memory follows the file: `next` is kept only once it is on disk.
    fn commit(&self, state: &mut LocalState, next: LocalState) -> Result<(), StorageError> {
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    fn persist(&self, state: &LocalState) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = bincode::serialize(state)?;
        // Write-then-rename so readers never see a torn file.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "persisted local state");
        Ok(())
    }
}
