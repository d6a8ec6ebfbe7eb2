//! Crate-level error type.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::network::connection::ConnectionError;
use crate::network::storage::StorageError;
use crate::sync::entity::EntityKind;

/// Errors surfaced by [`SyncContext`](crate::SyncContext).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Connection failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Local flag file failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The server has no pull request for this kind; it is push-only.
    #[error("{0} cannot be fetched on demand")]
    NotFetchable(EntityKind),

    /// No update arrived in time.
    #[error("no update within {0:?}")]
    Timeout(Duration),

    /// The context shut down while waiting.
    #[error("context shut down")]
    Closed,
}
