//! # Geostrike Sync
//!
//! Real-time geospatial entity synchronization for the Geostrike client.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    GEOSTRIKE SYNC                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Pure primitives                           │
//! │  ├── geo.rs      - GeoLocation, haversine, bearings          │
//! │  └── clock.rs    - Injected clock                            │
//! │                                                              │
//! │  world/          - Derived geospatial/temporal facts         │
//! │  ├── visibility.rs - League tier airspace                    │
//! │  ├── trajectory.rs - Great-circle flight paths               │
//! │  ├── jitter.rs   - Privacy offsets for player markers        │
//! │  └── expiry.rs   - Remaining-time display text               │
//! │                                                              │
//! │  network/        - Wire and connection lifecycle             │
//! │  ├── protocol.rs - Outgoing command envelope                 │
//! │  ├── codec.rs    - MessagePack with JSON fallback            │
//! │  ├── backoff.rs  - Reconnect schedule                        │
//! │  ├── storage.rs  - Durable local flags                       │
//! │  └── connection.rs - WebSocket connection manager            │
//! │                                                              │
//! │  sync/           - Entity store and composition root         │
//! │  ├── entity.rs   - Tagged entity model                       │
//! │  ├── store.rs    - Typed per-kind collections                │
//! │  ├── events.rs   - Topic event bus                           │
//! │  ├── location.rs - Viewer location resolution                │
//! │  ├── views.rs    - Derived map views                         │
//! │  └── context.rs  - Shared connection context                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! The store is a replace-on-receipt cache. The server is the only source of
//! entities; the client never creates or deletes them, and expiry is computed
//! when a view is read.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod sync;
pub mod world;

// Re-export commonly used types
pub use config::SyncConfig;
pub use core::clock::{Clock, FixedClock, SystemClock};
pub use core::geo::{distance, GeoLocation};
pub use error::SyncError;
pub use network::connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use sync::context::SyncContext;
pub use sync::entity::{Entity, EntityKind};
pub use sync::events::{SyncEvent, Topic};
pub use sync::location::{LocationProvider, ViewerLocation};
pub use sync::views::{ImageCatalog, Viewer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
