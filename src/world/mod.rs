//! Derived World Facts
//!
//! Geospatial and temporal derivations computed on read from entity
//! snapshots. Nothing here mutates the store.

pub mod expiry;
pub mod jitter;
pub mod trajectory;
pub mod visibility;

pub use expiry::{expiry_text, impact_text, parse_timestamp, TemporalError};
pub use jitter::{obfuscate, JitterConfig, ObfuscatedPosition};
pub use trajectory::trajectory;
pub use visibility::{is_visible, visibility_radius, League, DEFAULT_VISIBILITY_RADIUS_M};
