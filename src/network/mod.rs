//! Network Layer
//!
//! WebSocket connection lifecycle and the wire format spoken over it.
//! Everything that touches sockets or the filesystem lives here; derived
//! geospatial facts live in `world/`.

pub mod backoff;
pub mod codec;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use backoff::Backoff;
pub use codec::{decode, encode, CodecError, Decoded, FrameFormat, Payload};
pub use connection::{
    ConnectionConfig, ConnectionError, ConnectionManager, ConnectionState, ConnectionStatus,
};
pub use protocol::{Command, Envelope, Request};
pub use storage::{CachedLocation, LocalState, LocalStore, StorageError};
