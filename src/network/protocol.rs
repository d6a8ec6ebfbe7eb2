//! Protocol Messages
//!
//! Outgoing command envelope. Every frame the client sends is
//! `{ "messages": [ <command> ] }`, where a command is either a tagged request
//! (`itemType`) or a bare location report (`lat`/`lon`).

use serde::{Serialize, Deserialize};

use crate::core::geo::GeoLocation;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Tagged requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "itemType")]
pub enum Request {
    /// Pull the current in-flight missiles.
    FetchMissiles,
    /// Pull the current loot drops.
    FetchLoot,
    /// Pull the current landmines.
    FetchLandmines,
    /// Handshake acknowledgment with the client's credential token.
    #[serde(rename = "authenticate")]
    Authenticate {
        /// Credential token.
        token: String,
    },
}

/// One command inside an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Tagged request.
    Request(Request),
    /// Report of the device's current location.
    Location {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lon: f64,
    },
}

impl Command {
    /// Location report for `location`.
    pub fn location(location: GeoLocation) -> Self {
        Self::Location {
            lat: location.latitude,
            lon: location.longitude,
        }
    }

    /// Authentication handshake.
    pub fn authenticate(token: impl Into<String>) -> Self {
        Self::Request(Request::Authenticate { token: token.into() })
    }
}

impl From<Request> for Command {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

/// Wire envelope wrapping outgoing commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Commands, in send order.
    pub messages: Vec<Command>,
}

impl Envelope {
    /// Envelope carrying a single command.
    pub fn single(command: impl Into<Command>) -> Self {
        Self {
            messages: vec![command.into()],
        }
    }
}
