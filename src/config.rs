//! Client configuration.
//!
//! Everything has a default; [`SyncConfig::from_env`] overrides from
//! `GEOSTRIKE_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::network::connection::ConnectionConfig;
use crate::sync::entity::INACTIVE_AFTER_HOURS;
use crate::sync::events::DEFAULT_EVENT_CAPACITY;
use crate::sync::store::SinglePayloadPolicy;
use crate::world::jitter::JitterConfig;

/// Default number of legs in a drawn flight path.
pub const DEFAULT_TRAJECTORY_SEGMENTS: usize = 32;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Full client configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Connection settings.
    pub connection: ConnectionConfig,
    /// Local flag file; `None` keeps flags in memory.
    pub store_path: Option<PathBuf>,
    /// Player marker jitter.
    pub jitter: JitterConfig,
    /// Players not updated for this long are hidden.
    pub inactive_after: chrono::Duration,
    /// Handling of single-object payloads.
    pub single_payload_policy: SinglePayloadPolicy,
    /// Event bus capacity.
    pub event_capacity: usize,
    /// Legs per drawn flight path.
    pub trajectory_segments: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            store_path: None,
            jitter: JitterConfig::default(),
            inactive_after: chrono::Duration::hours(INACTIVE_AFTER_HOURS),
            single_payload_policy: SinglePayloadPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            trajectory_segments: DEFAULT_TRAJECTORY_SEGMENTS,
        }
    }
}

impl SyncConfig {
    /// Load from `GEOSTRIKE_*` environment variables, defaulting what is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let conn = &mut config.connection;

        if let Some(endpoint) = lookup("GEOSTRIKE_ENDPOINT") {
            conn.endpoint = endpoint;
        }
        if let Some(subprotocol) = lookup("GEOSTRIKE_SUBPROTOCOL") {
            conn.subprotocol = subprotocol;
        }
        if let Some(token) = lookup("GEOSTRIKE_TOKEN") {
            conn.auth_token = token;
        }
        if let Some(ms) = parse::<u64>(&lookup, "GEOSTRIKE_BACKOFF_BASE_MS")? {
            conn.backoff_base = Duration::from_millis(ms);
        }
        if let Some(max) = parse::<u32>(&lookup, "GEOSTRIKE_MAX_RECONNECTS")? {
            conn.max_reconnect_attempts = max;
        }

        config.store_path = lookup("GEOSTRIKE_STORE_PATH").map(PathBuf::from);

        if let Some(raw) = lookup("GEOSTRIKE_JITTER") {
            config.jitter.enabled = match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => true,
                "0" | "false" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "GEOSTRIKE_JITTER",
                        value: raw,
                    })
                }
            };
        }
        if let Some(m) = parse_radius(&lookup, "GEOSTRIKE_JITTER_OFFSET_M")? {
            config.jitter.offset_radius_m = m;
        }
        if let Some(m) = parse_radius(&lookup, "GEOSTRIKE_JITTER_DISPLAY_M")? {
            config.jitter.display_radius_m = m;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

fn parse_radius(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<f64>, ConfigError> {
    match parse::<f64>(lookup, key)? {
        Some(m) if !m.is_finite() || m < 0.0 => Err(ConfigError::InvalidValue {
            key,
            value: m.to_string(),
        }),
        other => Ok(other),
    }
}
