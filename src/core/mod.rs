//! Core primitives.
//!
//! Everything in this module is a pure function of its inputs so it can be
//! called from any number of readers without locking.

pub mod clock;
pub mod geo;

pub use clock::{Clock, FixedClock, SystemClock};
pub use geo::{bearing, destination, distance, within_radius, GeoLocation, EARTH_RADIUS_M};
