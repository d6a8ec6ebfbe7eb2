//! Flight Paths
//!
//! Evenly spaced points along the great circle between a launch point and a
//! target, used to draw an in-flight projectile's path.

use crate::core::geo::{bearing, destination, distance, GeoLocation};

/// Points from `start` to `end` split into `segments` equal legs.
///
/// Returns `segments + 1` points. The first and last are exactly `start` and
/// `end`; intermediate points lie at `total * i / segments` along the initial
/// bearing. A segment count of zero is treated as one.
pub fn trajectory(start: GeoLocation, end: GeoLocation, segments: usize) -> Vec<GeoLocation> {
    let segments = segments.max(1);
    let total = distance(&start, &end);
    let heading = bearing(&start, &end);

    let mut points = Vec::with_capacity(segments + 1);
    points.push(start);
    for i in 1..segments {
        let leg = total * i as f64 / segments as f64;
        points.push(destination(&start, heading, leg));
    }
    points.push(end);

    points
}

/// Remaining portion of a flight path: from the projectile's current location
/// to its destination. This is the decaying path drawn while in flight.
pub fn remaining_path(
    current: GeoLocation,
    destination: GeoLocation,
    segments: usize,
) -> Vec<GeoLocation> {
    trajectory(current, destination, segments)
}
