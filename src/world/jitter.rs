//! Position Jitter
//!
//! Non-friend players are never drawn at their true position. A random
//! circle center is chosen within `offset_radius_m` of the true location, and
//! the marker is placed at a random point within `display_radius_m` of that
//! center. Fresh randomness is drawn on every call, so repeated samples of the
//! same location do not converge on it.

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::core::geo::{destination, GeoLocation};

/// Jitter radii.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JitterConfig {
    /// Whether jitter is applied at all.
    pub enabled: bool,
    /// Maximum distance of the visibility circle center from the true location.
    pub offset_radius_m: f64,
    /// Maximum distance of the marker from the circle center.
    pub display_radius_m: f64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            offset_radius_m: 250.0,
            display_radius_m: 100.0,
        }
    }
}

/// Where to draw a player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObfuscatedPosition {
    /// Center of the visibility circle.
    pub circle_center: GeoLocation,
    /// Marker position.
    pub marker: GeoLocation,
    /// Whether any jitter was applied.
    pub jittered: bool,
}

impl ObfuscatedPosition {
    /// The true location, unmodified.
    pub fn exact(location: GeoLocation) -> Self {
        Self {
            circle_center: location,
            marker: location,
            jittered: false,
        }
    }
}

/// Uniformly random point within `radius_m` of `center`.
pub fn random_point_within<R: Rng + ?Sized>(
    rng: &mut R,
    center: &GeoLocation,
    radius_m: f64,
) -> GeoLocation {
    if radius_m <= 0.0 {
        return *center;
    }
    // sqrt keeps the density uniform over the disc area
    let dist = radius_m * rng.gen::<f64>().sqrt();
    let heading = rng.gen_range(0.0..360.0);
    destination(center, heading, dist)
}

/// Compute the drawn position of a player.
pub fn obfuscate<R: Rng + ?Sized>(
    rng: &mut R,
    true_location: GeoLocation,
    is_friend: bool,
    config: &JitterConfig,
) -> ObfuscatedPosition {
    if is_friend || !config.enabled {
        return ObfuscatedPosition::exact(true_location);
    }

    let circle_center = random_point_within(rng, &true_location, config.offset_radius_m);
    let marker = random_point_within(rng, &circle_center, config.display_radius_m);

    ObfuscatedPosition {
        circle_center,
        marker,
        jittered: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::distance;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const HOME: GeoLocation = GeoLocation::new(52.5200, 13.4050);

    #[test]
    fn test_friend_sees_true_location() {
        let mut rng = StdRng::seed_from_u64(7);
        let pos = obfuscate(&mut rng, HOME, true, &JitterConfig::default());
        assert_eq!(pos, ObfuscatedPosition::exact(HOME));
    }

    #[test]
    fn test_disabled_uses_true_location() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = JitterConfig { enabled: false, ..Default::default() };
        let pos = obfuscate(&mut rng, HOME, false, &config);
        assert_eq!(pos.marker, HOME);
        assert_eq!(pos.circle_center, HOME);
        assert!(!pos.jittered);
    }

    #[test]
    fn test_bounds_hold() {
        let config = JitterConfig::default();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..1_000 {
            let pos = obfuscate(&mut rng, HOME, false, &config);
            assert!(pos.jittered);
            assert!(distance(&HOME, &pos.circle_center) <= config.offset_radius_m + 1e-6);
            assert!(distance(&pos.circle_center, &pos.marker) <= config.display_radius_m + 1e-6);
        }
    }

    #[test]
    fn test_recomputed_per_call() {
        let config = JitterConfig::default();
        let mut rng = StdRng::seed_from_u64(99);

        let first = obfuscate(&mut rng, HOME, false, &config);
        let second = obfuscate(&mut rng, HOME, false, &config);
        assert_ne!(first.marker, second.marker);
    }

    #[test]
    fn test_zero_radius_is_identity() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(random_point_within(&mut rng, &HOME, 0.0), HOME);
    }
}
