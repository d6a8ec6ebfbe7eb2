//! Great-Circle Geodesy
//!
//! Spherical-earth distance, bearing and destination math on WGS84
//! latitude/longitude pairs. Accuracy is that of the haversine model, which is
//! well inside the tolerance of consumer GPS fixes at the distances involved.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A point on the Earth's surface, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl GeoLocation {
    /// Create a new location.
    #[inline]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Distance to another location in metres.
    #[inline]
    pub fn distance_to(&self, other: &GeoLocation) -> f64 {
        distance(self, other)
    }

    /// Whether both coordinates are finite and inside their valid ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for GeoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Haversine great-circle distance between two locations, in metres.
pub fn distance(a: &GeoLocation, b: &GeoLocation) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Whether `b` lies within `radius_m` metres of `a` (inclusive).
#[inline]
pub fn within_radius(a: &GeoLocation, b: &GeoLocation, radius_m: f64) -> bool {
    distance(a, b) <= radius_m
}

/// Initial great-circle bearing from `from` towards `to`, in degrees [0, 360).
pub fn bearing(from: &GeoLocation, to: &GeoLocation) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let d_lambda = (to.longitude - from.longitude).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Point reached by travelling `distance_m` metres from `origin` along the
/// great circle with initial bearing `bearing_deg`.
pub fn destination(origin: &GeoLocation, bearing_deg: f64, distance_m: f64) -> GeoLocation {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = origin.latitude.to_radians();
    let lambda1 = origin.longitude.to_radians();

    let sin_phi2 = phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos();
    let phi2 = sin_phi2.clamp(-1.0, 1.0).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * sin_phi2);

    // Normalise longitude back into [-180, 180].
    let longitude = (lambda2.to_degrees() + 540.0) % 360.0 - 180.0;

    GeoLocation::new(phi2.to_degrees(), longitude)
}
