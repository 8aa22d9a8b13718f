//! Geographic helpers for the Hawaiian Islands service region
//!
//! The analysis pipeline only accepts coordinates inside the Hawaiian
//! Islands bounding region; everything else is rejected before an
//! analysis record exists.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hawaiian Islands bounding region (covers Kauai through the Big Island)
pub const HAWAII_MIN_LAT: f64 = 18.9;
pub const HAWAII_MAX_LAT: f64 = 22.2;
pub const HAWAII_MIN_LON: f64 = -160.3;
pub const HAWAII_MAX_LON: f64 = -154.8;

/// Earth radius in meters for haversine distance
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check whether the coordinates lie within the Hawaiian Islands bounds
    pub fn is_in_hawaii(&self) -> bool {
        (HAWAII_MIN_LAT..=HAWAII_MAX_LAT).contains(&self.latitude)
            && (HAWAII_MIN_LON..=HAWAII_MAX_LON).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Distance between two points in meters using the haversine formula
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_r.cos() * lat2_r.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Deterministic 0.0-1.0 variation value for a coordinate pair.
///
/// Demo-mode providers use this to vary their synthetic observations by
/// location while staying reproducible: the same click always produces
/// the same demo data.
pub fn coordinate_variation(latitude: f64, longitude: f64) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(format!("{:.3},{:.3}", latitude, longitude).as_bytes());
    let digest = hasher.finalize();
    digest[0] as f64 / 255.0
}
