//! Accuracy-circle geometry.
//!
//! Uses a local flat-earth (equirectangular) approximation: fine for radii in
//! the tens to low hundreds of meters at moderate latitudes. It is not
//! geodesically exact and is not meant to be.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Radius used when a position carries no accuracy figure.
pub const DEFAULT_ACCURACY_METERS: f64 = 15.0;

/// Number of vertices on the ring, excluding the closing point.
pub const DEFAULT_SEGMENTS: usize = 64;

/// Kilometers per degree of latitude.
const KM_PER_DEG_LAT: f64 = 110.574;

/// Kilometers per degree of longitude at the equator.
const KM_PER_DEG_LON_EQUATOR: f64 = 111.32;

/// A geographic coordinate in `(longitude, latitude)` order, matching GeoJSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lon: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// `[lon, lat]` pair as used in GeoJSON coordinate arrays.
    pub fn to_array(self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// Closed ring approximating a circle of `radius_m` meters around `center`.
///
/// Returns `segments + 1` points; the last one repeats the first.
pub fn accuracy_polygon(center: LngLat, radius_m: f64, segments: usize) -> Vec<LngLat> {
    if segments == 0 {
        return Vec::new();
    }

    let mut ring = Vec::with_capacity(segments + 1);
    for i in 0..segments {
        let theta = (i as f64 / segments as f64) * std::f64::consts::TAU;
        ring.push(offset(center, radius_m, theta));
    }
    ring.push(ring[0]);
    ring
}

/// Point `meters` away from `center` at angle `theta` (radians, counter-clockwise
/// from east), on the same flat-earth approximation as the accuracy ring.
pub fn offset(center: LngLat, meters: f64, theta: f64) -> LngLat {
    let km = meters / 1000.0;
    let d_lon = km / (KM_PER_DEG_LON_EQUATOR * center.lat.to_radians().cos());
    let d_lat = km / KM_PER_DEG_LAT;
    LngLat::new(
        center.lon + d_lon * theta.cos(),
        center.lat + d_lat * theta.sin(),
    )
}

/// The accuracy ring wrapped as a GeoJSON `Feature` with `Polygon` geometry,
/// ready to be handed to a map source. `None` falls back to the default radius.
pub fn accuracy_feature(center: LngLat, accuracy_m: Option<f64>) -> Value {
    let radius = accuracy_m.unwrap_or(DEFAULT_ACCURACY_METERS);
    let ring: Vec<[f64; 2]> = accuracy_polygon(center, radius, DEFAULT_SEGMENTS)
        .into_iter()
        .map(LngLat::to_array)
        .collect();

    serde_json::json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [ring],
        },
    })
}
