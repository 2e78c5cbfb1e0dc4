//! Great-circle distance and lat/lng bounding boxes

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two (lat, lng) pairs given in degrees.
///
/// Inputs are not range-checked. Rounding can push the haversine term past
/// 1.0 for near-antipodal points, so it is clamped to keep the result finite.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = ((d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

pub fn valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
}

pub fn valid_longitude(lng: f64) -> bool {
    (-180.0..=180.0).contains(&lng)
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundingBoxError {
    #[error("latitude must be between -90 and 90, longitude between -180 and 180")]
    OutOfRange,
    #[error("minimum latitude/longitude must be less than maximum latitude/longitude")]
    Inverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn new(
        min_lat: f64,
        min_lng: f64,
        max_lat: f64,
        max_lng: f64,
    ) -> Result<Self, BoundingBoxError> {
        if !valid_latitude(min_lat)
            || !valid_latitude(max_lat)
            || !valid_longitude(min_lng)
            || !valid_longitude(max_lng)
        {
            return Err(BoundingBoxError::OutOfRange);
        }
        if min_lat >= max_lat || min_lng >= max_lng {
            return Err(BoundingBoxError::Inverted);
        }
        Ok(Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        })
    }

    /// The whole globe; used by maintenance paths that refill everything.
    pub fn world() -> Self {
        Self {
            min_lat: -90.0,
            min_lng: -180.0,
            max_lat: 90.0,
            max_lng: 180.0,
        }
    }

    /// Edges are inclusive.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}
