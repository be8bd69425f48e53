//! Ground-to-satellite visibility
//!
//! Topocentric look angles from a ground point to a propagated object:
//! geodetic -> ECEF, GMST rotation of the TEME state into ECEF, then the
//! SEZ (South-East-Zenith) transform. Elevation against a threshold is the
//! visibility test used by the plane selector and the contention scheduler.

use crate::{OrbitalObject, Result};
use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const EARTH_RADIUS_KM: f64 = 6378.137;
const EARTH_FLATTENING: f64 = 1.0 / 298.257223563;

/// A fixed point on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GroundPoint {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

impl GroundPoint {
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_km: 0.0,
        }
    }
}

/// Look angles from a ground point to a satellite.
#[derive(Debug, Clone, Copy)]
pub struct LookAngles {
    /// Azimuth in degrees, 0 = North, 90 = East.
    pub azimuth_deg: f64,
    /// Elevation above the horizon in degrees.
    pub elevation_deg: f64,
    /// Slant range in km.
    pub range_km: f64,
}

/// Convert a geodetic position to ECEF, km.
pub fn geodetic_to_ecef(ground: &GroundPoint) -> Vector3<f64> {
    let lat = ground.latitude_deg.to_radians();
    let lon = ground.longitude_deg.to_radians();
    let alt = ground.altitude_km;

    let e2 = 2.0 * EARTH_FLATTENING - EARTH_FLATTENING * EARTH_FLATTENING;
    let n = EARTH_RADIUS_KM / (1.0 - e2 * lat.sin().powi(2)).sqrt();

    Vector3::new(
        (n + alt) * lat.cos() * lon.cos(),
        (n + alt) * lat.cos() * lon.sin(),
        (n * (1.0 - e2) + alt) * lat.sin(),
    )
}

/// Greenwich Mean Sidereal Time in radians, normalized to [0, 2π).
pub fn gmst_rad(time: DateTime<Utc>) -> f64 {
    let jd = time.timestamp() as f64 / 86400.0 + 2440587.5;
    let t = (jd - 2451545.0) / 36525.0;

    let gmst_sec = 67310.54841
        + (876600.0 * 3600.0 + 8640184.812866) * t
        + 0.093104 * t * t
        - 6.2e-6 * t * t * t;

    // 86400 sidereal seconds per revolution -> 240 s per degree.
    let gmst = ((gmst_sec % 86400.0) / 240.0).to_radians();
    gmst.rem_euclid(2.0 * PI)
}

/// Rotate a TEME/ECI position into ECEF by the given GMST.
fn teme_to_ecef(teme: Vector3<f64>, gmst: f64) -> Vector3<f64> {
    let (sin_g, cos_g) = gmst.sin_cos();
    Vector3::new(
        cos_g * teme.x + sin_g * teme.y,
        -sin_g * teme.x + cos_g * teme.y,
        teme.z,
    )
}

/// Look angles from a ground point to a TEME position at `time`.
pub fn look_angles(ground: &GroundPoint, sat_teme_km: [f64; 3], time: DateTime<Utc>) -> LookAngles {
    let sat_ecef = teme_to_ecef(Vector3::from(sat_teme_km), gmst_rad(time));
    let gs_ecef = geodetic_to_ecef(ground);
    let range_vec = sat_ecef - gs_ecef;
    let range = range_vec.norm();

    let lat = ground.latitude_deg.to_radians();
    let lon = ground.longitude_deg.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    // SEZ components of the range vector.
    let s = sin_lat * cos_lon * range_vec.x + sin_lat * sin_lon * range_vec.y - cos_lat * range_vec.z;
    let e = -sin_lon * range_vec.x + cos_lon * range_vec.y;
    let z = cos_lat * cos_lon * range_vec.x + cos_lat * sin_lon * range_vec.y + sin_lat * range_vec.z;

    // S points away from North, so it enters negated.
    let azimuth = e.atan2(-s).rem_euclid(2.0 * PI);
    let elevation = (z / range).asin();

    LookAngles {
        azimuth_deg: azimuth.to_degrees(),
        elevation_deg: elevation.to_degrees(),
        range_km: range,
    }
}

/// Topocentric elevation of `object` from `ground` at `time`, degrees.
pub fn elevation_deg(
    ground: &GroundPoint,
    object: &OrbitalObject,
    time: DateTime<Utc>,
) -> Result<f64> {
    let state = object.propagate(time)?;
    Ok(look_angles(ground, state.position, time).elevation_deg)
}

/// Whether `object` is above `min_elevation_deg` as seen from `ground`.
///
/// A propagation failure degrades to "not visible"; it never aborts the
/// caller's loop.
pub fn is_visible(
    ground: &GroundPoint,
    object: &OrbitalObject,
    time: DateTime<Utc>,
    min_elevation_deg: f64,
) -> bool {
    elevation_deg(ground, object, time)
        .map(|e| e > min_elevation_deg)
        .unwrap_or(false)
}
