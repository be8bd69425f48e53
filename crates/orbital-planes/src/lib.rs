//! Orbital Plane Selection Library
//!
//! TLE catalog loading, ground-to-satellite visibility checks, and selection
//! of the most populous orbital planes currently overhead a ground point.
//! The selected plane membership feeds the random-access contention simulator
//! as its serving constellation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

pub mod catalog;
pub mod planes;
pub mod visibility;

pub use catalog::{filter_by_prefix, load_tle_file};
pub use planes::select_planes;
pub use visibility::{is_visible, GroundPoint};

/// Elevation threshold for the seed-satellite visibility test, degrees.
pub const SEED_ELEVATION_DEG: f64 = 10.0;

/// Two objects on the same plane differ by less than 1° in inclination.
pub const INCLINATION_TOLERANCE_RAD: f64 = PI / 180.0;

/// Two objects on the same plane differ by less than 5° in RAAN.
pub const RAAN_TOLERANCE_RAD: f64 = 5.0 * PI / 180.0;

#[derive(Error, Debug)]
pub enum PlaneError {
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),
    #[error("Propagation failed for {object}: {reason}")]
    Propagation { object: String, reason: String },
}

pub type Result<T> = std::result::Result<T, PlaneError>;

/// A cataloged orbiting object. Immutable after load; the TLE line pair is
/// the propagation handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitalObject {
    pub name: String,
    pub norad_id: u64,
    /// Inclination in radians.
    pub inclination: f64,
    /// Right ascension of the ascending node in radians.
    pub raan: f64,
    pub tle_line1: String,
    pub tle_line2: String,
}

/// Geocentric TEME state at a point in time, km and km/s.
#[derive(Debug, Clone, Copy)]
pub struct StateVector {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub epoch: DateTime<Utc>,
}

impl OrbitalObject {
    /// Propagate to `time` via SGP4. Fails with [`PlaneError::Propagation`]
    /// when the underlying elements cannot be resolved; visibility callers
    /// degrade that to "not visible".
    pub fn propagate(&self, time: DateTime<Utc>) -> Result<StateVector> {
        let elements = sgp4::Elements::from_tle(
            Some(self.name.clone()),
            self.tle_line1.as_bytes(),
            self.tle_line2.as_bytes(),
        )
        .map_err(|e| PlaneError::Propagation {
            object: self.name.clone(),
            reason: format!("{e:?}"),
        })?;

        let constants = sgp4::Constants::from_elements(&elements).map_err(|e| {
            PlaneError::Propagation {
                object: self.name.clone(),
                reason: format!("{e:?}"),
            }
        })?;

        let epoch_utc = DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc);
        let minutes_since_epoch =
            time.signed_duration_since(epoch_utc).num_seconds() as f64 / 60.0;

        let prediction =
            constants
                .propagate(minutes_since_epoch)
                .map_err(|e| PlaneError::Propagation {
                    object: self.name.clone(),
                    reason: format!("{e:?}"),
                })?;

        Ok(StateVector {
            position: prediction.position,
            velocity: prediction.velocity,
            epoch: time,
        })
    }
}
