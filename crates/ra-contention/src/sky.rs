//! Sky models
//!
//! Seam between the contention loop and orbital geometry. The scheduler only
//! asks two questions per terminal and satellite: "is it overhead right now"
//! and "how long until it no longer is". [`PropagatedSky`] answers from TLE
//! propagation; [`UniformSky`] is the fixed everything-visible model used for
//! baseline runs and deterministic tests.

use chrono::{DateTime, Duration, Utc};
use orbital_planes::visibility::{is_visible, GroundPoint};
use orbital_planes::OrbitalObject;

/// Per-satellite visibility and coverage timing, as seen from a ground point.
pub trait SkyModel {
    /// Number of serving satellites in this sky.
    fn satellite_count(&self) -> usize;

    /// Whether satellite `sat` is overhead `ground` at `at`.
    fn visible(&self, ground: &GroundPoint, sat: usize, at: DateTime<Utc>) -> bool;

    /// Remaining coverage time γ of satellite `sat` for `ground`, seconds.
    fn remaining_pass_s(&self, ground: &GroundPoint, sat: usize, at: DateTime<Utc>) -> f64;

    /// Maximum pass duration T_max, seconds. Upper bound for γ.
    fn max_pass_s(&self) -> f64;
}

/// Every satellite always visible, with coverage cycling over a fixed pass
/// period. This is the traffic-model control sky: it isolates contention
/// behavior from orbital geometry.
pub struct UniformSky {
    satellites: usize,
    max_pass_s: f64,
    start: DateTime<Utc>,
}

impl UniformSky {
    pub fn new(satellites: usize, max_pass_s: f64, start: DateTime<Utc>) -> Self {
        Self {
            satellites,
            max_pass_s,
            start,
        }
    }
}

impl SkyModel for UniformSky {
    fn satellite_count(&self) -> usize {
        self.satellites
    }

    fn visible(&self, _ground: &GroundPoint, _sat: usize, _at: DateTime<Utc>) -> bool {
        true
    }

    fn remaining_pass_s(&self, _ground: &GroundPoint, _sat: usize, at: DateTime<Utc>) -> f64 {
        let elapsed = (at - self.start).num_milliseconds() as f64 / 1000.0;
        self.max_pass_s - elapsed.rem_euclid(self.max_pass_s)
    }

    fn max_pass_s(&self) -> f64 {
        self.max_pass_s
    }
}

/// Sky backed by SGP4 propagation of selected plane members.
pub struct PropagatedSky {
    objects: Vec<OrbitalObject>,
    min_elevation_deg: f64,
    /// Forward-scan step for the remaining-coverage estimate; one RAO.
    scan_step_s: f64,
    max_pass_s: f64,
}

impl PropagatedSky {
    pub fn new(
        objects: Vec<OrbitalObject>,
        min_elevation_deg: f64,
        scan_step_s: f64,
        max_pass_s: f64,
    ) -> Self {
        Self {
            objects,
            min_elevation_deg,
            scan_step_s,
            max_pass_s,
        }
    }

    pub fn objects(&self) -> &[OrbitalObject] {
        &self.objects
    }
}

impl SkyModel for PropagatedSky {
    fn satellite_count(&self) -> usize {
        self.objects.len()
    }

    fn visible(&self, ground: &GroundPoint, sat: usize, at: DateTime<Utc>) -> bool {
        is_visible(ground, &self.objects[sat], at, self.min_elevation_deg)
    }

    /// Scan forward in RAO steps until the satellite drops below the
    /// elevation threshold, capped at T_max. Propagation failures terminate
    /// the scan as "coverage over".
    fn remaining_pass_s(&self, ground: &GroundPoint, sat: usize, at: DateTime<Utc>) -> f64 {
        let step = Duration::milliseconds((self.scan_step_s * 1000.0) as i64);
        let steps = (self.max_pass_s / self.scan_step_s).ceil() as u32;

        let mut t = at;
        for i in 0..steps {
            t += step;
            if !self.visible(ground, sat, t) {
                return (i as f64 + 1.0) * self.scan_step_s;
            }
        }
        self.max_pass_s
    }

    fn max_pass_s(&self) -> f64 {
        self.max_pass_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    #[test]
    fn uniform_sky_coverage_cycles_over_the_pass_period() {
        let start = Utc.with_ymd_and_hms(2026, 2, 12, 20, 0, 0).unwrap();
        let sky = UniformSky::new(2, 600.0, start);
        let ground = GroundPoint::new(25.03, 121.56);

        assert_relative_eq!(sky.remaining_pass_s(&ground, 0, start), 600.0);
        assert_relative_eq!(
            sky.remaining_pass_s(&ground, 0, start + Duration::seconds(150)),
            450.0
        );
        // One full period later the cycle restarts.
        assert_relative_eq!(
            sky.remaining_pass_s(&ground, 1, start + Duration::seconds(600)),
            600.0
        );
        assert!(sky.visible(&ground, 0, start));
    }

    #[test]
    fn uniform_sky_remaining_never_exceeds_max() {
        let start = Utc.with_ymd_and_hms(2026, 2, 12, 20, 0, 0).unwrap();
        let sky = UniformSky::new(1, 600.0, start);
        let ground = GroundPoint::new(0.0, 0.0);

        for s in 0..2000 {
            let g = sky.remaining_pass_s(&ground, 0, start + Duration::seconds(s));
            assert!(g > 0.0 && g <= 600.0, "γ = {g} at +{s}s");
        }
    }

    // Historic ISS element set with valid checksums; epoch 2008-09-20.
    fn iss() -> OrbitalObject {
        OrbitalObject {
            name: "ISS (ZARYA)".into(),
            norad_id: 25544,
            inclination: 51.6416_f64.to_radians(),
            raan: 247.4627_f64.to_radians(),
            tle_line1: "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927"
                .into(),
            tle_line2: "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537"
                .into(),
        }
    }

    #[test]
    fn propagated_sky_caps_remaining_coverage_at_the_pass_maximum() {
        // A threshold below the physical elevation floor makes every
        // successful propagation count as visible, so the forward scan runs
        // its full horizon and returns the cap.
        let sky = PropagatedSky::new(vec![iss()], -91.0, 0.64, 600.0);
        let ground = GroundPoint::new(25.03, 121.56);
        let at = Utc.with_ymd_and_hms(2008, 9, 20, 12, 30, 0).unwrap();

        assert_eq!(sky.satellite_count(), 1);
        assert!(sky.visible(&ground, 0, at));
        assert_relative_eq!(sky.remaining_pass_s(&ground, 0, at), 600.0);
    }

    #[test]
    fn propagated_sky_scan_stops_at_loss_of_visibility() {
        // A threshold above the physical ceiling fails the very first scan
        // step, so the estimate is a single RAO period.
        let sky = PropagatedSky::new(vec![iss()], 91.0, 0.64, 600.0);
        let ground = GroundPoint::new(25.03, 121.56);
        let at = Utc.with_ymd_and_hms(2008, 9, 20, 12, 30, 0).unwrap();

        assert!(!sky.visible(&ground, 0, at));
        assert_relative_eq!(sky.remaining_pass_s(&ground, 0, at), 0.64);
    }
}
