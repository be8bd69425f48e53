//! Orbital plane selection
//!
//! Identifies the most populous orbital planes currently overhead a ground
//! point and returns their full catalog membership. Clustering of seed
//! fingerprints is a deliberate first-fit-by-discovery-order policy: a seed
//! binds to the first matching candidate, so the result depends on catalog
//! enumeration order. That matches the legacy behavior this selector replaces.

use crate::visibility::{is_visible, GroundPoint};
use crate::{
    OrbitalObject, INCLINATION_TOLERANCE_RAD, RAAN_TOLERANCE_RAD, SEED_ELEVATION_DEG,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::f64::consts::PI;
use tracing::{debug, info};

/// A candidate plane: representative (inclination, RAAN) plus the number of
/// seed objects assigned to it. Exists only during selection.
#[derive(Debug, Clone, Copy)]
pub struct PlaneCandidate {
    /// Representative inclination, radians.
    pub inclination: f64,
    /// Representative RAAN, radians.
    pub raan: f64,
    /// Seed fingerprints assigned to this candidate.
    pub seeds: usize,
}

/// Whether two (inclination, RAAN) pairs belong to the same plane under the
/// 1° / 5° tolerances. RAAN is compared on the circle: a raw difference above
/// π wraps to 2π minus itself, so 2° and 358° are 4° apart.
pub fn same_plane(inc_a: f64, raan_a: f64, inc_b: f64, raan_b: f64) -> bool {
    if (inc_a - inc_b).abs() >= INCLINATION_TOLERANCE_RAD {
        return false;
    }
    let mut d_raan = (raan_a - raan_b).abs();
    if d_raan > PI {
        d_raan = 2.0 * PI - d_raan;
    }
    d_raan < RAAN_TOLERANCE_RAD
}

/// Single-pass greedy clustering of seed fingerprints into plane candidates.
///
/// Each fingerprint joins the first existing candidate it matches, in
/// discovery order, or opens a new candidate with count 1.
pub fn cluster_seeds(fingerprints: &[(f64, f64)]) -> Vec<PlaneCandidate> {
    let mut candidates: Vec<PlaneCandidate> = Vec::new();

    for &(inc, raan) in fingerprints {
        match candidates
            .iter_mut()
            .find(|c| same_plane(inc, raan, c.inclination, c.raan))
        {
            Some(candidate) => candidate.seeds += 1,
            None => candidates.push(PlaneCandidate {
                inclination: inc,
                raan,
                seeds: 1,
            }),
        }
    }

    candidates
}

/// Sort candidates by seed count descending and keep the first `top_n`.
/// The sort is stable, so ties keep their discovery order.
pub fn top_candidates(mut candidates: Vec<PlaneCandidate>, top_n: usize) -> Vec<PlaneCandidate> {
    candidates.sort_by(|a, b| b.seeds.cmp(&a.seeds));
    candidates.truncate(top_n);
    candidates
}

/// Full membership of the selected planes: every catalog object matching any
/// representative within tolerance, seeds or not.
pub fn membership(catalog: &[OrbitalObject], planes: &[PlaneCandidate]) -> Vec<OrbitalObject> {
    catalog
        .iter()
        .filter(|o| {
            planes
                .iter()
                .any(|p| same_plane(o.inclination, o.raan, p.inclination, p.raan))
        })
        .cloned()
        .collect()
}

/// Select the `top_n` most populous visible planes and return their full
/// catalog membership.
///
/// An empty catalog (or one with no visible seeds) yields an empty result;
/// callers treat that as "no constellation available" and abort before the
/// simulation loop, never mid-run.
pub fn select_planes(
    catalog: &[OrbitalObject],
    reference_time: DateTime<Utc>,
    ground: &GroundPoint,
    top_n: usize,
) -> Vec<OrbitalObject> {
    // Seed pass: objects above the elevation threshold right now. Fingerprints
    // are deduplicated by exact value; the clustering wants a population
    // count, not a per-object list.
    let mut seen: HashSet<(u64, u64)> = HashSet::new();
    let mut fingerprints: Vec<(f64, f64)> = Vec::new();

    for object in catalog {
        if is_visible(ground, object, reference_time, SEED_ELEVATION_DEG)
            && seen.insert((object.inclination.to_bits(), object.raan.to_bits()))
        {
            fingerprints.push((object.inclination, object.raan));
        }
    }

    info!(
        "Found {} seed fingerprints among {} catalog objects",
        fingerprints.len(),
        catalog.len()
    );

    let candidates = cluster_seeds(&fingerprints);
    let selected = top_candidates(candidates, top_n);

    for (rank, plane) in selected.iter().enumerate() {
        debug!(
            "Plane {rank}: inc {:.2}°, RAAN {:.2}°, {} seeds",
            plane.inclination.to_degrees(),
            plane.raan.to_degrees(),
            plane.seeds
        );
    }

    let members = membership(catalog, &selected);
    info!(
        "Selected {} planes with {} member satellites",
        selected.len(),
        members.len()
    );

    members
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str, inc_deg: f64, raan_deg: f64) -> OrbitalObject {
        OrbitalObject {
            name: name.to_string(),
            norad_id: 0,
            inclination: inc_deg.to_radians(),
            raan: raan_deg.to_radians(),
            tle_line1: String::new(),
            tle_line2: String::new(),
        }
    }

    #[test]
    fn raan_comparison_wraps_around_zero() {
        // 2° and 358° are 4° apart on the circle, within the 5° tolerance.
        assert!(same_plane(
            53.0_f64.to_radians(),
            2.0_f64.to_radians(),
            53.0_f64.to_radians(),
            358.0_f64.to_radians()
        ));
        // 2° and 350° are 12° apart.
        assert!(!same_plane(
            53.0_f64.to_radians(),
            2.0_f64.to_radians(),
            53.0_f64.to_radians(),
            350.0_f64.to_radians()
        ));
    }

    #[test]
    fn inclination_gate_rejects_before_raan() {
        assert!(!same_plane(
            53.0_f64.to_radians(),
            10.0_f64.to_radians(),
            55.0_f64.to_radians(),
            10.0_f64.to_radians()
        ));
    }

    #[test]
    fn first_fit_clustering_counts_population() {
        let mut fingerprints = Vec::new();
        for i in 0..40 {
            fingerprints.push((53.0_f64.to_radians(), (10.0 + 0.01 * i as f64).to_radians()));
        }
        for i in 0..25 {
            fingerprints.push((53.0_f64.to_radians(), (120.0 + 0.01 * i as f64).to_radians()));
        }
        for i in 0..3 {
            fingerprints.push((97.5_f64.to_radians(), (200.0 + 0.01 * i as f64).to_radians()));
        }

        let candidates = cluster_seeds(&fingerprints);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].seeds, 40);
        assert_eq!(candidates[1].seeds, 25);
        assert_eq!(candidates[2].seeds, 3);
    }

    #[test]
    fn top_n_keeps_most_populous_planes_and_expands_membership() {
        let mut catalog = Vec::new();
        // Plane A: 40 seeds near RAAN 10°, plus 5 non-seed members.
        for i in 0..45 {
            catalog.push(object(&format!("A-{i}"), 53.0, 10.0 + 0.01 * i as f64));
        }
        // Plane B: 25 members near RAAN 120°.
        for i in 0..25 {
            catalog.push(object(&format!("B-{i}"), 53.0, 120.0 + 0.01 * i as f64));
        }
        // Plane C: 3 members, should be cut by top_n = 2.
        for i in 0..3 {
            catalog.push(object(&format!("C-{i}"), 97.5, 200.0 + 0.01 * i as f64));
        }

        // Only the first 40 of plane A were visible at the reference time.
        let fingerprints: Vec<(f64, f64)> = catalog
            .iter()
            .filter(|o| !o.name.starts_with("A-") || o.name[2..].parse::<usize>().unwrap() < 40)
            .map(|o| (o.inclination, o.raan))
            .collect();
        let selected = top_candidates(cluster_seeds(&fingerprints), 2);
        assert_eq!(selected.len(), 2);

        let members = membership(&catalog, &selected);
        assert_eq!(members.len(), 45 + 25);
        assert!(members.iter().all(|o| !o.name.starts_with("C-")));
    }

    #[test]
    fn fewer_planes_than_requested_returns_all() {
        let fingerprints = vec![(53.0_f64.to_radians(), 10.0_f64.to_radians())];
        let selected = top_candidates(cluster_seeds(&fingerprints), 4);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn clustering_is_idempotent_for_a_fixed_input() {
        let fingerprints = vec![
            (53.0_f64.to_radians(), 10.0_f64.to_radians()),
            (53.0_f64.to_radians(), 10.5_f64.to_radians()),
            (53.0_f64.to_radians(), 120.0_f64.to_radians()),
        ];
        let a = cluster_seeds(&fingerprints);
        let b = cluster_seeds(&fingerprints);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.seeds, y.seeds);
            assert_eq!(x.inclination.to_bits(), y.inclination.to_bits());
            assert_eq!(x.raan.to_bits(), y.raan.to_bits());
        }
    }
}
