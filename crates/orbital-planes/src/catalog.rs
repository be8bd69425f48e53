//! TLE catalog loading
//!
//! Parses 3-line element sets into [`OrbitalObject`]s. Individual malformed
//! records are skipped with a warning; only an unreadable source is fatal.

use crate::{OrbitalObject, PlaneError, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Load a 3LE catalog file from disk.
///
/// I/O failure maps to [`PlaneError::CatalogUnavailable`]; callers treat that
/// as "no constellation available" and abort before the simulation starts.
pub fn load_tle_file(path: &Path) -> Result<Vec<OrbitalObject>> {
    let text = fs::read_to_string(path)
        .map_err(|e| PlaneError::CatalogUnavailable(format!("{}: {e}", path.display())))?;
    let objects = parse_catalog(&text);
    info!("Loaded {} objects from {}", objects.len(), path.display());
    Ok(objects)
}

/// Parse 3LE text into orbital objects, skipping unparseable records.
pub fn parse_catalog(text: &str) -> Vec<OrbitalObject> {
    let lines: Vec<&str> = text.lines().collect();
    let mut objects = Vec::new();

    let mut i = 0;
    while i + 2 < lines.len() {
        let name = lines[i].trim();
        let line1 = lines[i + 1].trim();
        let line2 = lines[i + 2].trim();

        if !line1.starts_with('1') || !line2.starts_with('2') {
            i += 1;
            continue;
        }

        match sgp4::Elements::from_tle(
            Some(name.to_string()),
            line1.as_bytes(),
            line2.as_bytes(),
        ) {
            Ok(elements) => objects.push(OrbitalObject {
                name: elements.object_name.clone().unwrap_or_else(|| name.to_string()),
                norad_id: elements.norad_id,
                inclination: elements.inclination.to_radians(),
                raan: elements.right_ascension.to_radians(),
                tle_line1: line1.to_string(),
                tle_line2: line2.to_string(),
            }),
            Err(e) => warn!("Skipping unparseable TLE record '{name}': {e:?}"),
        }

        i += 3;
    }

    objects
}

/// Restrict the catalog to the operator's objects of interest.
pub fn filter_by_prefix(objects: Vec<OrbitalObject>, prefix: &str) -> Vec<OrbitalObject> {
    let total = objects.len();
    let filtered: Vec<OrbitalObject> = objects
        .into_iter()
        .filter(|o| o.name.starts_with(prefix))
        .collect();
    info!(
        "Catalog filter '{prefix}': {} of {total} objects retained",
        filtered.len()
    );
    filtered
}
