use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct DrivingCsvRecord {
    id_orig: String,
    id_dest: String,
    distance_m: Option<f64>,
}

/// Driving distances keyed by origin, then destination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrivingDistances {
    by_origin: HashMap<String, HashMap<String, f64>>,
}

impl DrivingDistances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id_orig: String, id_dest: String, distance: f64) {
        self.by_origin
            .entry(id_orig)
            .or_default()
            .insert(id_dest, distance);
    }

    pub fn get(&self, id_orig: &str, id_dest: &str) -> Option<f64> {
        self.by_origin.get(id_orig)?.get(id_dest).copied()
    }

    /// Number of (origin, destination) pairs.
    pub fn len(&self) -> usize {
        self.by_origin.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<((String, String), f64)> for DrivingDistances {
    fn from_iter<I: IntoIterator<Item = ((String, String), f64)>>(iter: I) -> Self {
        let mut distances = DrivingDistances::new();
        for ((id_orig, id_dest), distance) in iter {
            distances.insert(id_orig, id_dest, distance);
        }
        distances
    }
}

/// Reads a precomputed road-network distance table (`id_orig, id_dest, distance_m`).
///
/// Rows with an empty distance are skipped so the pair shows up as missing later.
pub fn read_driving_distances(path: &Path) -> Result<DrivingDistances> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening driving distances '{}'", path.display()))?;
    let mut distances = DrivingDistances::new();
    for (idx, result) in rdr.deserialize::<DrivingCsvRecord>().enumerate() {
        let record = result.with_context(|| {
            format!("parsing driving distance row {} of '{}'", idx + 2, path.display())
        })?;
        let Some(distance) = record.distance_m else {
            continue;
        };
        if !(distance.is_finite() && distance >= 0.0) {
            bail!(
                "driving distance {distance} for ({}, {}) is not a non-negative number",
                record.id_orig,
                record.id_dest
            );
        }
        distances.insert(record.id_orig, record.id_dest, distance);
    }
    Ok(distances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_pairs_and_skips_blank_distances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("testing_driving_distances.csv");
        fs::write(
            &path,
            "id_orig,id_dest,distance_m\nb1,s1,1200.5\nb1,s2,\nb2,s1,800\n",
        )
        .unwrap();
        let distances = read_driving_distances(&path).unwrap();
        assert_eq!(distances.len(), 2);
        assert_eq!(distances.get("b1", "s1"), Some(1200.5));
        assert_eq!(distances.get("b1", "s2"), None);
        assert_eq!(distances.get("b9", "s1"), None);
    }

    #[test]
    fn negative_distance_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.csv");
        fs::write(&path, "id_orig,id_dest,distance_m\nb1,s1,-3\n").unwrap();
        assert!(read_driving_distances(&path).is_err());
    }
}
