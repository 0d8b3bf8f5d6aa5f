use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use polleq_core::{classify_raw, Site};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SiteCsvRecord {
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Address", default)]
    address: Option<String>,
    #[serde(rename = "Location type")]
    location_type: String,
    #[serde(rename = "Lat, Long")]
    lat_long: String,
}

/// Reads the candidate-site table.
///
/// `dest_type` is the raw category from the type text (`potential` when it contains
/// "Potential", `polling` otherwise); the cleaner reclassifies against the run's years.
pub fn read_sites(path: &Path) -> Result<Vec<Site>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening candidate sites '{}'", path.display()))?;
    let mut sites = Vec::new();
    for (idx, result) in rdr.deserialize::<SiteCsvRecord>().enumerate() {
        let record = result.with_context(|| {
            format!("parsing candidate site row {} of '{}'", idx + 2, path.display())
        })?;
        let (lat, lon) = parse_lat_long(&record.lat_long)
            .with_context(|| format!("site '{}' in '{}'", record.location, path.display()))?;
        sites.push(Site {
            id: record.location,
            address: record.address.filter(|a| !a.is_empty()),
            lat,
            lon,
            dest_type: classify_raw(&record.location_type),
            location_type: record.location_type,
        });
    }
    Ok(sites)
}

/// Splits a `"lat, lon"` string into two numbers.
pub fn parse_lat_long(value: &str) -> Result<(f64, f64)> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| anyhow!("expected 'lat, long', found '{value}'"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .with_context(|| format!("invalid latitude in '{value}'"))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .with_context(|| format!("invalid longitude in '{value}'"))?;
    Ok((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polleq_core::DestType;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_sites_and_splits_coordinates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locations_only.csv");
        fs::write(
            &path,
            "Location,Address,Location type,\"Lat, Long\"\n\
             Central Library,1 Main St,polling_2020,\"33.75, -84.39\"\n\
             Station 4,22 Oak Ave,Elec Day Fire - Potential,\"33.70,-84.41\"\n",
        )
        .unwrap();

        let sites = read_sites(&path).unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].id, "Central Library");
        assert_eq!(sites[0].lat, 33.75);
        assert_eq!(sites[0].lon, -84.39);
        assert_eq!(sites[0].dest_type, DestType::Polling);
        assert_eq!(sites[1].dest_type, DestType::Potential);
        assert_eq!(sites[1].address.as_deref(), Some("22 Oak Ave"));
    }

    #[test]
    fn rejects_malformed_coordinates() {
        assert!(parse_lat_long("33.7").is_err());
        assert!(parse_lat_long("north, -84").is_err());
    }
}
