//! The canonical origin-destination distances CSV.
//!
//! Column order:
//! `id_orig, id_dest, distance_m, address, dest_lat, dest_lon, orig_lat, orig_lon,
//! location_type, dest_type, population, white, black, native, asian, pacific_islander,
//! other, multiple_races, hispanic, non_hispanic, source`.
//! Missing distances are written as empty fields.

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use polleq_core::{Demographics, DistanceTable, OdRecord, DEMOGRAPHIC_COLUMNS};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::paths::ensure_dir;

const LEADING_COLUMNS: [&str; 10] = [
    "id_orig",
    "id_dest",
    "distance_m",
    "address",
    "dest_lat",
    "dest_lon",
    "orig_lat",
    "orig_lon",
    "location_type",
    "dest_type",
];

fn header() -> Vec<&'static str> {
    let mut columns: Vec<&'static str> = LEADING_COLUMNS.to_vec();
    columns.extend(DEMOGRAPHIC_COLUMNS);
    columns.push("source");
    columns
}

/// Writes the table, replacing any existing file only once the write succeeded.
pub fn write_distance_table(path: &Path, table: &DistanceTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut wtr = WriterBuilder::new()
            .from_path(&tmp)
            .with_context(|| format!("creating distances file '{}'", tmp.display()))?;
        wtr.write_record(header())?;
        for record in &table.records {
            let mut row: Vec<String> = vec![
                record.id_orig.clone(),
                record.id_dest.clone(),
                record.distance_m.map(|d| d.to_string()).unwrap_or_default(),
                record.address.clone().unwrap_or_default(),
                record.dest_lat.to_string(),
                record.dest_lon.to_string(),
                record.orig_lat.to_string(),
                record.orig_lon.to_string(),
                record.location_type.clone(),
                record.dest_type.as_str().to_string(),
            ];
            row.extend(record.demographics.values().iter().map(|v| v.to_string()));
            row.push(record.source.as_str().to_string());
            wtr.write_record(&row)
                .with_context(|| format!("writing distances row to '{}'", tmp.display()))?;
        }
        wtr.flush()
            .with_context(|| format!("flushing distances file '{}'", tmp.display()))?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("moving distances file into '{}'", path.display()))?;
    info!(path = %path.display(), rows = table.len(), "wrote distances table");
    Ok(())
}

/// Reads a table previously written by [`write_distance_table`].
pub fn read_distance_table(path: &Path) -> Result<DistanceTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening distances file '{}'", path.display()))?;
    let headers = rdr.headers()?.clone();
    let expected = header();
    let positions: Vec<usize> = expected
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h == *name)
                .ok_or_else(|| anyhow!("column '{name}' missing from '{}'", path.display()))
        })
        .collect::<Result<_>>()?;

    let mut records = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let raw = result.with_context(|| format!("reading row {} of '{}'", idx + 2, path.display()))?;
        let record = parse_row(&raw, &positions)
            .with_context(|| format!("parsing row {} of '{}'", idx + 2, path.display()))?;
        records.push(record);
    }
    Ok(DistanceTable::new(records))
}

fn parse_row(raw: &StringRecord, positions: &[usize]) -> Result<OdRecord> {
    let field = |i: usize| raw.get(positions[i]).unwrap_or_default().trim();
    let number = |i: usize| -> Result<f64> {
        field(i)
            .parse::<f64>()
            .with_context(|| format!("'{}' in column '{}' is not a number", field(i), header()[i]))
    };
    let distance = match field(2) {
        "" => None,
        text => Some(
            text.parse::<f64>()
                .with_context(|| format!("invalid distance_m '{text}'"))?,
        ),
    };
    let mut demo = [0.0; 10];
    for (k, slot) in demo.iter_mut().enumerate() {
        *slot = number(LEADING_COLUMNS.len() + k)?;
    }
    let address = field(3);
    Ok(OdRecord {
        id_orig: field(0).to_string(),
        id_dest: field(1).to_string(),
        address: (!address.is_empty()).then(|| address.to_string()),
        dest_lat: number(4)?,
        dest_lon: number(5)?,
        orig_lat: number(6)?,
        orig_lon: number(7)?,
        location_type: field(8).to_string(),
        dest_type: field(9).parse()?,
        demographics: Demographics::from_values(demo),
        distance_m: distance,
        source: field(LEADING_COLUMNS.len() + DEMOGRAPHIC_COLUMNS.len()).parse()?,
        weighted_dist: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polleq_core::{Block, DestType, DistanceSource, Site};
    use tempfile::tempdir;

    #[test]
    fn written_table_reads_back() {
        let block = Block {
            id: "131350501051000".into(),
            lat: 33.9,
            lon: -84.0,
            demographics: Demographics {
                population: 12.0,
                black: 7.0,
                non_hispanic: 12.0,
                ..Demographics::default()
            },
        };
        let site = Site {
            id: "Church, Main St".into(),
            address: None,
            lat: 33.95,
            lon: -84.05,
            location_type: "Elec Day Church - Potential".into(),
            dest_type: DestType::Potential,
        };
        let table = DistanceTable::new(vec![
            OdRecord::from_parts(&block, &site, Some(1523.25), DistanceSource::Haversine),
            OdRecord::from_parts(&block, &site, None, DistanceSource::Haversine),
        ]);

        let dir = tempdir().unwrap();
        let path = dir.path().join("testing").join("testing_distances_haversine.csv");
        write_distance_table(&path, &table).unwrap();
        let back = read_distance_table(&path).unwrap();
        assert_eq!(back, table);
        assert!(!path.with_extension("csv.tmp").exists());
    }
}
