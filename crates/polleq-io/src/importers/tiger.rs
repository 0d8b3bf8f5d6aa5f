//! TIGER/Line block and block-group shapefiles.
//!
//! Only the attribute table is needed: `GEOID20` and the internal point
//! (`INTPTLAT20`, `INTPTLON20`), which is used as the unit's coordinate.

use anyhow::{bail, Context, Result};
use shapefile::dbase::{FieldValue, Record};
use shapefile::Reader;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct TigerPoint {
    pub geoid: String,
    pub lat: f64,
    pub lon: f64,
}

fn character_field(record: &Record, field: &str) -> Result<String> {
    match record.get(field) {
        Some(FieldValue::Character(Some(s))) => Ok(s.trim().to_string()),
        Some(FieldValue::Numeric(Some(n))) => Ok(format!("{n}")),
        _ => bail!("missing or invalid character field: {}", field),
    }
}

fn coordinate_field(record: &Record, field: &str) -> Result<f64> {
    match record.get(field) {
        Some(FieldValue::Numeric(Some(n))) => Ok(*n),
        Some(FieldValue::Float(Some(n))) => Ok(f64::from(*n)),
        Some(FieldValue::Character(Some(s))) => parse_coordinate(s),
        _ => bail!("missing or invalid coordinate field: {}", field),
    }
}

/// TIGER stores internal points as signed text, e.g. `+33.7512345`.
pub fn parse_coordinate(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    trimmed
        .strip_prefix('+')
        .unwrap_or(trimmed)
        .parse()
        .with_context(|| format!("invalid coordinate '{text}'"))
}

/// Reads the id and internal point of every unit in a TIGER shapefile.
pub fn read_tiger_points(path: &Path) -> Result<Vec<TigerPoint>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;
    let mut points = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (_shape, record) = result
            .with_context(|| format!("Error reading shape+record in {}", path.display()))?;
        points.push(TigerPoint {
            geoid: character_field(&record, "GEOID20")?,
            lat: coordinate_field(&record, "INTPTLAT20")?,
            lon: coordinate_field(&record, "INTPTLON20")?,
        });
    }
    debug!(path = %path.display(), units = points.len(), "read TIGER layer");
    Ok(points)
}
