//! File layout of a location's data folder.
//!
//! ```text
//! {data_root}/{location}/
//!     {location}_locations_only.csv
//!     DECENNIALPL2020.P3-Data.csv
//!     DECENNIALPL2020.P4-Data.csv
//!     tl_2020_13089_tabblock20.shp (+ .dbf, .shx)
//!     tl_2020_13_bg20.shp          (+ .dbf, .shx)
//!     {location}_driving_distances[_{date}].csv
//!     {location}_distances_{haversine|driving|log_haversine|log_driving}[_{date}].csv
//! ```

use anyhow::{Context, Result};
use polleq_core::{DistanceSource, PollError};
use std::fs;
use std::path::{Path, PathBuf};

/// Census table a demographic file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CensusTable {
    /// Race
    P3,
    /// Hispanic or Latino origin
    P4,
}

impl CensusTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            CensusTable::P3 => "P3",
            CensusTable::P4 => "P4",
        }
    }
}

/// TIGER geography level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TigerLayer {
    Block,
    BlockGroup,
}

impl TigerLayer {
    fn suffix(&self) -> &'static str {
        match self {
            TigerLayer::Block => "_tabblock20.shp",
            TigerLayer::BlockGroup => "_bg20.shp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
    location: String,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>, location: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn location_dir(&self) -> PathBuf {
        self.root.join(&self.location)
    }

    /// Candidate-site table, preferring the location-prefixed name.
    pub fn sites_file(&self) -> Result<PathBuf> {
        let dir = self.location_dir();
        let prefixed = dir.join(format!("{}_locations_only.csv", self.location));
        if prefixed.is_file() {
            return Ok(prefixed);
        }
        let plain = dir.join("locations_only.csv");
        if plain.is_file() {
            return Ok(plain);
        }
        Err(PollError::SourceMissing(format!(
            "no candidate-site file '{}' or '{}'",
            prefixed.display(),
            plain.display()
        ))
        .into())
    }

    pub fn census_file(&self, year: u16, table: CensusTable) -> Result<PathBuf> {
        let path = self
            .location_dir()
            .join(format!("DECENNIALPL{year}.{}-Data.csv", table.as_str()));
        require(path)
    }

    /// Finds `tl_{year}_*{_tabblock20|_bg20}.shp` in the location folder.
    pub fn tiger_file(&self, year: u16, layer: TigerLayer) -> Result<PathBuf> {
        let dir = self.location_dir();
        let prefix = format!("tl_{year}_");
        let mut matches: Vec<PathBuf> = match fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.file_name()
                        .and_then(|name| name.to_str())
                        .map(|name| name.starts_with(&prefix) && name.ends_with(layer.suffix()))
                        .unwrap_or(false)
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        matches.sort();
        matches.into_iter().next().ok_or_else(|| {
            PollError::SourceMissing(format!(
                "no TIGER file '{prefix}*{}' in '{}'",
                layer.suffix(),
                dir.display()
            ))
            .into()
        })
    }

    pub fn driving_file(&self, map_source_date: Option<&str>) -> Result<PathBuf> {
        let name = match map_source_date {
            Some(date) => format!("{}_driving_distances_{date}.csv", self.location),
            None => format!("{}_driving_distances.csv", self.location),
        };
        require(self.location_dir().join(name))
    }

    /// Output path of the canonical distances table. Not required to exist.
    pub fn distances_file(&self, source: DistanceSource, map_source_date: Option<&str>) -> PathBuf {
        let mut name = format!("{}_distances_{}", self.location, source.file_tag());
        if let (true, Some(date)) = (source.is_driving(), map_source_date) {
            name.push('_');
            name.push_str(date);
        }
        name.push_str(".csv");
        self.location_dir().join(name)
    }
}

fn require(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(PollError::SourceMissing(format!("'{}' does not exist", path.display())).into())
    }
}

/// Creates `dir` and any missing parents.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating directory '{}'", dir.display()))
}
