//! Core records: blocks, sites and the origin-destination distance table.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::PollError;

/// Demographic columns in the order they appear in every output table.
pub const DEMOGRAPHIC_COLUMNS: [&str; 10] = [
    "population",
    "white",
    "black",
    "native",
    "asian",
    "pacific_islander",
    "other",
    "multiple_races",
    "hispanic",
    "non_hispanic",
];

/// Category of a destination after classification against the run's year list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestType {
    /// Used as a polling place in one of the configured years
    Polling,
    /// Candidate site that was not a polling place in the configured years
    Potential,
    /// Block-group centroid, present only to guarantee coverage
    BgCentroid,
}

impl DestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestType::Polling => "polling",
            DestType::Potential => "potential",
            DestType::BgCentroid => "bg_centroid",
        }
    }

    /// Anything other than an existing polling place counts as a new location.
    pub fn is_new(&self) -> bool {
        !matches!(self, DestType::Polling)
    }
}

impl Display for DestType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestType {
    type Err = PollError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "polling" => Ok(DestType::Polling),
            "potential" => Ok(DestType::Potential),
            "bg_centroid" => Ok(DestType::BgCentroid),
            other => Err(PollError::IntegrityViolation(format!(
                "unknown dest_type '{other}'; expected polling, potential or bg_centroid"
            ))),
        }
    }
}

/// Where the distance column of an OD row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceSource {
    Haversine,
    Driving,
    LogHaversine,
    LogDriving,
}

impl DistanceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceSource::Haversine => "haversine distance",
            DistanceSource::Driving => "driving distance",
            DistanceSource::LogHaversine => "log haversine distance",
            DistanceSource::LogDriving => "log driving distance",
        }
    }

    /// Short tag used in canonical file names.
    pub fn file_tag(&self) -> &'static str {
        match self {
            DistanceSource::Haversine => "haversine",
            DistanceSource::Driving => "driving",
            DistanceSource::LogHaversine => "log_haversine",
            DistanceSource::LogDriving => "log_driving",
        }
    }

    pub fn from_flags(driving: bool, log_distance: bool) -> Self {
        match (driving, log_distance) {
            (false, false) => DistanceSource::Haversine,
            (true, false) => DistanceSource::Driving,
            (false, true) => DistanceSource::LogHaversine,
            (true, true) => DistanceSource::LogDriving,
        }
    }

    /// The log-transformed counterpart of this source.
    pub fn logged(self) -> Self {
        match self {
            DistanceSource::Haversine | DistanceSource::LogHaversine => {
                DistanceSource::LogHaversine
            }
            DistanceSource::Driving | DistanceSource::LogDriving => DistanceSource::LogDriving,
        }
    }

    pub fn is_log(&self) -> bool {
        matches!(
            self,
            DistanceSource::LogHaversine | DistanceSource::LogDriving
        )
    }

    pub fn is_driving(&self) -> bool {
        matches!(self, DistanceSource::Driving | DistanceSource::LogDriving)
    }
}

impl Display for DistanceSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceSource {
    type Err = PollError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "haversine distance" => Ok(DistanceSource::Haversine),
            "driving distance" => Ok(DistanceSource::Driving),
            "log haversine distance" => Ok(DistanceSource::LogHaversine),
            "log driving distance" => Ok(DistanceSource::LogDriving),
            other => Err(PollError::IntegrityViolation(format!(
                "unknown distance source '{other}'"
            ))),
        }
    }
}

/// Population counts of one census block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub population: f64,
    pub white: f64,
    pub black: f64,
    pub native: f64,
    pub asian: f64,
    pub pacific_islander: f64,
    pub other: f64,
    pub multiple_races: f64,
    pub hispanic: f64,
    pub non_hispanic: f64,
}

impl Demographics {
    /// Values in [`DEMOGRAPHIC_COLUMNS`] order.
    pub fn values(&self) -> [f64; 10] {
        [
            self.population,
            self.white,
            self.black,
            self.native,
            self.asian,
            self.pacific_islander,
            self.other,
            self.multiple_races,
            self.hispanic,
            self.non_hispanic,
        ]
    }

    pub fn from_values(values: [f64; 10]) -> Self {
        Self {
            population: values[0],
            white: values[1],
            black: values[2],
            native: values[3],
            asian: values[4],
            pacific_islander: values[5],
            other: values[6],
            multiple_races: values[7],
            hispanic: values[8],
            non_hispanic: values[9],
        }
    }

    /// (column name, count) pairs, the long form used by the summaries.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        DEMOGRAPHIC_COLUMNS.into_iter().zip(self.values())
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }
}

/// A census block, the origin of every trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub demographics: Demographics,
}

/// A candidate destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub id: String,
    pub address: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub location_type: String,
    pub dest_type: DestType,
}

/// One origin-destination row of the canonical distances table.
#[derive(Debug, Clone, PartialEq)]
pub struct OdRecord {
    pub id_orig: String,
    pub id_dest: String,
    pub address: Option<String>,
    pub dest_lat: f64,
    pub dest_lon: f64,
    pub orig_lat: f64,
    pub orig_lon: f64,
    pub location_type: String,
    pub dest_type: DestType,
    pub demographics: Demographics,
    /// `None` when no distance is known for the pair (e.g. missing driving row)
    pub distance_m: Option<f64>,
    pub source: DistanceSource,
    /// Filled in by the cleaner: `population * distance_m`
    pub weighted_dist: Option<f64>,
}

impl OdRecord {
    pub fn from_parts(block: &Block, site: &Site, distance_m: Option<f64>, source: DistanceSource) -> Self {
        Self {
            id_orig: block.id.clone(),
            id_dest: site.id.clone(),
            address: site.address.clone(),
            dest_lat: site.lat,
            dest_lon: site.lon,
            orig_lat: block.lat,
            orig_lon: block.lon,
            location_type: site.location_type.clone(),
            dest_type: site.dest_type,
            demographics: block.demographics,
            distance_m,
            source,
            weighted_dist: None,
        }
    }

    pub fn population(&self) -> f64 {
        self.demographics.population
    }
}

/// The origin x destination table a run is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceTable {
    pub records: Vec<OdRecord>,
}

impl DistanceTable {
    pub fn new(records: Vec<OdRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct `location_type` values present in the table.
    pub fn location_types(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .map(|r| r.location_type.clone())
            .collect()
    }

    /// Distinct origin ids in the table.
    pub fn origin_ids(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.id_orig.as_str()).collect()
    }

    /// Distinct destination ids in the table.
    pub fn destination_ids(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.id_dest.as_str()).collect()
    }

    /// The single distance source of the table.
    ///
    /// Fails when rows from different sources were mixed.
    pub fn source(&self) -> Result<Option<DistanceSource>, PollError> {
        let sources: BTreeSet<&'static str> =
            self.records.iter().map(|r| r.source.as_str()).collect();
        match sources.len() {
            0 => Ok(None),
            1 => Ok(self.records.first().map(|r| r.source)),
            _ => Err(PollError::IntegrityViolation(format!(
                "distance table mixes sources: {}",
                sources.into_iter().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// Minimum distance per origin, paired with that origin's population.
    ///
    /// Rows without a distance are ignored.
    pub fn min_distance_per_origin(&self) -> BTreeMap<&str, (f64, f64)> {
        let mut mins: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
        for record in &self.records {
            let Some(distance) = record.distance_m else {
                continue;
            };
            mins.entry(record.id_orig.as_str())
                .and_modify(|(best, _)| {
                    if distance < *best {
                        *best = distance;
                    }
                })
                .or_insert((distance, record.population()));
        }
        mins
    }
}
