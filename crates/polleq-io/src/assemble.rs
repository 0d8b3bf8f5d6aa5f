//! Source assembler: candidate sites + census blocks + block-group centroids into the
//! canonical origin-destination distances table.

use anyhow::{Context, Result};
use polleq_core::{
    haversine_m, log_distance, Block, Demographics, DestType, DistanceSource, DistanceTable,
    OdRecord, PollError, RunConfig, Site,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::distances::{read_distance_table, write_distance_table};
use crate::importers::{
    read_block_demographics, read_driving_distances, read_sites, read_tiger_points,
    DrivingDistances, TigerPoint,
};
use crate::paths::{CensusTable, DataPaths, TigerLayer};

/// `location_type` given to block-group centroid destinations.
pub const CENTROID_LOCATION_TYPE: &str = "bg_centroid";

/// What to assemble and how to measure it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssembleOptions {
    pub location: String,
    pub census_year: u16,
    pub driving: bool,
    pub log_distance: bool,
    pub map_source_date: Option<String>,
}

impl AssembleOptions {
    pub fn source(&self) -> DistanceSource {
        DistanceSource::from_flags(self.driving, self.log_distance)
    }
}

impl From<&RunConfig> for AssembleOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            location: config.location.clone(),
            census_year: config.census_year,
            driving: config.driving,
            log_distance: config.log_distance,
            map_source_date: config.map_source_date.clone(),
        }
    }
}

/// Parsed inputs of one location.
#[derive(Debug, Clone, Default)]
pub struct SourceInputs {
    pub sites: Vec<Site>,
    pub blocks: Vec<Block>,
    pub block_groups: Vec<TigerPoint>,
}

/// Joins demographics to block internal points, dropping unpopulated blocks.
pub fn build_blocks(
    demographics: &BTreeMap<String, Demographics>,
    points: &[TigerPoint],
) -> Vec<Block> {
    let located: BTreeMap<&str, &TigerPoint> =
        points.iter().map(|p| (p.geoid.as_str(), p)).collect();
    let mut unlocated = 0usize;
    let mut blocks = Vec::new();
    for (id, demo) in demographics {
        if demo.population == 0.0 {
            continue;
        }
        match located.get(id.as_str()) {
            Some(point) => blocks.push(Block {
                id: id.clone(),
                lat: point.lat,
                lon: point.lon,
                demographics: *demo,
            }),
            None => unlocated += 1,
        }
    }
    if unlocated > 0 {
        warn!(unlocated, "populated census blocks without TIGER geometry were dropped");
    }
    blocks
}

fn centroid_sites(block_groups: &[TigerPoint]) -> Vec<Site> {
    block_groups
        .iter()
        .map(|bg| Site {
            id: bg.geoid.clone(),
            address: None,
            lat: bg.lat,
            lon: bg.lon,
            location_type: CENTROID_LOCATION_TYPE.to_string(),
            dest_type: DestType::BgCentroid,
        })
        .collect()
}

/// Builds the origin x destination table from parsed inputs.
///
/// Driving runs look every pair up in `driving`; pairs absent from it keep a null
/// distance for the cleaner to report.
pub fn assemble_table(
    inputs: &SourceInputs,
    options: &AssembleOptions,
    driving: Option<&DrivingDistances>,
) -> Result<DistanceTable> {
    let mut destinations = inputs.sites.clone();
    destinations.extend(centroid_sites(&inputs.block_groups));

    let mut seen = BTreeSet::new();
    let duplicates: BTreeSet<&str> = destinations
        .iter()
        .filter(|site| !seen.insert(site.id.as_str()))
        .map(|site| site.id.as_str())
        .collect();
    if !duplicates.is_empty() {
        return Err(PollError::IntegrityViolation(format!(
            "location names are not unique: {}",
            duplicates.into_iter().collect::<Vec<_>>().join(", ")
        ))
        .into());
    }

    let driving = match (options.driving, driving) {
        (true, Some(table)) => Some(table),
        (true, None) => {
            return Err(PollError::SourceMissing(format!(
                "driving distances for '{}'",
                options.location
            ))
            .into())
        }
        (false, _) => None,
    };
    let base_source = DistanceSource::from_flags(options.driving, false);
    let source = if options.log_distance {
        base_source.logged()
    } else {
        base_source
    };

    let mut records = Vec::with_capacity(inputs.blocks.len() * destinations.len());
    let mut missing = 0usize;
    for block in &inputs.blocks {
        for site in &destinations {
            let distance = match driving {
                Some(table) => table.get(&block.id, &site.id),
                None => Some(haversine_m(block.lat, block.lon, site.lat, site.lon)),
            };
            if distance.is_none() {
                missing += 1;
            }
            let distance = if options.log_distance {
                distance.map(log_distance)
            } else {
                distance
            };
            records.push(OdRecord::from_parts(block, site, distance, source));
        }
    }
    if missing > 0 {
        warn!(missing, "origin-destination pairs have no driving distance");
    }
    info!(
        origins = inputs.blocks.len(),
        destinations = destinations.len(),
        source = source.as_str(),
        "assembled distances table"
    );
    Ok(DistanceTable::new(records))
}

/// Reads every input of a location from `data_root`.
pub fn load_sources(paths: &DataPaths, census_year: u16) -> Result<SourceInputs> {
    let sites = read_sites(&paths.sites_file()?)?;
    let demographics = read_block_demographics(
        &paths.census_file(census_year, CensusTable::P3)?,
        &paths.census_file(census_year, CensusTable::P4)?,
    )
    .with_context(|| format!("loading census tables for '{}'", paths.location()))?;
    let block_points = read_tiger_points(&paths.tiger_file(census_year, TigerLayer::Block)?)?;
    let block_groups =
        read_tiger_points(&paths.tiger_file(census_year, TigerLayer::BlockGroup)?)?;
    Ok(SourceInputs {
        sites,
        blocks: build_blocks(&demographics, &block_points),
        block_groups,
    })
}

/// Runs the assembler for one location and writes the canonical table.
pub fn assemble(data_root: &Path, options: &AssembleOptions) -> Result<(PathBuf, DistanceTable)> {
    let paths = DataPaths::new(data_root, &options.location);
    let inputs = load_sources(&paths, options.census_year)?;
    let driving = if options.driving {
        let file = paths.driving_file(options.map_source_date.as_deref())?;
        Some(read_driving_distances(&file)?)
    } else {
        None
    };
    let table = assemble_table(&inputs, options, driving.as_ref())?;
    let out = paths.distances_file(options.source(), options.map_source_date.as_deref());
    write_distance_table(&out, &table)?;
    Ok((out, table))
}

/// Reuses the canonical table when it exists, assembling it otherwise or when
/// `rebuild` is set.
pub fn load_or_assemble(
    data_root: &Path,
    options: &AssembleOptions,
    rebuild: bool,
) -> Result<DistanceTable> {
    let paths = DataPaths::new(data_root, &options.location);
    let canonical = paths.distances_file(options.source(), options.map_source_date.as_deref());
    if canonical.is_file() && !rebuild {
        info!(path = %canonical.display(), "reusing distances table");
        return read_distance_table(&canonical);
    }
    assemble(data_root, options).map(|(_, table)| table)
}
