//! Synthetic county shared by the integration tests: 10 census blocks and 7 candidate
//! sites around one small town, 70 origin-destination rows.

#![allow(dead_code)]

use polleq_core::{
    haversine_m, log_distance, Block, Demographics, DistanceSource, DistanceTable,
    OdRecord, RunConfig, Site,
};

pub const FIRE: &str = "Elec Day Fire - Potential";

/// (id, lat, lon, population)
const BLOCKS: [(&str, f64, f64, f64); 10] = [
    ("131350501051000", 33.86, -84.08, 40.0),
    ("131350501051001", 33.88, -84.04, 55.0),
    ("131350501051002", 33.90, -84.00, 70.0),
    ("131350501051003", 33.92, -83.96, 35.0),
    ("131350501051004", 33.94, -84.06, 60.0),
    ("131350501051005", 33.96, -84.02, 45.0),
    ("131350501051006", 33.87, -83.95, 50.0),
    ("131350501051007", 33.91, -84.09, 30.0),
    ("131350501051008", 33.95, -83.99, 65.0),
    ("131350501051009", 33.85, -84.01, 25.0),
];

/// (id, location type, lat, lon)
const SITES: [(&str, &str, f64, f64); 7] = [
    ("Central Library", "polling_2020", 33.950, -84.050),
    ("East Middle School", "polling_2020", 33.950, -83.950),
    ("South Church", "polling_2020", 33.850, -84.000),
    ("West Gym", "polling_2016", 33.900, -84.100),
    ("Fire Station 1", FIRE, 33.905, -84.005),
    ("Fire Station 2", FIRE, 33.860, -83.940),
    ("Community Center", "Community Center - Potential", 33.940, -84.000),
];

pub const TOTAL_POPULATION: f64 = 475.0;

pub fn blocks() -> Vec<Block> {
    BLOCKS
        .iter()
        .map(|(id, lat, lon, pop)| {
            let hispanic = pop / 5.0;
            Block {
                id: id.to_string(),
                lat: *lat,
                lon: *lon,
                demographics: Demographics {
                    population: *pop,
                    white: pop * 0.6,
                    black: pop * 0.4,
                    hispanic,
                    non_hispanic: pop - hispanic,
                    ..Demographics::default()
                },
            }
        })
        .collect()
}

pub fn sites() -> Vec<Site> {
    SITES
        .iter()
        .map(|(id, location_type, lat, lon)| Site {
            id: id.to_string(),
            address: Some(format!("{id}, Testville GA")),
            lat: *lat,
            lon: *lon,
            location_type: location_type.to_string(),
            dest_type: polleq_core::classify_raw(location_type),
        })
        .collect()
}

/// All 70 rows with haversine distances.
pub fn distance_table() -> DistanceTable {
    table_with(DistanceSource::Haversine, |d| d)
}

/// The same rows with log-transformed distances.
pub fn log_distance_table() -> DistanceTable {
    table_with(DistanceSource::LogHaversine, log_distance)
}

fn table_with(source: DistanceSource, transform: fn(f64) -> f64) -> DistanceTable {
    let sites = sites();
    let mut records = Vec::new();
    for block in blocks() {
        for site in &sites {
            let d = haversine_m(block.lat, block.lon, site.lat, site.lon);
            records.push(OdRecord::from_parts(&block, site, Some(transform(d)), source));
        }
    }
    DistanceTable::new(records)
}

/// Block `131350501051000` alone, with one 2020 polling place and three other sites.
pub fn single_origin_table() -> DistanceTable {
    let block = blocks().remove(0);
    let sites = sites();
    let records = [0usize, 3, 4, 6]
        .iter()
        .map(|i| {
            let site = &sites[*i];
            let d = haversine_m(block.lat, block.lon, site.lat, site.lon);
            OdRecord::from_parts(&block, site, Some(d), DistanceSource::Haversine)
        })
        .collect();
    DistanceTable::new(records)
}

pub fn config() -> RunConfig {
    RunConfig {
        location: "testing".into(),
        year: vec!["2020".into()],
        bad_types: Vec::new(),
        penalized_sites: Vec::new(),
        beta: 0.0,
        time_limit: 120,
        capacity: 1.8,
        precincts_open: None,
        maxpctnew: 1.0,
        minpctold: 0.0,
        max_min_mult: 3.0,
        fixed_capacity_site_number: None,
        driving: false,
        log_distance: false,
        census_year: 2020,
        map_source_date: None,
        config_set: "testing_configs".into(),
        config_name: "testing_config".into(),
    }
}

/// A hand-written row for small edge-case tables.
pub fn od(orig: &str, pop: f64, dest: &str, location_type: &str, distance: f64) -> OdRecord {
    let block = Block {
        id: orig.into(),
        lat: 0.0,
        lon: 0.0,
        demographics: Demographics {
            population: pop,
            ..Demographics::default()
        },
    };
    let site = Site {
        id: dest.into(),
        address: None,
        lat: 0.0,
        lon: 0.0,
        location_type: location_type.into(),
        dest_type: polleq_core::classify_raw(location_type),
    };
    OdRecord::from_parts(&block, &site, Some(distance), DistanceSource::Haversine)
}

/// Cleans `table` for `config`, calibrates alpha and builds the model.
pub fn build_model(table: &DistanceTable, config: &RunConfig) -> polleq_algo::PollingModel {
    let cleaned = polleq_algo::clean_data(table, config, false).expect("clean");
    let baseline = polleq_algo::clean_data(table, config, true).expect("alpha clean");
    let alpha = polleq_algo::compute_alpha(&baseline, polleq_algo::AlphaVariant::Min)
        .expect("alpha");
    polleq_algo::PollingModel::build(&cleaned, config, alpha).expect("model")
}

pub fn exact_solver() -> polleq_algo::SolverConfig {
    polleq_algo::SolverConfig {
        mip_gap: 0.0,
        ..polleq_algo::SolverConfig::default()
    }
}
