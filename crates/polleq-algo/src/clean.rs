//! Restricts the canonical distances table to what one run optimizes over.

use polleq_core::{
    classify_site, is_centroid_type, is_potential_type, mentions_any_year, DistanceTable,
    OdRecord, PollError, RunConfig,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Location types removed from the table before the run.
///
/// For the alpha baseline every potential site and centroid goes, leaving only places
/// that actually served as polling locations. Otherwise the configured `bad_types` go,
/// and each of them must exist in the data.
pub fn excluded_types(
    location_types: &BTreeSet<String>,
    config: &RunConfig,
    for_alpha: bool,
) -> Result<BTreeSet<String>, PollError> {
    if for_alpha {
        return Ok(location_types
            .iter()
            .filter(|t| is_potential_type(t) || is_centroid_type(t))
            .cloned()
            .collect());
    }
    let unknown: Vec<&str> = config
        .bad_types
        .iter()
        .filter(|t| !location_types.contains(*t))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(PollError::ConfigInvalid(format!(
            "bad_types not present in the data: {}; known types: {}",
            unknown.join(", "),
            location_types
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    Ok(config.bad_types.iter().cloned().collect())
}

/// Cleans `table` for `config`.
///
/// Steps: drop excluded location types, require every configured year to appear in some
/// location type, reclassify `dest_type` against the years, drop duplicate pairs and
/// unpopulated origins, check per-origin population, require every distance, and fill in
/// `weighted_dist`.
pub fn clean_data(
    table: &DistanceTable,
    config: &RunConfig,
    for_alpha: bool,
) -> Result<DistanceTable, PollError> {
    let location_types = table.location_types();
    let excluded = excluded_types(&location_types, config, for_alpha)?;

    let missing_years: Vec<&str> = config
        .year
        .iter()
        .filter(|year| {
            !location_types
                .iter()
                .any(|t| mentions_any_year(t, std::slice::from_ref(*year)))
        })
        .map(String::as_str)
        .collect();
    if !missing_years.is_empty() {
        return Err(PollError::ConfigInvalid(format!(
            "no location type mentions year(s) {} in {}",
            missing_years.join(", "),
            config.location
        )));
    }

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut records: Vec<OdRecord> = Vec::new();
    for record in &table.records {
        if excluded.contains(&record.location_type) || record.population() == 0.0 {
            continue;
        }
        if !seen.insert((record.id_orig.as_str(), record.id_dest.as_str())) {
            continue;
        }
        let mut cleaned = record.clone();
        cleaned.dest_type = classify_site(&cleaned.location_type, &config.year);
        records.push(cleaned);
    }
    if records.is_empty() {
        return Err(PollError::IntegrityViolation(format!(
            "no populated origin-destination pairs remain for {}",
            config.location
        )));
    }

    let mut populations: BTreeMap<&str, f64> = BTreeMap::new();
    for record in &records {
        let pop = *populations
            .entry(record.id_orig.as_str())
            .or_insert(record.population());
        if pop != record.population() {
            return Err(PollError::IntegrityViolation(format!(
                "origin {} has more than one population ({pop} and {})",
                record.id_orig,
                record.population()
            )));
        }
    }

    let missing: Vec<&OdRecord> = records
        .iter()
        .filter(|r| !r.distance_m.map(f64::is_finite).unwrap_or(false))
        .collect();
    if !missing.is_empty() {
        let origins: BTreeSet<&str> = missing.iter().map(|r| r.id_orig.as_str()).collect();
        let destinations: BTreeSet<&str> = missing.iter().map(|r| r.id_dest.as_str()).collect();
        return Err(PollError::CoverageGap(format!(
            "{} pairs have no distance; origins: [{}]; destinations: [{}]",
            missing.len(),
            origins.into_iter().collect::<Vec<_>>().join(", "),
            destinations.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }

    for record in &mut records {
        record.weighted_dist = record.distance_m.map(|d| d * record.demographics.population);
    }

    debug!(
        for_alpha,
        excluded = excluded.len(),
        rows = records.len(),
        "cleaned distances table"
    );
    Ok(DistanceTable::new(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polleq_core::{Block, Demographics, DestType, DistanceSource, Site};

    fn config(years: &[&str], bad_types: &[&str]) -> RunConfig {
        RunConfig {
            location: "testing".into(),
            year: years.iter().map(|y| y.to_string()).collect(),
            bad_types: bad_types.iter().map(|t| t.to_string()).collect(),
            penalized_sites: Vec::new(),
            beta: 0.0,
            time_limit: 60,
            capacity: 1.5,
            precincts_open: None,
            maxpctnew: 1.0,
            minpctold: 0.0,
            max_min_mult: 1.0,
            fixed_capacity_site_number: None,
            driving: false,
            log_distance: false,
            census_year: 2020,
            map_source_date: None,
            config_set: "testing_configs".into(),
            config_name: "testing".into(),
        }
    }

    fn record(orig: &str, pop: f64, dest: &str, location_type: &str, d: Option<f64>) -> OdRecord {
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
            dest_type: DestType::Polling,
        };
        OdRecord::from_parts(&block, &site, d, DistanceSource::Haversine)
    }

    fn table() -> DistanceTable {
        DistanceTable::new(vec![
            record("b1", 10.0, "Library", "polling_2020", Some(100.0)),
            record("b1", 10.0, "Old School", "polling_2016", Some(200.0)),
            record("b1", 10.0, "Fire 4", "Elec Day Fire - Potential", Some(300.0)),
            record("b1", 10.0, "bg1", "bg_centroid", Some(50.0)),
            record("b2", 0.0, "Library", "polling_2020", Some(100.0)),
        ])
    }

    #[test]
    fn main_clean_reclassifies_and_weights() {
        let cleaned = clean_data(&table(), &config(&["2020"], &["bg_centroid"]), false).unwrap();
        assert_eq!(cleaned.len(), 3);
        let types: Vec<DestType> = cleaned.records.iter().map(|r| r.dest_type).collect();
        assert_eq!(
            types,
            vec![DestType::Polling, DestType::Potential, DestType::Potential]
        );
        assert_eq!(cleaned.records[0].weighted_dist, Some(1000.0));
        assert!(cleaned.records.iter().all(|r| r.id_orig == "b1"));
    }

    #[test]
    fn alpha_clean_keeps_only_real_polling_places() {
        let cleaned = clean_data(&table(), &config(&["2020"], &[]), true).unwrap();
        let dests: Vec<&str> = cleaned.records.iter().map(|r| r.id_dest.as_str()).collect();
        assert_eq!(dests, vec!["Library", "Old School"]);
    }

    #[test]
    fn unknown_bad_type_and_missing_year_fail() {
        let err = clean_data(&table(), &config(&["2020"], &["school"]), false).unwrap_err();
        assert!(matches!(err, PollError::ConfigInvalid(_)));
        let err = clean_data(&table(), &config(&["2024"], &[]), false).unwrap_err();
        assert!(err.to_string().contains("2024"));
    }

    #[test]
    fn missing_distances_are_enumerated() {
        let mut t = table();
        t.records.push(record("b3", 4.0, "Fire 4", "Elec Day Fire - Potential", None));
        let err = clean_data(&t, &config(&["2020"], &[]), false).unwrap_err();
        match err {
            PollError::CoverageGap(msg) => {
                assert!(msg.contains("b3"));
                assert!(msg.contains("Fire 4"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn conflicting_population_is_rejected() {
        let mut t = table();
        t.records.push(record("b1", 11.0, "Annex", "polling_2020", Some(10.0)));
        let err = clean_data(&t, &config(&["2020"], &[]), false).unwrap_err();
        assert!(matches!(err, PollError::IntegrityViolation(_)));
    }

    #[test]
    fn duplicate_pairs_are_dropped() {
        let mut t = table();
        t.records.push(t.records[0].clone());
        let cleaned = clean_data(&t, &config(&["2020"], &[]), false).unwrap();
        assert_eq!(cleaned.len(), 4);
    }
}
