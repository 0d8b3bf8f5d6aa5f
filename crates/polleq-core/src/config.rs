//! Run configuration.
//!
//! One YAML file describes one optimization run. Files live in a folder named after
//! their `config_set`, e.g. `configs/DeKalb_GA_no_bg_school_configs/DeKalb_GA_no_bg_school_config_full.yaml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::error::PollError;
use crate::types::DistanceSource;

/// Keys every config file must spell out, even when the value is null.
pub const REQUIRED_KEYS: [&str; 11] = [
    "location",
    "year",
    "beta",
    "time_limit",
    "capacity",
    "precincts_open",
    "maxpctnew",
    "minpctold",
    "max_min_mult",
    "config_set",
    "config_name",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Dataset folder under the data root
    pub location: String,
    /// Years whose polling locations count as `polling`
    #[serde(deserialize_with = "deserialize_years")]
    pub year: Vec<String>,
    /// Location types excluded from the main run
    #[serde(default)]
    pub bad_types: Vec<String>,
    /// Location types that are only opened when the penalty cascade allows it
    #[serde(default)]
    pub penalized_sites: Vec<String>,
    /// Inequality aversion in (-10, 0]; 0 minimizes the plain mean
    pub beta: f64,
    /// Solver wall-clock limit in seconds
    pub time_limit: u64,
    pub capacity: f64,
    /// Number of sites to open; `None` opens as many as there were polling places
    pub precincts_open: Option<u32>,
    pub maxpctnew: f64,
    pub minpctold: f64,
    pub max_min_mult: f64,
    #[serde(default)]
    pub fixed_capacity_site_number: Option<u32>,
    #[serde(default)]
    pub driving: bool,
    #[serde(default)]
    pub log_distance: bool,
    #[serde(default = "default_census_year")]
    pub census_year: u16,
    /// Date suffix of the driving-distance table, if any
    #[serde(default)]
    pub map_source_date: Option<String>,
    pub config_set: String,
    pub config_name: String,
}

fn default_census_year() -> u16 {
    2020
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YearValue {
    Int(i64),
    Text(String),
}

fn deserialize_years<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<YearValue>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|value| match value {
            YearValue::Int(year) => year.to_string(),
            YearValue::Text(year) => year.trim().to_string(),
        })
        .collect())
}

impl RunConfig {
    /// Parses a config from YAML text, with JSON accepted as a fallback.
    ///
    /// Missing required keys and unknown keys are reported as
    /// [`PollError::ConfigInvalid`]. Range checks are left to [`RunConfig::validate`].
    pub fn from_str_any(text: &str) -> std::result::Result<Self, PollError> {
        let value: serde_json::Value = serde_yaml::from_str(text)
            .or_else(|_| serde_json::from_str(text))
            .map_err(|e| PollError::ConfigInvalid(format!("unparseable config: {e}")))?;
        let object = value.as_object().ok_or_else(|| {
            PollError::ConfigInvalid("config must be a mapping of keys to values".into())
        })?;
        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(PollError::ConfigInvalid(format!(
                "missing required keys: {}",
                missing.join(", ")
            )));
        }
        serde_json::from_value(value).map_err(|e| PollError::ConfigInvalid(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("serializing run config to yaml")
    }

    /// Checks value ranges.
    pub fn validate(&self) -> std::result::Result<(), PollError> {
        let fail = |msg: String| Err(PollError::ConfigInvalid(format!("{}: {msg}", self.config_name)));
        if self.location.trim().is_empty() {
            return fail("location is empty".into());
        }
        if self.year.is_empty() || self.year.iter().any(|y| y.is_empty()) {
            return fail("year must be a non-empty list of years".into());
        }
        if !(self.beta > -10.0 && self.beta <= 0.0) {
            return fail(format!("beta {} outside (-10, 0]", self.beta));
        }
        if self.time_limit == 0 {
            return fail("time_limit must be positive".into());
        }
        if !(self.capacity >= 1.0) {
            return fail(format!("capacity {} below 1", self.capacity));
        }
        for (name, value) in [("maxpctnew", self.maxpctnew), ("minpctold", self.minpctold)] {
            if !(0.0..=1.0).contains(&value) {
                return fail(format!("{name} {value} outside [0, 1]"));
            }
        }
        if !(self.max_min_mult >= 1.0) {
            return fail(format!("max_min_mult {} below 1", self.max_min_mult));
        }
        if self.precincts_open == Some(0) {
            return fail("precincts_open must be at least 1".into());
        }
        if self.fixed_capacity_site_number == Some(0) {
            return fail("fixed_capacity_site_number must be at least 1".into());
        }
        if self.config_set.trim().is_empty() || self.config_name.trim().is_empty() {
            return fail("config_set and config_name must be set".into());
        }
        Ok(())
    }

    /// Content hash of the parameters: SHA-256 over the canonical JSON form.
    pub fn config_id(&self) -> String {
        // struct field order is fixed, so the serialization is canonical
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn distance_source(&self) -> DistanceSource {
        DistanceSource::from_flags(self.driving, self.log_distance)
    }

    pub fn has_penalized_sites(&self) -> bool {
        !self.penalized_sites.is_empty()
    }
}

/// Loads, validates and checks the folder layout of one config file.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    if !path.is_file() {
        return Err(PollError::ConfigInvalid(format!(
            "config file '{}' does not exist",
            path.display()
        ))
        .into());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading run config '{}'", path.display()))?;
    let config = RunConfig::from_str_any(&text)
        .with_context(|| format!("parsing run config '{}'", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating run config '{}'", path.display()))?;

    let folder = path
        .parent()
        .and_then(|parent| parent.file_name())
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    if folder != config.config_set {
        return Err(PollError::ConfigInvalid(format!(
            "config '{}' sits in folder '{folder}' but declares config_set '{}'",
            path.display(),
            config.config_set
        ))
        .into());
    }
    Ok(config)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    pub(crate) const SAMPLE: &str = r#"
location: testing
year: [2020, "2016"]
bad_types: [bg_centroid]
beta: -1
time_limit: 300
capacity: 1.5
precincts_open: null
maxpctnew: 1.0
minpctold: 0.8
max_min_mult: 5
config_set: testing_configs
config_name: testing_config_base
"#;

    #[test]
    fn parses_yaml_with_defaults() {
        let cfg = RunConfig::from_str_any(SAMPLE).unwrap();
        assert_eq!(cfg.year, vec!["2020".to_string(), "2016".to_string()]);
        assert_eq!(cfg.precincts_open, None);
        assert!(cfg.penalized_sites.is_empty());
        assert_eq!(cfg.census_year, 2020);
        assert!(!cfg.driving);
        assert_eq!(cfg.distance_source(), DistanceSource::Haversine);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_unknown_and_missing_keys() {
        let unknown = format!("{SAMPLE}surprise: 1\n");
        let err = RunConfig::from_str_any(&unknown).unwrap_err();
        assert!(matches!(err, PollError::ConfigInvalid(_)));
        assert!(err.to_string().contains("surprise"));

        let missing = SAMPLE.replace("precincts_open: null\n", "");
        let err = RunConfig::from_str_any(&missing).unwrap_err();
        assert!(err.to_string().contains("precincts_open"));
    }

    #[test]
    fn accepts_json_text() {
        let cfg = RunConfig::from_str_any(SAMPLE).unwrap();
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(RunConfig::from_str_any(&json).unwrap(), cfg);
    }

    #[test]
    fn validate_checks_ranges() {
        let base = RunConfig::from_str_any(SAMPLE).unwrap();

        let mut cfg = base.clone();
        cfg.beta = 0.5;
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.year.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.maxpctnew = 1.2;
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.capacity = 0.9;
        assert!(cfg.validate().is_err());

        let mut cfg = base;
        cfg.max_min_mult = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_id_tracks_parameters() {
        let a = RunConfig::from_str_any(SAMPLE).unwrap();
        let mut b = a.clone();
        assert_eq!(a.config_id(), b.config_id());
        assert_eq!(a.config_id().len(), 64);
        b.beta = -2.0;
        assert_ne!(a.config_id(), b.config_id());
    }

    #[test]
    fn load_config_checks_folder_name() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("testing_configs");
        fs::create_dir_all(&good).unwrap();
        fs::write(good.join("base.yaml"), SAMPLE).unwrap();
        let cfg = load_config(&good.join("base.yaml")).unwrap();
        assert_eq!(cfg.config_name, "testing_config_base");

        let bad = dir.path().join("elsewhere");
        fs::create_dir_all(&bad).unwrap();
        fs::write(bad.join("base.yaml"), SAMPLE).unwrap();
        let err = load_config(&bad.join("base.yaml")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PollError>(),
            Some(PollError::ConfigInvalid(_))
        ));
    }
}
