//! Rows of the four tables a finished run emits.

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::types::{Demographics, DestType};

/// A matched origin-destination pair of the final assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub id_orig: String,
    pub id_dest: String,
    /// Reported in meters, also for runs solved on log distances
    pub distance_m: f64,
    pub address: Option<String>,
    pub dest_lat: f64,
    pub dest_lon: f64,
    pub orig_lat: f64,
    pub orig_lon: f64,
    pub location_type: String,
    pub dest_type: DestType,
    pub demographics: Demographics,
    pub weighted_dist: f64,
    pub kp_factor: f64,
    pub new_location: bool,
    pub matching: i64,
    pub source: String,
}

/// Totals for one (domain id, demographic) group. The domain is `id_dest` in the
/// precinct table and `id_orig` in the residence table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceSummaryRow {
    pub id: String,
    pub demographic: String,
    pub weighted_dist: f64,
    pub demo_pop: f64,
    /// `None` when the group has no population
    pub avg_dist: Option<f64>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdeRow {
    pub demographic: String,
    pub weighted_dist: f64,
    pub demo_pop: f64,
    pub avg_dist: Option<f64>,
    pub avg_kp_weight: Option<f64>,
    #[serde(rename = "y_EDE")]
    pub y_ede: Option<f64>,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTables {
    pub results: Vec<ResultRow>,
    pub precinct_distances: Vec<DistanceSummaryRow>,
    pub residence_distances: Vec<DistanceSummaryRow>,
    pub edes: Vec<EdeRow>,
}

impl ResultTables {
    /// Number of distinct destinations in the assignment.
    pub fn open_site_count(&self) -> usize {
        let mut ids: Vec<&str> = self.results.iter().map(|r| r.id_dest.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    pub fn ede_for(&self, demographic: &str) -> Option<&EdeRow> {
        self.edes.iter().find(|row| row.demographic == demographic)
    }
}

/// Run-level facts that accompany the result tables into a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub config: RunConfig,
    pub config_id: String,
    /// `Optimal` or `Timed Out`
    pub solve_status: String,
    pub objective: f64,
    /// Lower bound on the objective reported with the solve
    pub best_bound: Option<f64>,
    /// Relative gap between `objective` and `best_bound`
    pub gap: Option<f64>,
    pub alpha: f64,
    /// Per-site penalty when the penalty cascade ran all three models
    pub penalty: Option<f64>,
    pub elapsed_secs: f64,
}
