//! Model factory: parameters, index sets and penalty extensions of the assignment MIP.
//!
//! ```text
//! minimize   β = 0:  (1/T) Σ_(o,s) match[o,s]·pop_o·d[o,s]
//!            β ≠ 0:  (1/T) Σ_(o,s) match[o,s]·pop_o·kp[o,s]
//!
//! subject to Σ_s open[s]                      = P
//!            Σ_(s new) open[s]                ≤ maxpctnew·P          (if any new site)
//!            Σ_(s old) open[s]                ≥ minpctold·old_polls  (if minpctold > 0)
//!            Σ_(s ∈ N(o)) match[o,s]          = 1                    ∀ o
//!            match[o,s]                       ≤ open[s]              ∀ (o,s)
//!            Σ_(o ∈ N(s)) pop_o·match[o,s]    ≤ C_s                  ∀ s
//! ```
//!
//! `N(o)` / `N(s)` are the pairs within the radius `R = max_min_mult · max_min_dist`.
//! Only those pairs get a `match` variable.

use polleq_core::{DestType, DistanceTable, OdRecord, PollError, RunConfig};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::ede::{kp_factor, MAX_KP_FACTOR};

#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub id: String,
    pub population: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub id: String,
    pub location_type: String,
    pub dest_type: DestType,
    /// Listed in the run's `penalized_sites`
    pub penalized: bool,
}

impl Destination {
    pub fn is_new(&self) -> bool {
        self.dest_type.is_new()
    }
}

/// A within-radius (origin, destination) pair, carrying its source row.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub origin: usize,
    pub site: usize,
    pub distance: f64,
    pub weighted_dist: f64,
    pub kp_factor: f64,
    pub record: OdRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub beta: f64,
    pub alpha: f64,
    /// Sites to open (P)
    pub precincts_open: usize,
    pub old_polls: usize,
    pub maxpctnew: f64,
    pub minpctold: f64,
    /// Capacity multiplier from the run configuration
    pub capacity: f64,
    pub fixed_capacity_site_number: Option<u32>,
    /// Per-site population capacity (C_s)
    pub site_capacity: f64,
    /// Total population (T)
    pub total_population: f64,
    pub max_min_dist: f64,
    pub radius: f64,
}

/// Extra objective term of the third penalty model.
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyTerm {
    /// Per-site penalty in EDE units
    pub penalty: f64,
    /// EDE of the unpenalized model
    pub kp1: f64,
}

/// `C_s = capacity·T/P`, or `capacity·T/fixed` when the site number is pinned.
fn site_capacity(capacity: f64, total_population: f64, open: usize, fixed: Option<u32>) -> f64 {
    match fixed {
        None => capacity * total_population / open as f64,
        Some(fixed) => capacity * total_population / fixed as f64,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollingModel {
    pub origins: Vec<Origin>,
    pub sites: Vec<Destination>,
    pub pairs: Vec<Pair>,
    pub params: ModelParams,
    /// Sites forced closed
    pub excluded: BTreeSet<usize>,
    pub penalty: Option<PenaltyTerm>,
}

impl PollingModel {
    /// Builds the model from a cleaned table.
    pub fn build(table: &DistanceTable, config: &RunConfig, alpha: f64) -> Result<Self, PollError> {
        let mut origin_index: BTreeMap<&str, f64> = BTreeMap::new();
        let mut site_index: BTreeMap<&str, &OdRecord> = BTreeMap::new();
        for record in &table.records {
            origin_index
                .entry(record.id_orig.as_str())
                .or_insert(record.population());
            site_index.entry(record.id_dest.as_str()).or_insert(record);
        }
        let origins: Vec<Origin> = origin_index
            .iter()
            .map(|(id, pop)| Origin {
                id: id.to_string(),
                population: *pop,
            })
            .collect();
        let penalized: BTreeSet<&str> = config.penalized_sites.iter().map(String::as_str).collect();
        let sites: Vec<Destination> = site_index
            .values()
            .map(|r| Destination {
                id: r.id_dest.clone(),
                location_type: r.location_type.clone(),
                dest_type: r.dest_type,
                penalized: penalized.contains(r.location_type.as_str()),
            })
            .collect();
        if origins.is_empty() || sites.is_empty() {
            return Err(PollError::IntegrityViolation(
                "cannot build a model without origins and destinations".into(),
            ));
        }
        let origin_pos: BTreeMap<&str, usize> = origins
            .iter()
            .enumerate()
            .map(|(i, o)| (o.id.as_str(), i))
            .collect();
        let site_pos: BTreeMap<&str, usize> = sites
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();

        let distance = |r: &OdRecord| -> Result<f64, PollError> {
            r.distance_m.ok_or_else(|| {
                PollError::CoverageGap(format!("no distance for ({}, {})", r.id_orig, r.id_dest))
            })
        };

        let mut min_dist: BTreeMap<&str, f64> = BTreeMap::new();
        for record in &table.records {
            let d = distance(record)?;
            min_dist
                .entry(record.id_orig.as_str())
                .and_modify(|m| *m = m.min(d))
                .or_insert(d);
        }
        let max_min_dist = min_dist
            .values()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
            .ceil();
        let radius = config.max_min_mult * max_min_dist;

        let old_polls = sites
            .iter()
            .filter(|s| s.dest_type == DestType::Polling)
            .count();
        let precincts_open = match config.precincts_open {
            Some(p) => p as usize,
            None => old_polls,
        };
        if precincts_open == 0 {
            return Err(PollError::ConfigInvalid(
                "no polling locations in the configured years and precincts_open is unset".into(),
            ));
        }
        let total_population: f64 = origins.iter().map(|o| o.population).sum();
        let site_capacity = site_capacity(
            config.capacity,
            total_population,
            precincts_open,
            config.fixed_capacity_site_number,
        );

        let mut pairs = Vec::new();
        let mut max_kp = 0.0f64;
        for record in &table.records {
            let d = distance(record)?;
            let kp = kp_factor(config.beta, alpha, d);
            max_kp = max_kp.max(kp);
            if d > radius {
                continue;
            }
            pairs.push(Pair {
                origin: origin_pos[record.id_orig.as_str()],
                site: site_pos[record.id_dest.as_str()],
                distance: d,
                weighted_dist: record.weighted_dist.unwrap_or(d * record.population()),
                kp_factor: kp,
                record: record.clone(),
            });
        }
        if config.beta != 0.0 && max_kp > MAX_KP_FACTOR {
            let err = PollError::NumericLimit(format!(
                "largest kp_factor {max_kp:e} exceeds {MAX_KP_FACTOR:e}; the solver cannot represent it, make beta less negative"
            ));
            warn!("{err}");
        }

        let model = PollingModel {
            origins,
            sites,
            pairs,
            params: ModelParams {
                beta: config.beta,
                alpha,
                precincts_open,
                old_polls,
                maxpctnew: config.maxpctnew,
                minpctold: config.minpctold,
                capacity: config.capacity,
                fixed_capacity_site_number: config.fixed_capacity_site_number,
                site_capacity,
                total_population,
                max_min_dist,
                radius,
            },
            excluded: BTreeSet::new(),
            penalty: None,
        };
        model.check_coverage()?;
        info!(
            origins = model.origins.len(),
            sites = model.sites.len(),
            pairs = model.pairs.len(),
            precincts_open,
            radius,
            "built assignment model"
        );
        Ok(model)
    }

    /// Every origin needs at least one selectable site within the radius.
    pub fn check_coverage(&self) -> Result<(), PollError> {
        let mut covered = vec![false; self.origins.len()];
        for pair in &self.pairs {
            if !self.excluded.contains(&pair.site) {
                covered[pair.origin] = true;
            }
        }
        let uncovered: Vec<&str> = covered
            .iter()
            .enumerate()
            .filter(|(_, c)| !**c)
            .map(|(i, _)| self.origins[i].id.as_str())
            .collect();
        if uncovered.is_empty() {
            Ok(())
        } else {
            Err(PollError::CoverageGap(format!(
                "no selectable site within {:.1} of origins [{}]; increase max_min_mult",
                self.params.radius,
                uncovered.join(", ")
            )))
        }
    }

    pub fn penalized_sites(&self) -> Vec<usize> {
        self.sites
            .iter()
            .enumerate()
            .filter(|(_, s)| s.penalized)
            .map(|(i, _)| i)
            .collect()
    }

    /// New sites (not polling places in the configured years).
    pub fn new_sites(&self) -> Vec<usize> {
        self.sites
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_new())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn old_sites(&self) -> Vec<usize> {
        self.sites
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_new())
            .map(|(i, _)| i)
            .collect()
    }

    /// Second penalty model: every penalized site closed, P reduced to what is left.
    pub fn excluding_penalized(&self) -> Result<Self, PollError> {
        let mut model = self.clone();
        model.excluded = self.penalized_sites().into_iter().collect();
        let selectable = self.sites.len() - model.excluded.len();
        if model.params.precincts_open > selectable {
            info!(
                from = model.params.precincts_open,
                to = selectable,
                "reducing precincts_open to the sites left after exclusion"
            );
            model.params.precincts_open = selectable;
            model.params.site_capacity = site_capacity(
                model.params.capacity,
                model.params.total_population,
                selectable,
                model.params.fixed_capacity_site_number,
            );
        }
        if model.params.precincts_open == 0 {
            return Err(PollError::Infeasible(
                "every candidate site is penalized; nothing left to open".into(),
            ));
        }
        model.check_coverage()?;
        Ok(model)
    }

    /// Third penalty model: the base model plus the exponential penalty term.
    pub fn with_penalty(&self, penalty: f64, kp1: f64) -> Self {
        let mut model = self.clone();
        model.excluded.clear();
        model.penalty = Some(PenaltyTerm { penalty, kp1 });
        model
    }

    /// `(1/T)·Σ coef·match` coefficient of each pair.
    pub fn objective_coefficient(&self, pair: &Pair) -> f64 {
        let t = self.params.total_population;
        if self.params.beta == 0.0 {
            pair.weighted_dist / t
        } else {
            pair.record.population() * pair.kp_factor / t
        }
    }

    /// Upper bound on open new sites.
    pub fn max_new(&self) -> Option<f64> {
        self.sites
            .iter()
            .any(|s| s.is_new())
            .then(|| self.params.maxpctnew * self.params.precincts_open as f64)
    }

    /// Lower bound on open old sites.
    pub fn min_old(&self) -> Option<f64> {
        (self.params.minpctold > 0.0)
            .then(|| self.params.minpctold * self.params.old_polls as f64)
    }
}
