//! Post-solve checks of the assignment invariants.

use std::fmt::{Display, Formatter};

use crate::model::PollingModel;
use crate::solver::ModelSolution;

/// Distance from 0 or 1 a binary may have before it counts as fractional.
pub const INTEGRALITY_TOLERANCE: f64 = 1e-5;

const CAPACITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    Unassigned { origin: String },
    MultiplyAssigned { origin: String, count: usize },
    MatchedToClosed { origin: String, site: String },
    OpenCount { expected: usize, actual: usize },
    TooManyNew { limit: f64, actual: usize },
    TooFewOld { limit: f64, actual: usize },
    CapacityExceeded { site: String, load: f64, capacity: f64 },
    ExcludedOpen { site: String },
    NonIntegral { variable: String, value: f64 },
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::Unassigned { origin } => write!(f, "origin {origin} is not assigned"),
            Violation::MultiplyAssigned { origin, count } => {
                write!(f, "origin {origin} is assigned to {count} sites")
            }
            Violation::MatchedToClosed { origin, site } => {
                write!(f, "origin {origin} is matched to closed site {site}")
            }
            Violation::OpenCount { expected, actual } => {
                write!(f, "{actual} sites open, expected {expected}")
            }
            Violation::TooManyNew { limit, actual } => {
                write!(f, "{actual} new sites open, limit {limit}")
            }
            Violation::TooFewOld { limit, actual } => {
                write!(f, "{actual} old sites open, at least {limit} required")
            }
            Violation::CapacityExceeded {
                site,
                load,
                capacity,
            } => write!(f, "site {site} serves {load}, capacity {capacity}"),
            Violation::ExcludedOpen { site } => write!(f, "excluded site {site} is open"),
            Violation::NonIntegral { variable, value } => {
                write!(f, "{variable} = {value} is not integral")
            }
        }
    }
}

fn is_integral(value: f64) -> bool {
    value.abs() <= INTEGRALITY_TOLERANCE || (value - 1.0).abs() <= INTEGRALITY_TOLERANCE
}

/// Checks `solution` against the constraints of `model`; an empty list means it holds.
pub fn verify_solution(model: &PollingModel, solution: &ModelSolution) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (s, value) in solution.open_values.iter().enumerate() {
        if !is_integral(*value) {
            violations.push(Violation::NonIntegral {
                variable: format!("open[{}]", model.sites[s].id),
                value: *value,
            });
        }
    }
    for (pair, value) in model.pairs.iter().zip(&solution.match_values) {
        if !is_integral(*value) {
            violations.push(Violation::NonIntegral {
                variable: format!("match[{}, {}]", pair.record.id_orig, pair.record.id_dest),
                value: *value,
            });
        }
    }

    let open = solution.open_sites();
    if open.len() != model.params.precincts_open {
        violations.push(Violation::OpenCount {
            expected: model.params.precincts_open,
            actual: open.len(),
        });
    }
    for s in &model.excluded {
        if solution.is_open(*s) {
            violations.push(Violation::ExcludedOpen {
                site: model.sites[*s].id.clone(),
            });
        }
    }
    if let Some(limit) = model.max_new() {
        let actual = open.iter().filter(|s| model.sites[**s].is_new()).count();
        if actual as f64 > limit.floor() {
            violations.push(Violation::TooManyNew { limit, actual });
        }
    }
    if let Some(limit) = model.min_old() {
        let actual = open.iter().filter(|s| !model.sites[**s].is_new()).count();
        if (actual as f64) < limit.ceil() {
            violations.push(Violation::TooFewOld { limit, actual });
        }
    }

    let mut assignments = vec![0usize; model.origins.len()];
    let mut load = vec![0.0f64; model.sites.len()];
    for p in solution.matched_pairs() {
        let pair = &model.pairs[p];
        assignments[pair.origin] += 1;
        load[pair.site] += model.origins[pair.origin].population;
        if !solution.is_open(pair.site) {
            violations.push(Violation::MatchedToClosed {
                origin: model.origins[pair.origin].id.clone(),
                site: model.sites[pair.site].id.clone(),
            });
        }
    }
    for (o, count) in assignments.iter().enumerate() {
        let origin = model.origins[o].id.clone();
        match count {
            0 => violations.push(Violation::Unassigned { origin }),
            1 => {}
            n => violations.push(Violation::MultiplyAssigned { origin, count: *n }),
        }
    }
    let capacity = model.params.site_capacity;
    for (s, l) in load.iter().enumerate() {
        if *l > capacity * (1.0 + CAPACITY_TOLERANCE) {
            violations.push(Violation::CapacityExceeded {
                site: model.sites[s].id.clone(),
                load: *l,
                capacity,
            });
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{config, table};
    use crate::solver::SolveStatus;
    use std::time::Duration;

    fn solution(open: Vec<f64>, matches: Vec<f64>) -> ModelSolution {
        ModelSolution {
            status: SolveStatus::Optimal,
            objective: 0.0,
            base_objective: 0.0,
            open_values: open,
            match_values: matches,
            best_bound: None,
            gap: None,
            penalty_values: None,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn consistent_assignment_passes() {
        let model = PollingModel::build(&table(), &config(), 0.001).unwrap();
        // sites A, B, F; pairs (b1,A), (b1,F), (b2,B)
        let ok = solution(vec![1.0, 1.0, 0.0], vec![1.0, 0.0, 1.0]);
        assert!(verify_solution(&model, &ok).is_empty());
    }

    #[test]
    fn reports_each_broken_invariant() {
        let model = PollingModel::build(&table(), &config(), 0.001).unwrap();
        let bad = solution(vec![1.0, 0.0, 0.4], vec![1.0, 1.0, 0.0]);
        let violations = verify_solution(&model, &bad);
        assert!(violations.contains(&Violation::OpenCount {
            expected: 2,
            actual: 1
        }));
        assert!(violations.contains(&Violation::MultiplyAssigned {
            origin: "b1".into(),
            count: 2
        }));
        assert!(violations.contains(&Violation::Unassigned {
            origin: "b2".into()
        }));
        assert!(violations.contains(&Violation::MatchedToClosed {
            origin: "b1".into(),
            site: "F".into()
        }));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::NonIntegral { value, .. } if *value == 0.4)));
    }

    #[test]
    fn capacity_overflow_is_reported() {
        let mut cfg = config();
        cfg.capacity = 1.0;
        cfg.max_min_mult = 4.0;
        let model = PollingModel::build(&table(), &cfg, 0.001).unwrap();
        // capacity 15; both origins (30 people) sent to A
        let a_pairs: Vec<f64> = model
            .pairs
            .iter()
            .map(|p| if p.record.id_dest == "A" { 1.0 } else { 0.0 })
            .collect();
        let overloaded = solution(vec![1.0, 1.0, 0.0], a_pairs);
        let violations = verify_solution(&model, &overloaded);
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::CapacityExceeded { site, .. } if site == "A")));
    }
}
