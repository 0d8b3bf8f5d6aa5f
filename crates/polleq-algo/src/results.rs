//! Result aggregation: assignment rows, per-site and per-residence distance summaries, EDEs.

use polleq_core::{
    DistanceSummaryRow, EdeRow, PollError, ResultRow, ResultTables, DEMOGRAPHIC_COLUMNS,
};
use std::collections::BTreeMap;

use crate::ede::{ede, kp_factor};
use crate::model::PollingModel;
use crate::solver::{ModelSolution, BINARY_THRESHOLD};

const N_DEMOGRAPHICS: usize = DEMOGRAPHIC_COLUMNS.len();

/// Matched rows of the solution, with distances back in meters.
fn result_rows(model: &PollingModel, solution: &ModelSolution) -> Result<Vec<ResultRow>, PollError> {
    if solution.match_values.len() != model.pairs.len() {
        return Err(PollError::Solver(format!(
            "solution has {} match values for {} pairs",
            solution.match_values.len(),
            model.pairs.len()
        )));
    }
    let (beta, alpha) = (model.params.beta, model.params.alpha);
    let mut rows = Vec::new();
    for (pair, value) in model.pairs.iter().zip(&solution.match_values) {
        if value.is_nan() {
            return Err(PollError::Solver(format!(
                "no match value for ({}, {})",
                pair.record.id_orig, pair.record.id_dest
            )));
        }
        if *value < BINARY_THRESHOLD {
            continue;
        }
        let record = &pair.record;
        let distance_m = if record.source.is_log() {
            pair.distance.exp()
        } else {
            pair.distance
        };
        rows.push(ResultRow {
            id_orig: record.id_orig.clone(),
            id_dest: record.id_dest.clone(),
            distance_m,
            address: record.address.clone(),
            dest_lat: record.dest_lat,
            dest_lon: record.dest_lon,
            orig_lat: record.orig_lat,
            orig_lon: record.orig_lon,
            location_type: record.location_type.clone(),
            dest_type: record.dest_type,
            demographics: record.demographics,
            weighted_dist: record.population() * distance_m,
            kp_factor: kp_factor(beta, alpha, distance_m),
            new_location: record.dest_type.is_new(),
            matching: 1,
            source: record.source.as_str().to_string(),
        });
    }
    Ok(rows)
}

/// Per-id, per-demographic sums of `demo_pop·distance` and `demo_pop`.
fn summarize<'a, F>(rows: &'a [ResultRow], key: F, source: &str) -> Vec<DistanceSummaryRow>
where
    F: Fn(&'a ResultRow) -> &'a str,
{
    let mut groups: BTreeMap<&str, [(f64, f64); N_DEMOGRAPHICS]> = BTreeMap::new();
    for row in rows {
        let sums = groups
            .entry(key(row))
            .or_insert([(0.0, 0.0); N_DEMOGRAPHICS]);
        for (slot, demo_pop) in sums.iter_mut().zip(row.demographics.values()) {
            slot.0 += demo_pop * row.distance_m;
            slot.1 += demo_pop;
        }
    }
    groups
        .into_iter()
        .flat_map(|(id, sums)| {
            DEMOGRAPHIC_COLUMNS
                .iter()
                .zip(sums)
                .map(move |(demographic, (weighted_dist, demo_pop))| DistanceSummaryRow {
                    id: id.to_string(),
                    demographic: demographic.to_string(),
                    weighted_dist,
                    demo_pop,
                    avg_dist: (demo_pop > 0.0).then(|| weighted_dist / demo_pop),
                    source: source.to_string(),
                })
        })
        .collect()
}

/// Per-demographic EDE over the matched residences, on distances in meters.
///
/// `avg_kp_weight` is left empty when `exp(-β·α·d)` overflows; `y_ede` does not
/// depend on it.
fn edes(rows: &[ResultRow], model: &PollingModel, source: &str) -> Vec<EdeRow> {
    let (beta, alpha) = (model.params.beta, model.params.alpha);
    DEMOGRAPHIC_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, demographic)| {
            let pops: Vec<f64> = rows.iter().map(|r| r.demographics.values()[i]).collect();
            let demo_pop: f64 = pops.iter().sum();
            let weighted_dist: f64 = pops.iter().zip(rows).map(|(p, r)| p * r.distance_m).sum();
            let summand: f64 = pops.iter().zip(rows).map(|(p, r)| p * r.kp_factor).sum();
            let populated = demo_pop > 0.0;
            let y_ede = ede(
                pops.iter().copied().zip(rows.iter().map(|r| r.distance_m)),
                beta,
                alpha,
            );
            EdeRow {
                demographic: demographic.to_string(),
                weighted_dist,
                demo_pop,
                avg_dist: populated.then(|| weighted_dist / demo_pop),
                avg_kp_weight: (populated && summand.is_finite()).then(|| summand / demo_pop),
                y_ede,
                source: source.to_string(),
            }
        })
        .collect()
}

/// Builds the four output tables from a solved model.
pub fn aggregate_results(
    model: &PollingModel,
    solution: &ModelSolution,
) -> Result<ResultTables, PollError> {
    let results = result_rows(model, solution)?;
    let mut sources: Vec<&str> = results.iter().map(|r| r.source.as_str()).collect();
    sources.sort_unstable();
    sources.dedup();
    let source = match sources.as_slice() {
        [one] => one.to_string(),
        [] => {
            return Err(PollError::IntegrityViolation(
                "the solution matches no origin".into(),
            ))
        }
        many => {
            return Err(PollError::IntegrityViolation(format!(
                "a run mixes distance sources: {}",
                many.join(", ")
            )))
        }
    };
    let precinct_distances = summarize(&results, |r| r.id_dest.as_str(), &source);
    let residence_distances = summarize(&results, |r| r.id_orig.as_str(), &source);
    let edes = edes(&results, model, &source);
    Ok(ResultTables {
        results,
        precinct_distances,
        residence_distances,
        edes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{config, table};
    use crate::solver::SolveStatus;
    use std::time::Duration;

    fn solved(model: &PollingModel, matches: Vec<f64>) -> ModelSolution {
        assert_eq!(matches.len(), model.pairs.len());
        ModelSolution {
            status: SolveStatus::Optimal,
            objective: 0.0,
            base_objective: 0.0,
            open_values: vec![1.0, 1.0, 0.0],
            match_values: matches,
            best_bound: None,
            gap: None,
            penalty_values: None,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn aggregates_matched_rows() {
        let model = PollingModel::build(&table(), &config(), 0.001).unwrap();
        // pairs: (b1,A,100), (b1,F,50), (b2,B,120); fractional values round at 0.5
        let solution = solved(&model, vec![0.9999, 1e-7, 1.0]);
        let tables = aggregate_results(&model, &solution).unwrap();
        assert_eq!(tables.results.len(), 2);
        assert_eq!(tables.open_site_count(), 2);
        assert_eq!(tables.results[0].weighted_dist, 1000.0);
        assert!(tables.results.iter().all(|r| r.source == "haversine distance"));

        let pop = tables.ede_for("population").unwrap();
        assert_eq!(pop.demo_pop, 30.0);
        assert!((pop.avg_dist.unwrap() - (1000.0 + 2400.0) / 30.0).abs() < 1e-9);
        let expected = ede([(10.0, 100.0), (20.0, 120.0)], -1.0, 0.001).unwrap();
        assert!((pop.y_ede.unwrap() - expected).abs() < 1e-9);
        let kp = (10.0 * (0.1f64).exp() + 20.0 * (0.12f64).exp()) / 30.0;
        assert!((pop.avg_kp_weight.unwrap() - kp).abs() < 1e-12);
        assert!((tables.results[0].kp_factor - (0.1f64).exp()).abs() < 1e-12);

        // unpopulated demographics have no averages
        let black = tables.ede_for("black").unwrap();
        assert_eq!(black.avg_dist, None);
        assert_eq!(black.y_ede, None);

        assert_eq!(tables.precinct_distances.len(), 2 * DEMOGRAPHIC_COLUMNS.len());
        assert_eq!(tables.residence_distances[0].id, "b1");
        assert_eq!(tables.residence_distances[0].avg_dist, Some(100.0));
    }

    #[test]
    fn nan_match_value_fails() {
        let model = PollingModel::build(&table(), &config(), 0.001).unwrap();
        let solution = solved(&model, vec![f64::NAN, 0.0, 1.0]);
        assert!(aggregate_results(&model, &solution).is_err());
    }
}
