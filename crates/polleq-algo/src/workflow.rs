//! Optimization of one run on an assembled distances table: clean, calibrate, model,
//! solve (through the penalty cascade when configured), verify and aggregate.

use anyhow::Result;
use polleq_core::{DistanceTable, ResultTables, RunConfig, RunRecord};
use std::path::Path;
use tracing::{info, warn};

use crate::alpha::{compute_alpha, AlphaVariant};
use crate::clean::clean_data;
use crate::model::PollingModel;
use crate::penalty::{solve_with_penalties, CascadeStage};
use crate::results::aggregate_results;
use crate::solver::{solve_model, SolveStatus, SolverConfig};
use crate::verify::{verify_solution, Violation};

/// Everything a finished optimization hands to the output writers.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub tables: ResultTables,
    pub alpha: f64,
    pub status: SolveStatus,
    pub objective: f64,
    pub best_bound: Option<f64>,
    pub gap: Option<f64>,
    pub stage: CascadeStage,
    pub penalty: Option<f64>,
    pub violations: Vec<Violation>,
    pub elapsed_secs: f64,
}

impl RunOutcome {
    pub fn record(&self, config: &RunConfig) -> RunRecord {
        RunRecord {
            config: config.clone(),
            config_id: config.config_id(),
            solve_status: self.status.to_string(),
            objective: self.objective,
            best_bound: self.best_bound,
            gap: self.gap,
            alpha: self.alpha,
            penalty: self.penalty,
            elapsed_secs: self.elapsed_secs,
        }
    }
}

/// Runs steps B through G for `config` on `table`.
///
/// `penalty_log` receives one line per cascade phase when the run has penalized sites.
pub fn optimize(
    config: &RunConfig,
    table: &DistanceTable,
    settings: &SolverConfig,
    penalty_log: Option<&Path>,
) -> Result<RunOutcome> {
    let cleaned = clean_data(table, config, false)?;
    let baseline = clean_data(table, config, true)?;
    let alpha = compute_alpha(&baseline, AlphaVariant::default())?;
    info!(
        config = %config.config_name,
        rows = cleaned.len(),
        alpha,
        "calibrated alpha"
    );

    let model = PollingModel::build(&cleaned, config, alpha)?;
    let (model, solution, stage, penalty) = if config.has_penalized_sites() {
        let outcome = solve_with_penalties(&model, settings, penalty_log)?;
        (outcome.model, outcome.solution, outcome.stage, outcome.penalty)
    } else {
        let solution = solve_model(&model, settings)?;
        (model, solution, CascadeStage::Base, None)
    };

    let violations = verify_solution(&model, &solution);
    for violation in &violations {
        warn!(config = %config.config_name, "{violation}");
    }
    let tables = aggregate_results(&model, &solution)?;
    info!(
        config = %config.config_name,
        status = %solution.status,
        objective = solution.objective,
        open = tables.open_site_count(),
        "run optimized"
    );
    Ok(RunOutcome {
        tables,
        alpha,
        status: solution.status,
        objective: solution.objective,
        best_bound: solution.best_bound,
        gap: solution.gap,
        stage,
        penalty,
        violations,
        elapsed_secs: solution.elapsed.as_secs_f64(),
    })
}
