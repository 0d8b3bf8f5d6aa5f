//! Three-model cascade that uses penalized site types only where they pay for themselves.
//!
//! 1. Solve the base model. If no penalized site opens, that is the answer.
//! 2. Solve again with every penalized site closed; the EDE difference over the number of
//!    penalized sites opened in step 1 is the per-site penalty.
//! 3. Solve the base model with the penalty added to the EDE through a piecewise-linear
//!    under-approximation of `exp`.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::ede::ede_from_objective;
use crate::model::PollingModel;
use crate::solver::{solve_model, ModelSolution, SolverConfig};

/// Which model of the cascade produced the returned assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStage {
    /// Base model, no penalized site opened (or none configured)
    Base,
    /// Penalized model
    Penalized,
}

#[derive(Debug, Clone)]
pub struct PenaltyOutcome {
    pub stage: CascadeStage,
    pub model: PollingModel,
    pub solution: ModelSolution,
    /// EDE of the base model
    pub kp1: f64,
    /// EDE with penalized sites excluded
    pub kp2: Option<f64>,
    /// Per-site penalty in EDE units
    pub penalty: Option<f64>,
    /// Penalized sites opened by the base, excluding and penalized models
    pub penalized_open: [Option<usize>; 3],
}

struct PenaltyLog<'a> {
    path: Option<&'a Path>,
}

impl<'a> PenaltyLog<'a> {
    /// Truncates the log so it only ever holds the current cascade.
    fn start(path: Option<&'a Path>) -> Result<Self> {
        if let Some(path) = path {
            File::create(path)
                .with_context(|| format!("creating penalty log {}", path.display()))?;
        }
        Ok(Self { path })
    }

    fn line(&self, text: &str) -> Result<()> {
        let Some(path) = self.path else {
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening penalty log {}", path.display()))?;
        writeln!(file, "{text}")
            .with_context(|| format!("writing penalty log {}", path.display()))?;
        Ok(())
    }
}

/// Runs the cascade on `base`, writing one line per phase to a fresh `log_path` when given.
pub fn solve_with_penalties(
    base: &PollingModel,
    settings: &SolverConfig,
    log_path: Option<&Path>,
) -> Result<PenaltyOutcome> {
    let log = PenaltyLog::start(log_path)?;
    let beta = base.params.beta;
    let alpha = base.params.alpha;

    let solution1 = solve_model(base, settings)?;
    let kp1 = ede_from_objective(solution1.objective, beta, alpha);
    let selected = solution1.open_penalized(base);
    log.line(&format!(
        "model 1 (base): {} penalized sites selected of {}; objective {}; ede {}",
        selected.len(),
        base.penalized_sites().len(),
        solution1.objective,
        kp1
    ))?;
    if selected.is_empty() {
        info!(kp1, "no penalized site selected; keeping the base model");
        return Ok(PenaltyOutcome {
            stage: CascadeStage::Base,
            model: base.clone(),
            solution: solution1,
            kp1,
            kp2: None,
            penalty: None,
            penalized_open: [Some(0), None, None],
        });
    }

    let excluding = base.excluding_penalized()?;
    let solution2 = solve_model(&excluding, settings)?;
    let kp2 = ede_from_objective(solution2.objective, beta, alpha);
    let penalty = ((kp2 - kp1) / selected.len() as f64).max(0.0);
    log.line(&format!(
        "model 2 (excluding): {} penalized sites selected; precincts_open {}; objective {}; ede {}; penalty {}",
        solution2.open_penalized(&excluding).len(),
        excluding.params.precincts_open,
        solution2.objective,
        kp2,
        penalty
    ))?;

    let penalized = base.with_penalty(penalty, kp1);
    let solution3 = solve_model(&penalized, settings)?;
    let selected3 = solution3.open_penalized(&penalized).len();
    log.line(&format!(
        "model 3 (penalized): {} penalized sites selected; penalty {}; objective {}",
        selected3, penalty, solution3.objective
    ))?;
    info!(
        kp1,
        kp2,
        penalty,
        base = selected.len(),
        penalized = selected3,
        "penalty cascade finished"
    );

    Ok(PenaltyOutcome {
        stage: CascadeStage::Penalized,
        model: penalized,
        solution: solution3,
        kp1,
        kp2: Some(kp2),
        penalty: Some(penalty),
        penalized_open: [Some(selected.len()), Some(0), Some(selected3)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{config, table};
    use tempfile::tempdir;

    #[test]
    fn unselected_penalized_sites_keep_the_base_model() {
        let mut cfg = config();
        cfg.maxpctnew = 0.0;
        let model = PollingModel::build(&table(), &cfg, 0.001).unwrap();
        let dir = tempdir().unwrap();
        let log = dir.path().join("run.penalty.log");
        let outcome = solve_with_penalties(&model, &SolverConfig::default(), Some(&log)).unwrap();
        assert_eq!(outcome.stage, CascadeStage::Base);
        assert!(outcome.penalty.is_none());
        let text = std::fs::read_to_string(&log).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("model 1 (base): 0 penalized sites selected"));
    }

    #[test]
    fn cascade_logs_each_phase() {
        let mut cfg = config();
        cfg.max_min_mult = 4.0;
        let model = PollingModel::build(&table(), &cfg, 0.001).unwrap();
        let dir = tempdir().unwrap();
        let log = dir.path().join("run.penalty.log");
        let settings = SolverConfig {
            mip_gap: 0.0,
            ..SolverConfig::default()
        };
        let outcome = solve_with_penalties(&model, &settings, Some(&log)).unwrap();
        // the fire station is b1's nearest site, so the base model opens it
        assert_eq!(outcome.penalized_open[0], Some(1));
        assert_eq!(outcome.stage, CascadeStage::Penalized);
        assert!(outcome.penalty.unwrap() > 0.0);
        let text = std::fs::read_to_string(&log).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("penalty"));
    }

    #[test]
    fn rerun_replaces_the_previous_log() {
        let mut cfg = config();
        cfg.max_min_mult = 4.0;
        let model = PollingModel::build(&table(), &cfg, 0.001).unwrap();
        let dir = tempdir().unwrap();
        let log = dir.path().join("run.penalty.log");
        std::fs::write(&log, "stale line\n").unwrap();
        let settings = SolverConfig {
            mip_gap: 0.0,
            ..SolverConfig::default()
        };
        solve_with_penalties(&model, &settings, Some(&log)).unwrap();
        solve_with_penalties(&model, &settings, Some(&log)).unwrap();
        let text = std::fs::read_to_string(&log).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(!text.contains("stale"));
        assert!(text.starts_with("model 1"));
    }
}
