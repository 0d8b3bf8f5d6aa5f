//! Solver driver: turns a [`PollingModel`] into a `good_lp` MIP and runs it.
//!
//! SCIP is the default engine (`limits/time`, `limits/gap`, `lp/threads`); HiGHS and CBC
//! are available behind their own features.

use polleq_core::{PollError, RunConfig};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use good_lp::{
    constraint, variable, variables, Expression, ResolutionError, Solution, SolutionStatus,
    SolverModel, Variable, VariableDefinition,
};
#[cfg(feature = "solver-cbc")]
use good_lp::solvers::coin_cbc::coin_cbc;
#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs;
#[cfg(feature = "solver-scip")]
use good_lp::solvers::scip::scip;

use crate::model::PollingModel;

#[cfg(not(any(feature = "solver-scip", feature = "solver-highs", feature = "solver-cbc")))]
compile_error!(
    "polleq-algo needs a MIP backend: enable `solver-scip`, `solver-highs` or `solver-cbc`"
);

/// Rounding threshold for binaries read back from the solver.
pub const BINARY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MipBackend {
    #[cfg(feature = "solver-scip")]
    Scip,
    #[cfg(feature = "solver-highs")]
    Highs,
    #[cfg(feature = "solver-cbc")]
    Cbc,
}

impl MipBackend {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_MIP_BACKENDS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            #[cfg(feature = "solver-scip")]
            MipBackend::Scip => "scip",
            #[cfg(feature = "solver-highs")]
            MipBackend::Highs => "highs",
            #[cfg(feature = "solver-cbc")]
            MipBackend::Cbc => "cbc",
        }
    }
}

#[allow(clippy::derivable_impls)]
impl Default for MipBackend {
    fn default() -> Self {
        #[cfg(feature = "solver-scip")]
        {
            MipBackend::Scip
        }
        #[cfg(all(not(feature = "solver-scip"), feature = "solver-highs"))]
        {
            MipBackend::Highs
        }
        #[cfg(all(not(feature = "solver-scip"), not(feature = "solver-highs")))]
        {
            MipBackend::Cbc
        }
    }
}

const AVAILABLE_MIP_BACKENDS: &[&str] = &[
    #[cfg(feature = "solver-scip")]
    "scip",
    #[cfg(feature = "solver-highs")]
    "highs",
    #[cfg(feature = "solver-cbc")]
    "cbc",
];

fn unknown_backend_error(label: &str) -> PollError {
    PollError::ConfigInvalid(format!(
        "unknown MIP backend '{}'; supported values: {}",
        label,
        MipBackend::available().join(", ")
    ))
}

impl Display for MipBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MipBackend {
    type Err = PollError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.to_ascii_lowercase();
        match normalized.as_str() {
            "scip" => {
                #[cfg(feature = "solver-scip")]
                {
                    Ok(MipBackend::Scip)
                }
                #[cfg(not(feature = "solver-scip"))]
                {
                    Err(unknown_backend_error(&normalized))
                }
            }
            "highs" => {
                #[cfg(feature = "solver-highs")]
                {
                    Ok(MipBackend::Highs)
                }
                #[cfg(not(feature = "solver-highs"))]
                {
                    Err(unknown_backend_error(&normalized))
                }
            }
            "cbc" | "coin_cbc" => {
                #[cfg(feature = "solver-cbc")]
                {
                    Ok(MipBackend::Cbc)
                }
                #[cfg(not(feature = "solver-cbc"))]
                {
                    Err(unknown_backend_error(&normalized))
                }
            }
            other => Err(unknown_backend_error(other)),
        }
    }
}

/// Solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Wall-clock limit (seconds), SCIP `limits/time`
    pub time_limit: f64,
    /// Relative MIP gap, SCIP `limits/gap`
    pub mip_gap: f64,
    /// LP threads, SCIP `lp/threads`
    pub threads: u32,
    /// Print solver output
    pub verbose: bool,
    pub backend: MipBackend,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit: 600.0,
            mip_gap: 0.02,
            threads: 2,
            verbose: false,
            backend: MipBackend::default(),
        }
    }
}

impl SolverConfig {
    pub fn for_run(config: &RunConfig) -> Self {
        Self {
            time_limit: config.time_limit as f64,
            ..Self::default()
        }
    }
}

/// Outcome class of a solve. A solve stopped by the gap limit counts as optimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Optimal,
    TimedOut,
}

impl SolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "Optimal",
            SolveStatus::TimedOut => "Timed Out",
        }
    }
}

impl Display for SolveStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variable values, objective and bound of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSolution {
    pub status: SolveStatus,
    /// Full objective, including any penalty term
    pub objective: f64,
    /// Assignment part of the objective: `(1/T)·Σ coef·match`
    pub base_objective: f64,
    /// Proven lower bound on the objective
    pub best_bound: Option<f64>,
    /// Relative gap between `objective` and `best_bound`
    pub gap: Option<f64>,
    /// Indexed like `PollingModel::sites`
    pub open_values: Vec<f64>,
    /// Indexed like `PollingModel::pairs`
    pub match_values: Vec<f64>,
    /// `(penalty, penalty_exp)` for the penalized model
    pub penalty_values: Option<(f64, f64)>,
    pub elapsed: Duration,
}

impl ModelSolution {
    pub fn is_open(&self, site: usize) -> bool {
        self.open_values[site] >= BINARY_THRESHOLD
    }

    pub fn open_sites(&self) -> Vec<usize> {
        (0..self.open_values.len())
            .filter(|s| self.is_open(*s))
            .collect()
    }

    /// Indices into `PollingModel::pairs` whose match rounds to 1.
    pub fn matched_pairs(&self) -> Vec<usize> {
        (0..self.match_values.len())
            .filter(|p| self.match_values[*p] >= BINARY_THRESHOLD)
            .collect()
    }

    /// Open sites whose location type is penalized.
    pub fn open_penalized(&self, model: &PollingModel) -> Vec<usize> {
        model
            .penalized_sites()
            .into_iter()
            .filter(|s| self.is_open(*s))
            .collect()
    }
}

struct ModelVariables {
    open: Vec<Variable>,
    matches: Vec<Variable>,
    /// `(penalty, penalty_exp)`
    penalty: Option<(Variable, Variable)>,
}

/// Values read back from one backend run.
struct RawSolve {
    status: SolutionStatus,
    open_values: Vec<f64>,
    match_values: Vec<f64>,
    penalty_values: Option<(f64, f64)>,
}

/// Base constraints plus exclusions and the penalty linearization.
fn add_model_constraints<M: SolverModel>(
    mut problem: M,
    model: &PollingModel,
    vars: &ModelVariables,
) -> M {
    let params = &model.params;

    let count: Expression = vars.open.iter().copied().sum();
    let p = params.precincts_open as f64;
    problem = problem.with(constraint!(count == p));

    for s in &model.excluded {
        problem = problem.with(constraint!(vars.open[*s] == 0.0));
    }

    if let Some(max_new) = model.max_new() {
        let new_open: Expression = model.new_sites().iter().map(|s| vars.open[*s]).sum();
        problem = problem.with(constraint!(new_open <= max_new));
    }
    if let Some(min_old) = model.min_old() {
        let old_open: Expression = model.old_sites().iter().map(|s| vars.open[*s]).sum();
        problem = problem.with(constraint!(old_open >= min_old));
    }

    let mut assigned = vec![Expression::from(0.0); model.origins.len()];
    let mut load = vec![Expression::from(0.0); model.sites.len()];
    for (pair, m) in model.pairs.iter().zip(&vars.matches) {
        assigned[pair.origin] += *m;
        load[pair.site] += model.origins[pair.origin].population * *m;
        problem = problem.with(constraint!(*m <= vars.open[pair.site]));
    }
    for expr in assigned {
        problem = problem.with(constraint!(expr == 1.0));
    }
    for expr in load {
        problem = problem.with(constraint!(expr <= params.site_capacity));
    }

    if let (Some(term), Some((penalty, penalty_exp))) = (&model.penalty, vars.penalty) {
        let scale = -params.alpha * params.beta * term.penalty;
        let penalized = model.penalized_sites();
        let opened: Expression = penalized.iter().map(|s| vars.open[*s]).sum();
        problem = problem.with(constraint!(penalty == scale * opened));
        for i in 0..=penalized.len() {
            let x = scale * i as f64;
            let slope = x.exp();
            let tangent: Expression = slope * penalty + slope * (1.0 - x);
            problem = problem.with(constraint!(penalty_exp >= tangent));
        }
    }
    problem
}

fn resolution_error(err: ResolutionError) -> PollError {
    match err {
        ResolutionError::Infeasible => PollError::Infeasible(
            "the MIP has no feasible assignment; check precincts_open, capacity and the radius"
                .into(),
        ),
        ResolutionError::Other("NoSolutionFound") => {
            PollError::SolverTimeout("the solver stopped before finding an incumbent".into())
        }
        other => PollError::Solver(other.to_string()),
    }
}

#[cfg(feature = "solver-scip")]
fn scip_option(err: impl std::fmt::Debug, option: &str) -> PollError {
    PollError::Solver(format!("setting SCIP parameter '{option}': {err:?}"))
}

/// `exp(-β·α·kp1)`, the weight of `penalty_exp - 1` in the penalized objective.
fn penalty_weight(model: &PollingModel) -> Option<f64> {
    let params = &model.params;
    model
        .penalty
        .as_ref()
        .map(|term| (-params.beta * params.alpha * term.kp1).exp())
}

/// Reads every variable. SCIP panics when asked for values it does not have, which
/// happens when the time limit hits before the first incumbent.
fn read_values(solution: &dyn Solution, vars: &ModelVariables) -> Result<RawSolve, PollError> {
    let status = solution.status();
    let read = catch_unwind(AssertUnwindSafe(|| {
        let open: Vec<f64> = vars.open.iter().map(|v| solution.value(*v)).collect();
        let matches: Vec<f64> = vars.matches.iter().map(|v| solution.value(*v)).collect();
        let penalty = vars
            .penalty
            .map(|(p, e)| (solution.value(p), solution.value(e)));
        (open, matches, penalty)
    }));
    let (open_values, match_values, penalty_values) = read.map_err(|_| {
        PollError::SolverTimeout("the solver stopped before finding an incumbent".into())
    })?;
    if open_values
        .iter()
        .chain(&match_values)
        .any(|v| !v.is_finite())
    {
        return Err(PollError::Solver(
            "solver returned a non-numeric variable value".into(),
        ));
    }
    Ok(RawSolve {
        status,
        open_values,
        match_values,
        penalty_values,
    })
}

/// Builds the model on the configured backend and solves it. With `relaxed` every
/// binary becomes a continuous variable in [0, 1].
fn run_backend(
    model: &PollingModel,
    settings: &SolverConfig,
    relaxed: bool,
) -> Result<RawSolve, PollError> {
    let binary = || -> VariableDefinition {
        if relaxed {
            variable().min(0.0).max(1.0)
        } else {
            variable().binary()
        }
    };
    let mut problem_vars = variables!();
    let open: Vec<Variable> = model
        .sites
        .iter()
        .map(|_| problem_vars.add(binary()))
        .collect();
    let matches: Vec<Variable> = model
        .pairs
        .iter()
        .map(|_| problem_vars.add(binary()))
        .collect();

    let mut objective = Expression::from(0.0);
    for (pair, m) in model.pairs.iter().zip(&matches) {
        objective += model.objective_coefficient(pair) * *m;
    }

    let mut penalty = None;
    if let Some(weight) = penalty_weight(model) {
        let penalty_var = problem_vars.add(variable().min(0.0));
        let penalty_exp = problem_vars.add(variable().min(0.0));
        objective += weight * penalty_exp;
        objective += -weight;
        penalty = Some((penalty_var, penalty_exp));
    }
    let vars = ModelVariables {
        open,
        matches,
        penalty,
    };

    let unsolved = problem_vars.minimise(objective);
    let solution: Box<dyn Solution> = match settings.backend {
        #[cfg(feature = "solver-scip")]
        MipBackend::Scip => {
            let problem = scip(unsolved)
                .try_set_option("limits/time", settings.time_limit)
                .map_err(|e| scip_option(e, "limits/time"))?
                .try_set_option("limits/gap", settings.mip_gap)
                .map_err(|e| scip_option(e, "limits/gap"))?
                .try_set_option("lp/threads", settings.threads as i32)
                .map_err(|e| scip_option(e, "lp/threads"))?
                .try_set_verbose(settings.verbose)
                .map_err(|e| scip_option(e, "display/verblevel"))?;
            let problem = add_model_constraints(problem, model, &vars);
            Box::new(problem.solve().map_err(resolution_error)?)
        }
        #[cfg(feature = "solver-highs")]
        MipBackend::Highs => {
            let problem = unsolved
                .using(highs)
                .set_option("time_limit", settings.time_limit)
                .set_option("mip_rel_gap", settings.mip_gap)
                .set_option("threads", settings.threads as i32)
                .set_option("output_flag", settings.verbose);
            let problem = add_model_constraints(problem, model, &vars);
            Box::new(problem.solve().map_err(resolution_error)?)
        }
        #[cfg(feature = "solver-cbc")]
        MipBackend::Cbc => {
            let mut problem = unsolved.using(coin_cbc);
            problem.set_parameter("sec", &settings.time_limit.to_string());
            problem.set_parameter("ratio", &settings.mip_gap.to_string());
            problem.set_parameter("threads", &settings.threads.to_string());
            problem.set_parameter("log", if settings.verbose { "1" } else { "0" });
            let problem = add_model_constraints(problem, model, &vars);
            Box::new(problem.solve().map_err(resolution_error)?)
        }
    };
    read_values(solution.as_ref(), &vars)
}

/// `(objective, base_objective)` of a set of variable values.
fn objective_value(model: &PollingModel, raw: &RawSolve) -> (f64, f64) {
    let base: f64 = model
        .pairs
        .iter()
        .zip(&raw.match_values)
        .map(|(pair, v)| model.objective_coefficient(pair) * v)
        .sum();
    match (penalty_weight(model), raw.penalty_values) {
        (Some(weight), Some((_, penalty_exp))) => (base + weight * (penalty_exp - 1.0), base),
        _ => (base, base),
    }
}

/// Relative gap in the engines' convention, `(objective - bound) / |objective|`.
fn relative_gap(objective: f64, bound: f64) -> f64 {
    if objective == 0.0 {
        return if bound >= 0.0 { 0.0 } else { f64::INFINITY };
    }
    ((objective - bound) / objective.abs()).max(0.0)
}

/// Lower bound from the LP relaxation of `model`; `None` when it cannot be solved.
fn relaxation_bound(model: &PollingModel, settings: &SolverConfig) -> Option<f64> {
    match run_backend(model, settings, true) {
        Ok(raw) => Some(objective_value(model, &raw).0),
        Err(err) => {
            warn!(error = %err, "LP relaxation failed; no bound reported");
            None
        }
    }
}

/// Solves `model` and reads back every variable, the bound and the gap.
pub fn solve_model(
    model: &PollingModel,
    settings: &SolverConfig,
) -> Result<ModelSolution, PollError> {
    debug!(
        backend = %settings.backend,
        time_limit = settings.time_limit,
        mip_gap = settings.mip_gap,
        threads = settings.threads,
        "starting MIP solve"
    );
    let start = Instant::now();
    let raw = run_backend(model, settings, false)?;
    let elapsed = start.elapsed();
    let (objective, base_objective) = objective_value(model, &raw);

    // the engine's own dual bound is not exposed, so non-optimal stops are bounded by
    // the gap limit they met and by the LP relaxation
    let (status, best_bound) = match raw.status {
        SolutionStatus::Optimal => (SolveStatus::Optimal, Some(objective)),
        SolutionStatus::GapLimit => {
            let from_gap = objective - settings.mip_gap * objective.abs();
            let bound = relaxation_bound(model, settings)
                .map_or(from_gap, |lp| lp.max(from_gap))
                .min(objective);
            (SolveStatus::Optimal, Some(bound))
        }
        SolutionStatus::TimeLimit => {
            let mut assigned = vec![0.0; model.origins.len()];
            for (pair, v) in model.pairs.iter().zip(&raw.match_values) {
                assigned[pair.origin] += v;
            }
            if assigned.iter().any(|a| *a < BINARY_THRESHOLD) {
                return Err(PollError::SolverTimeout(format!(
                    "no feasible assignment found within {}s",
                    settings.time_limit
                )));
            }
            let bound = relaxation_bound(model, settings).map(|lp| lp.min(objective));
            (SolveStatus::TimedOut, bound)
        }
    };
    let gap = best_bound.map(|bound| relative_gap(objective, bound));
    if status == SolveStatus::TimedOut {
        let gap_text = gap.map_or("unknown".to_string(), |g| format!("{g:.4}"));
        let err = PollError::SolverTimeout(format!(
            "time limit of {}s reached; best incumbent {objective}, gap {gap_text}",
            settings.time_limit
        ));
        warn!("{err}");
    }

    info!(
        status = %status,
        objective,
        best_bound = ?best_bound,
        gap = ?gap,
        elapsed_ms = elapsed.as_millis() as u64,
        "MIP solved"
    );
    Ok(ModelSolution {
        status,
        objective,
        base_objective,
        best_bound,
        gap,
        open_values: raw.open_values,
        match_values: raw.match_values,
        penalty_values: raw.penalty_values,
        elapsed,
    })
}
