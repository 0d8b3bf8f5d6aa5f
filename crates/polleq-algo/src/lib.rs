//! # polleq-algo: Equity-Weighted Polling-Site Optimization
//!
//! Turns an assembled origin-destination distances table into an assignment of census
//! blocks to a fixed number of open polling sites.
//!
//! ## Pipeline
//!
//! | Step | Module | Output |
//! |------|--------|--------|
//! | clean | [`clean`] | table restricted to the run's years and location types |
//! | calibrate | [`alpha`] | scaling constant α from existing polling places |
//! | model | [`model`] | [`PollingModel`]: index sets, parameters, radius |
//! | solve | [`solver`] | [`ModelSolution`] from SCIP (or HiGHS, CBC) through `good_lp`, with bound and gap |
//! | penalize | [`penalty`] | three-model cascade for penalized site types |
//! | aggregate | [`results`] | the four output tables |
//! | verify | [`verify`] | list of violated invariants |
//!
//! [`workflow::optimize`] chains all of them.
//!
//! ## Objective
//!
//! With β = 0 the model minimizes the population-weighted mean distance. With β < 0 it
//! minimizes the mean Kolm-Pollak factor `exp(-β·α·d)`, whose log-transform is the
//! Equally-Distributed Equivalent distance (see [`ede`]).
//!
//! ## Example
//!
//! ```ignore
//! use polleq_algo::{optimize, SolverConfig};
//!
//! let config = polleq_core::load_config(path)?;
//! let outcome = optimize(&config, &table, &SolverConfig::for_run(&config), None)?;
//! println!("objective {}", outcome.objective);
//! ```

pub mod alpha;
pub mod clean;
pub mod ede;
pub mod model;
pub mod penalty;
pub mod results;
pub mod solver;
pub mod verify;
pub mod workflow;

pub use alpha::{compute_alpha, AlphaVariant};
pub use clean::{clean_data, excluded_types};
pub use ede::{ede, ede_from_objective, kp_factor, MAX_KP_FACTOR};
pub use model::{Destination, ModelParams, Origin, Pair, PenaltyTerm, PollingModel};
pub use penalty::{solve_with_penalties, CascadeStage, PenaltyOutcome};
pub use results::aggregate_results;
pub use solver::{solve_model, MipBackend, ModelSolution, SolveStatus, SolverConfig};
pub use verify::{verify_solution, Violation};
pub use workflow::{optimize, RunOutcome};
