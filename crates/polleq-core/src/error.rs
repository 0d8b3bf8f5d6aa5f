//! Error kinds of the polling-assignment pipeline.
//!
//! Every abort of a run is one [`PollError`] variant. IO-heavy code returns
//! `anyhow::Result` and wraps these values, so callers classify a failure with
//! `err.downcast_ref::<PollError>()` and pick the exit code from it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PollError {
    /// Missing or unknown keys, out-of-range values, folder vs `config_set` mismatch
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A census, TIGER, candidate-site or driving-distance file is absent
    #[error("missing source file: {0}")]
    SourceMissing(String),

    /// Inconsistent input data (P3/P4 totals, duplicate site names, duplicate populations)
    #[error("data integrity violation: {0}")]
    IntegrityViolation(String),

    /// Some origin-destination pairs have no distance, or an origin has no site in range
    #[error("coverage gap: {0}")]
    CoverageGap(String),

    #[error("model infeasible: {0}")]
    Infeasible(String),

    /// Values beyond what the MIP engine can represent
    #[error("numeric limit exceeded: {0}")]
    NumericLimit(String),

    #[error("solver stopped at the time limit: {0}")]
    SolverTimeout(String),

    #[error("solver error: {0}")]
    Solver(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PollError {
    /// Process exit code for this kind. Zero is reserved for success.
    pub fn exit_code(&self) -> i32 {
        match self {
            PollError::ConfigInvalid(_) => 2,
            PollError::SourceMissing(_) => 3,
            PollError::IntegrityViolation(_) => 4,
            PollError::CoverageGap(_) => 5,
            PollError::Infeasible(_) => 6,
            PollError::NumericLimit(_) => 7,
            PollError::SolverTimeout(_) => 8,
            PollError::Solver(_) => 9,
            PollError::Io(_) => 10,
        }
    }

    /// Short stable name of the kind, used in manifests.
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::ConfigInvalid(_) => "config_invalid",
            PollError::SourceMissing(_) => "source_missing",
            PollError::IntegrityViolation(_) => "integrity_violation",
            PollError::CoverageGap(_) => "coverage_gap",
            PollError::Infeasible(_) => "infeasible",
            PollError::NumericLimit(_) => "numeric_limit",
            PollError::SolverTimeout(_) => "solver_timeout",
            PollError::Solver(_) => "solver",
            PollError::Io(_) => "io",
        }
    }
}

/// Exit code for an arbitrary pipeline error: the [`PollError`] code when one is
/// somewhere in the chain, 1 otherwise.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PollError>())
        .map(PollError::exit_code)
        .unwrap_or(1)
}
