use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "polleq", author, version, about = "Equity-weighted polling-site optimization", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

/// Solver knobs shared by `run` and `batch`.
#[derive(clap::Args, Debug, Clone)]
pub struct SolverArgs {
    /// MIP backend (scip, highs or cbc, as compiled in); scip when available
    #[arg(long)]
    pub backend: Option<String>,
    /// Relative MIP gap
    #[arg(long, default_value_t = 0.02)]
    pub mip_gap: f64,
    /// Threads per solve
    #[arg(long, default_value_t = 2)]
    pub solver_threads: u32,
    /// Print the solver's own log
    #[arg(long)]
    pub solver_verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Optimize one run config and write its result tables
    Run {
        /// Run config (YAML) inside a folder named after its config_set
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: PathBuf,
        /// Data root holding one folder per location
        #[arg(long, value_hint = ValueHint::DirPath)]
        data: PathBuf,
        /// CSV output root
        #[arg(long, default_value = "output", conflicts_with = "warehouse")]
        out: PathBuf,
        /// DuckDB warehouse file to write results to instead of CSV
        #[arg(long)]
        warehouse: Option<PathBuf>,
        /// Re-assemble the distances table even if it exists
        #[arg(long)]
        rebuild: bool,
        #[command(flatten)]
        solver: SolverArgs,
    },
    /// Run many configs in parallel and write a batch manifest
    Batch {
        /// Config files or folders of *.yaml files
        #[arg(long, num_args = 1.., required = true)]
        configs: Vec<PathBuf>,
        #[arg(long, value_hint = ValueHint::DirPath)]
        data: PathBuf,
        /// Output root for the manifest, CSV tables and penalty logs
        #[arg(long)]
        out: PathBuf,
        /// Worker threads (0 = all CPUs)
        #[arg(long, default_value_t = 0)]
        threads: usize,
        #[arg(long)]
        warehouse: Option<PathBuf>,
        #[arg(long)]
        rebuild: bool,
        #[command(flatten)]
        solver: SolverArgs,
    },
    /// Build the canonical distances table of a location
    Assemble {
        #[arg(long)]
        location: String,
        #[arg(long, value_hint = ValueHint::DirPath)]
        data: PathBuf,
        /// Use driving distances instead of haversine
        #[arg(long)]
        driving: bool,
        /// Log-transform the distances
        #[arg(long)]
        log_distance: bool,
        #[arg(long, default_value_t = 2020)]
        census_year: u16,
        /// Date suffix of the driving-distances file
        #[arg(long)]
        map_source_date: Option<String>,
    },
    /// Config tooling
    Configs {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write one config per value of a single field
    Generate {
        /// Base config
        #[arg(long, value_hint = ValueHint::FilePath)]
        base: PathBuf,
        /// Field to vary
        #[arg(long)]
        field: String,
        /// Comma-separated values; bracketed lists stay whole (`[2016, 2020],2020`)
        #[arg(long)]
        values: String,
        /// Destination folder (defaults to the base config's folder)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Parse and validate config files
    Validate {
        #[arg(required = true)]
        configs: Vec<PathBuf>,
    },
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

/// Splits `values` on commas that are not inside brackets.
pub fn split_values(values: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in values.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => out.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    out.push(current);
    out.into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
