//! # polleq-core: Domain Model for Equitable Polling-Site Assignment
//!
//! Shared data structures used by every other crate in the workspace:
//!
//! - **Blocks** (origins): census blocks with a population and demographic breakdown
//! - **Sites** (destinations): existing polling places, potential sites and block-group
//!   centroids
//! - **OD records**: one row per (block, site) pair with the travel distance between them
//! - **RunConfig**: the immutable parameter set for one optimization run
//! - **Result rows**: the four tables a finished run emits
//!
//! ## Data flow
//!
//! ```text
//! sites + census + TIGER ──► DistanceTable ──► cleaned ──► MIP ──► ResultTables
//!        (polleq-io)                         (polleq-algo)          (polleq-io sinks)
//! ```
//!
//! Site categories are derived from free-text `location_type` strings. All of that string
//! matching lives in [`classify`] so that a typed input schema can replace it in one place.
//!
//! ## Errors
//!
//! Domain failures are reported as [`PollError`]; each variant is one failure kind of the
//! pipeline and maps to its own process exit code.

pub mod classify;
pub mod config;
pub mod distance;
pub mod error;
pub mod results;
pub mod types;
pub mod variants;

pub use classify::{
    classify_raw, classify_site, is_centroid_type, is_potential_type, mentions_any_year,
};
pub use config::{load_config, RunConfig};
pub use distance::{haversine_m, log_distance, LOG_DISTANCE_FLOOR_M};
pub use error::{exit_code_for, PollError};
pub use results::{DistanceSummaryRow, EdeRow, ResultRow, ResultTables, RunRecord};
pub use types::{
    Block, Demographics, DestType, DistanceSource, DistanceTable, OdRecord, Site,
    DEMOGRAPHIC_COLUMNS,
};
pub use variants::{generate_variants, write_variants};
