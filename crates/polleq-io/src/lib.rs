//! # polleq-io: Inputs, Distance Assembly and Result Sinks
//!
//! Everything that touches the filesystem or a database:
//!
//! - [`importers`]: candidate sites, census P3/P4, TIGER shapefiles, driving distances
//! - [`assemble`]: builds the canonical origin-destination distances table
//! - [`distances`]: reads and writes that table as CSV
//! - [`output`]: the [`ResultSink`] trait with a CSV-folder and a DuckDB backend
//!
//! ## Quick Start
//!
//! ```no_run
//! use polleq_io::assemble::{load_or_assemble, AssembleOptions};
//!
//! let options = AssembleOptions {
//!     location: "Gwinnett_GA".into(),
//!     census_year: 2020,
//!     driving: false,
//!     log_distance: false,
//!     map_source_date: None,
//! };
//! let table = load_or_assemble(std::path::Path::new("datasets"), &options, false)?;
//! println!("{} origin-destination pairs", table.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod assemble;
pub mod distances;
pub mod importers;
pub mod output;
pub mod paths;

pub use assemble::{assemble, assemble_table, load_or_assemble, AssembleOptions, SourceInputs};
pub use distances::{read_distance_table, write_distance_table};
pub use output::{CsvSink, ResultSink};
#[cfg(feature = "warehouse")]
pub use output::WarehouseSink;
pub use paths::DataPaths;
