//! Readers for the raw inputs of the source assembler.
//!
//! - [`sites`]: candidate polling locations (`Location, Address, Location type, "Lat, Long"`)
//! - [`census`]: decennial P3/P4 block demographics
//! - [`tiger`]: block and block-group internal points from TIGER shapefiles
//! - [`driving`]: precomputed road-network distances

pub mod census;
pub mod driving;
pub mod sites;
pub mod tiger;

pub use census::read_block_demographics;
pub use driving::{read_driving_distances, DrivingDistances};
pub use sites::read_sites;
pub use tiger::{read_tiger_points, TigerPoint};
