//! Safe SQL builder: identifiers from the registered model only, values as
//! bind parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
