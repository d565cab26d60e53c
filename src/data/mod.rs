//! Measurement data: the source boundary, aggregation into an experiment grid,
//! CSV-backed and synthetic sources.

pub mod csv_source;
pub mod grid;
pub mod source;
pub mod synthetic;

pub use csv_source::*;
pub use grid::*;
pub use source::*;
pub use synthetic::*;
