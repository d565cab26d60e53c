//! Input/output helpers.
//!
//! - calibration JSON read/write (`calibration`)
//! - trajectory exports (`export`)

pub mod calibration;
pub mod export;

pub use calibration::*;
pub use export::*;
