//! Calibration of the receiver model.
//!
//! Responsibilities:
//!
//! - build residual vectors for a parameter vector (`residual`)
//! - minimize them under box constraints (`solver`)
//! - turn the optimum into receiver parameters (`calibrate`)

pub mod calibrate;
pub mod residual;
pub mod solver;

pub use calibrate::*;
pub use residual::*;
pub use solver::*;
