//! Formatted terminal output for simulations and calibrations.

pub mod format;

pub use format::*;
