//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - data-source boundary types (`AnalysisQuery`, `MeasurementRow`, `Correction`)
//! - calibration outputs (`FittedParams`, `ProfileGrid`, `CalibrationFile`)

pub mod types;

pub use types::*;
