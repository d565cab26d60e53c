//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed across the data-source boundary (`AnalysisQuery`, `MeasurementRow`)
//! - exported to JSON/CSV after calibration (`CalibrationFile`)
//! - reloaded later for inspection (`rcv show`)

use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::fit::SolverReport;

/// Pre-processing applied by the data source before rows reach calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Correction {
    /// Background (autofluorescence / blank) subtracted.
    BackgroundCorrect,
    /// Raw readings.
    Raw,
}

/// Selects one experiment's measurements from a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisQuery {
    pub vector: String,
    pub media: String,
    pub strain: String,
    /// Reporter signal to fetch.
    pub signal: String,
    /// Signal used as biomass (e.g. OD).
    pub biomass_signal: String,
    pub correction: Correction,
}

impl AnalysisQuery {
    /// The same selection, fetching the biomass signal instead.
    pub fn biomass(&self) -> Self {
        Self {
            signal: self.biomass_signal.clone(),
            ..self.clone()
        }
    }
}

/// One measurement of one sample at one time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub sample: String,
    /// Inducer concentration of the sample.
    pub concentration: f64,
    pub time: f64,
    pub measurement: f64,
}

/// Normalized profile on the observed time grid (peak value 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileGrid {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

/// Fitted receiver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedParams {
    pub a: f64,
    pub b: f64,
    pub k: f64,
    pub n: f64,
}

/// Portable record of a calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub tool: String,
    pub generated: DateTime<Local>,
    pub query: Option<AnalysisQuery>,
    pub n_gaussians: usize,
    pub epsilon: f64,
    pub params: FittedParams,
    pub profile: ProfileGrid,
    pub solver: SolverReport,
}
