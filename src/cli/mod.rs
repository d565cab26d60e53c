//! Command-line parsing for the receiver simulator/calibrator.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling/math code; `app` maps these structs onto library configs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Correction;
use crate::logging::LogLevel;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rcv", version, about = "Receiver circuit simulator and calibrator")]
pub struct Cli {
    /// Log verbosity (overridden by RUST_LOG).
    #[arg(long, value_enum, global = true, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate reporter dynamics for a set of inducer concentrations.
    Simulate(SimulateArgs),
    /// Generate a synthetic experiment table (CSV) from known parameters.
    Synth(SynthArgs),
    /// Fit Hill parameters and the expression profile to a measurement table.
    Calibrate(CalibrateArgs),
    /// Print a previously exported calibration JSON.
    Show(ShowArgs),
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Hill constant K_A.
    #[arg(long, default_value_t = 1.0)]
    pub k_a: f64,

    /// Hill coefficient n_A.
    #[arg(long, default_value_t = 2.0)]
    pub n_a: f64,

    /// Outer time step.
    #[arg(long, default_value_t = 0.05)]
    pub dt: f64,

    /// Euler sub-steps per outer step.
    #[arg(long, default_value_t = 10)]
    pub sim_steps: usize,

    /// Number of outer steps.
    #[arg(long, default_value_t = 100)]
    pub nt: usize,

    /// Inducer concentrations (comma-separated).
    #[arg(long = "conc", value_delimiter = ',', default_values_t = [0.0, 1.0, 10.0])]
    pub concentrations: Vec<f64>,

    /// Constant biomass value.
    #[arg(long, default_value_t = 1.0)]
    pub od: f64,

    /// Reporter decay rate.
    #[arg(long, default_value_t = 0.0)]
    pub gamma: f64,

    /// Initial reporter level.
    #[arg(long, default_value_t = 0.0)]
    pub p0: f64,

    /// Take K, n and the expression profile from a calibration JSON.
    #[arg(long, value_name = "JSON")]
    pub calibration: Option<PathBuf>,

    /// Export trajectories to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Identifiers selecting one experiment.
#[derive(Debug, Args, Clone)]
pub struct QueryArgs {
    #[arg(long, default_value = "pReceiver")]
    pub vector: String,

    #[arg(long, default_value = "M9")]
    pub media: String,

    #[arg(long, default_value = "MG1655")]
    pub strain: String,

    /// Reporter signal name.
    #[arg(long, default_value = "GFP")]
    pub signal: String,

    /// Biomass signal name.
    #[arg(long, default_value = "OD")]
    pub biomass_signal: String,

    #[arg(long, value_enum, default_value_t = Correction::BackgroundCorrect)]
    pub correction: Correction,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    #[arg(long, default_value_t = 2.0)]
    pub k_a: f64,

    #[arg(long, default_value_t = 1.5)]
    pub n_a: f64,

    /// Inducer concentrations (comma-separated).
    #[arg(long = "conc", value_delimiter = ',', default_values_t = [0.0, 0.5, 1.0, 2.0, 5.0, 20.0])]
    pub concentrations: Vec<f64>,

    /// Heights of the generating Gaussian profile (comma-separated).
    #[arg(long, value_delimiter = ',', default_values_t = [2.0, 5.0, 3.0, 1.0])]
    pub heights: Vec<f64>,

    #[arg(long, default_value_t = 0.25)]
    pub dt: f64,

    #[arg(long, default_value_t = 40)]
    pub nt: usize,

    #[arg(long, default_value_t = 0.0)]
    pub gamma: f64,

    #[arg(long, default_value_t = 3)]
    pub replicates: usize,

    /// Standard deviation of additive measurement noise.
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output CSV.
    #[arg(long, short = 'o')]
    pub out: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct CalibrateArgs {
    /// Long-format measurement CSV.
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    #[command(flatten)]
    pub query: QueryArgs,

    /// Gaussians in the profile basis.
    #[arg(long, default_value_t = 10)]
    pub n_gaussians: usize,

    /// Tikhonov weight on Gaussian heights.
    #[arg(long, default_value_t = 1e-3)]
    pub epsilon: f64,

    /// Reporter decay rate assumed by the model.
    #[arg(long, default_value_t = 0.0)]
    pub gamma: f64,

    #[arg(long, default_value_t = 10)]
    pub sim_steps: usize,

    /// Residual evaluation budget (default: 100 × parameters).
    #[arg(long)]
    pub max_nfev: Option<usize>,

    /// Export the calibration to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Calibration JSON produced by `rcv calibrate --export`.
    #[arg(value_name = "JSON")]
    pub calibration: PathBuf,
}
