//! Top-level application orchestration.
//!
//! `main.rs` only maps errors to exit codes. Everything else happens here:
//! arguments are parsed, logging is installed, each subcommand is turned
//! into a library config and its report is printed.

use clap::Parser;
use tracing::info;

use crate::cli::{CalibrateArgs, Command, QueryArgs, ShowArgs, SimulateArgs, SynthArgs};
use crate::data::{CsvSource, SynthConfig, generate_synthetic, write_table_csv};
use crate::domain::AnalysisQuery;
use crate::error::AppError;
use crate::fit::{CalibrationOptions, SolverOptions};
use crate::models::{SimConfig, forward_model};

pub mod pipeline;

/// Entry point for the `rcv` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    crate::logging::init_logging(cli.log_level);

    match cli.command {
        Command::Simulate(args) => handle_simulate(args),
        Command::Synth(args) => handle_synth(args),
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Show(args) => handle_show(args),
    }
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let mut config = sim_config_from_args(&args);

    if let Some(path) = &args.calibration {
        let record = crate::io::read_calibration_json(path)?;
        let params = crate::io::params_from_file(&record)?;
        let times: Vec<f64> = (0..config.nt).map(|s| s as f64 * config.dt).collect();
        config.k_a = params.k;
        config.n_a = params.n;
        // The stored profile is normalized; the model runs on the unnormalized one.
        config.profile = params.profile.sample(&times).iter().map(|v| v * params.b).collect();
        info!(k = params.k, n = params.n, b = params.b, "using calibrated parameters");
    }

    let traj = forward_model(&config)?;
    println!("{}", crate::report::format_simulation_summary(&traj));

    if let Some(path) = &args.export {
        crate::io::write_trajectories_csv(path, &traj)?;
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let query = query_from_args(&args.query);
    let config = SynthConfig {
        k_a: args.k_a,
        n_a: args.n_a,
        concentrations: args.concentrations.clone(),
        heights: args.heights.clone(),
        dt: args.dt,
        nt: args.nt,
        gamma: args.gamma,
        replicates: args.replicates,
        noise_sd: args.noise,
        seed: args.seed,
        ..SynthConfig::default()
    };
    let data = generate_synthetic(&config)?;
    let records = data.to_records(&query);
    write_table_csv(&args.out, &records)?;
    println!("Wrote {} rows to {}", records.len(), args.out.display());
    Ok(())
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let query = query_from_args(&args.query);
    let opts = calibration_options_from_args(&args);
    let source = CsvSource::load(&args.data)?;

    let run = pipeline::run_calibration(&source, &query, &opts)?;
    println!(
        "{}",
        crate::report::format_calibration_summary(&run.record, Some(&run.grid))
    );

    if let Some(path) = &args.export {
        crate::io::write_calibration_json(path, &run.record)?;
    }
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let record = crate::io::read_calibration_json(&args.calibration)?;
    println!("{}", crate::report::format_calibration_summary(&record, None));
    Ok(())
}

pub fn sim_config_from_args(args: &SimulateArgs) -> SimConfig {
    SimConfig {
        k_a: args.k_a,
        n_a: args.n_a,
        dt: args.dt,
        sim_steps: args.sim_steps,
        concentrations: args.concentrations.clone(),
        odval: vec![args.od; args.nt],
        profile: vec![1.0; args.nt],
        gamma: args.gamma,
        p0: args.p0,
        nt: args.nt,
    }
}

pub fn query_from_args(args: &QueryArgs) -> AnalysisQuery {
    AnalysisQuery {
        vector: args.vector.clone(),
        media: args.media.clone(),
        strain: args.strain.clone(),
        signal: args.signal.clone(),
        biomass_signal: args.biomass_signal.clone(),
        correction: args.correction,
    }
}

pub fn calibration_options_from_args(args: &CalibrateArgs) -> CalibrationOptions {
    CalibrationOptions {
        n_gaussians: args.n_gaussians,
        epsilon: args.epsilon,
        gamma: args.gamma,
        sim_steps: args.sim_steps,
        solver: SolverOptions {
            max_nfev: args.max_nfev,
            ..SolverOptions::default()
        },
        initial_guess: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn simulate_args_map_to_config() {
        let cli = Cli::parse_from(["rcv", "simulate", "--conc", "0,10", "--nt", "30", "--od", "0.5"]);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        let cfg = sim_config_from_args(&args);
        assert_eq!(cfg.concentrations, vec![0.0, 10.0]);
        assert_eq!(cfg.odval, vec![0.5; 30]);
        assert_eq!(cfg.profile.len(), 30);
        assert!(forward_model(&cfg).is_ok());
    }

    #[test]
    fn calibrate_args_map_to_options() {
        let cli = Cli::parse_from([
            "rcv", "calibrate", "--data", "d.csv", "--n-gaussians", "6", "--epsilon", "0.5", "--max-nfev", "50",
        ]);
        let Command::Calibrate(args) = cli.command else {
            panic!("expected calibrate");
        };
        let opts = calibration_options_from_args(&args);
        assert_eq!(opts.n_gaussians, 6);
        assert_eq!(opts.epsilon, 0.5);
        assert_eq!(opts.solver.max_nfev, Some(50));
        assert!(opts.initial_guess.is_none());
    }
}
