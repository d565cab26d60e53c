//! Calibration of receiver parameters from time-series data.
//!
//! Pipeline:
//! - fetch expression and biomass rows from a [`MeasurementSource`]
//! - aggregate into an [`ExperimentGrid`]
//! - solve the bounded least squares problem built by [`ResidualBuilder`]
//! - rebuild the profile from the fitted heights and normalize it to peak 1
//!
//! The result is a new [`Calibration`] record; applying it to a receiver is a
//! separate, all-or-nothing step ([`Receiver::apply_calibration`]).

use tracing::{info, warn};

use crate::data::{ExperimentGrid, MeasurementSource};
use crate::domain::{AnalysisQuery, FittedParams, ProfileGrid};
use crate::error::AppError;
use crate::fit::{ParameterLayout, ResidualBuilder, SolverOptions, SolverReport, least_squares};
use crate::models::{InducerSource, Profile, Receiver, ReceiverParams};

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOptions {
    /// Number of Gaussians in the profile basis.
    pub n_gaussians: usize,
    /// Tikhonov weight on the Gaussian heights.
    pub epsilon: f64,
    /// Reporter decay rate assumed by the model.
    pub gamma: f64,
    /// Euler sub-steps per observation interval.
    pub sim_steps: usize,
    pub solver: SolverOptions,
    /// Starting point; defaults to zero Hill parameters and unit heights.
    pub initial_guess: Option<Vec<f64>>,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            n_gaussians: 10,
            epsilon: 1e-3,
            gamma: 0.0,
            sim_steps: 10,
            solver: SolverOptions::default(),
            initial_guess: None,
        }
    }
}

/// Fitted receiver parameters plus solver diagnostics.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub params: ReceiverParams,
    pub report: SolverReport,
}

impl Calibration {
    pub fn fitted(&self) -> FittedParams {
        FittedParams {
            a: self.params.a,
            b: self.params.b,
            k: self.params.k,
            n: self.params.n,
        }
    }

    /// The normalized profile on its grid.
    ///
    /// Calibration always produces an interpolated profile.
    pub fn profile_grid(&self) -> ProfileGrid {
        match &self.params.profile {
            Profile::Interpolated(grid) => ProfileGrid {
                times: grid.times().to_vec(),
                values: grid.values().to_vec(),
            },
            _ => ProfileGrid {
                times: Vec::new(),
                values: Vec::new(),
            },
        }
    }
}

/// Fit Hill parameters and the expression profile to an experiment grid.
pub fn calibrate(grid: &ExperimentGrid, opts: &CalibrationOptions) -> Result<Calibration, AppError> {
    if grid.conditions() == 0 {
        return Err(AppError::precondition("No inducer concentrations to fit."));
    }
    if grid.steps() < 2 {
        return Err(AppError::precondition("At least 2 time points are required."));
    }
    if !(grid.dt.is_finite() && grid.dt > 0.0) {
        return Err(AppError::precondition(format!("Time step must be > 0, got {}.", grid.dt)));
    }
    let layout = ParameterLayout::new(opts.n_gaussians)?;

    // The first cell (lowest concentration, first time point) seeds every condition.
    let p0 = grid.expression[0];
    let builder = ResidualBuilder::new(
        &grid.expression,
        p0,
        &grid.concentrations,
        &grid.biomass,
        opts.epsilon,
        grid.dt,
        &grid.times,
        opts.n_gaussians,
    )?
    .with_dynamics(opts.gamma, opts.sim_steps);

    let x0 = opts.initial_guess.clone().unwrap_or_else(|| layout.initial_guess());
    if x0.len() != layout.len() {
        return Err(AppError::precondition(format!(
            "Initial guess has length {}, expected {}.",
            x0.len(),
            layout.len()
        )));
    }

    info!(
        conditions = grid.conditions(),
        time_points = grid.steps(),
        dt = grid.dt,
        n_gaussians = opts.n_gaussians,
        epsilon = opts.epsilon,
        "calibrating receiver"
    );
    let report = least_squares(
        |x| builder.residuals(x),
        &x0,
        &layout.lower_bounds(),
        &layout.upper_bounds(),
        &opts.solver,
    )?;

    if !report.converged() {
        warn!(status = %report.status, nfev = report.nfev, cost = report.cost, "calibration rejected");
        return Err(AppError::NotConverged {
            report: Box::new(report),
        });
    }

    let k = report.x[0];
    let n = report.x[1];
    let profile = builder.profile(&report.x[2..]);
    let b = profile.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(b.is_finite() && b > 0.0) {
        return Err(AppError::numerical(format!(
            "Fitted profile has no positive peak (max={b}); cannot normalize."
        )));
    }
    let normalized: Vec<f64> = profile.iter().map(|v| v / b).collect();
    let profile = Profile::interpolated(grid.times.clone(), normalized)?;
    let params = ReceiverParams::new(0.0, b, k, n, profile)?;

    info!(
        k,
        n,
        b,
        cost = report.cost,
        nfev = report.nfev,
        status = %report.status,
        "calibration converged"
    );

    Ok(Calibration { params, report })
}

impl<I: InducerSource, O> Receiver<I, O> {
    /// Fetch the experiment described by `query` and calibrate against it.
    ///
    /// The receiver is not modified; pass the result to
    /// [`Receiver::apply_calibration`] to adopt it.
    pub fn characterize<S: MeasurementSource>(
        &self,
        source: &S,
        query: &AnalysisQuery,
        opts: &CalibrationOptions,
    ) -> Result<Calibration, AppError> {
        let grid = ExperimentGrid::fetch(source, query)?;
        calibrate(&grid, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemorySource, SynthConfig, generate_synthetic};
    use crate::domain::Correction;
    use crate::models::FixedInducer;

    fn query() -> AnalysisQuery {
        AnalysisQuery {
            vector: "pRec".into(),
            media: "M9".into(),
            strain: "MG1655".into(),
            signal: "GFP".into(),
            biomass_signal: "OD".into(),
            correction: Correction::BackgroundCorrect,
        }
    }

    fn synthetic_grid(cfg: &SynthConfig) -> ExperimentGrid {
        let data = generate_synthetic(cfg).unwrap();
        ExperimentGrid::from_rows(&data.expression_rows, &data.biomass_rows).unwrap()
    }

    fn receiver() -> Receiver<FixedInducer> {
        let params = ReceiverParams::new(0.1, 1.0, 1.0, 1.0, Profile::Constant).unwrap();
        Receiver::new(FixedInducer(1.0), (), params)
    }

    #[test]
    fn recovers_known_parameters_from_exact_data() {
        let cfg = SynthConfig {
            replicates: 1,
            ..SynthConfig::default()
        };
        let grid = synthetic_grid(&cfg);
        let opts = CalibrationOptions {
            n_gaussians: cfg.heights.len(),
            epsilon: 0.0,
            initial_guess: Some(vec![1.0; 6]),
            solver: SolverOptions {
                max_nfev: Some(5000),
                ..SolverOptions::default()
            },
            ..CalibrationOptions::default()
        };
        let cal = calibrate(&grid, &opts).unwrap();

        assert!(cal.report.converged());
        assert!((cal.params.k - cfg.k_a).abs() < 1e-3 * cfg.k_a, "K={}", cal.params.k);
        assert!((cal.params.n - cfg.n_a).abs() < 1e-3 * cfg.n_a, "n={}", cal.params.n);
        for (h, h_true) in cal.report.x[2..].iter().zip(&cfg.heights) {
            assert!((h - h_true).abs() < 1e-2 * h_true.max(1.0), "h={h} true={h_true}");
        }
    }

    #[test]
    fn normalized_profile_peaks_at_one() {
        let cfg = SynthConfig {
            noise_sd: 0.02,
            ..SynthConfig::default()
        };
        let grid = synthetic_grid(&cfg);
        let opts = CalibrationOptions {
            n_gaussians: 5,
            epsilon: 1e-2,
            initial_guess: Some(vec![1.0; 7]),
            solver: SolverOptions {
                max_nfev: Some(5000),
                ..SolverOptions::default()
            },
            ..CalibrationOptions::default()
        };
        let cal = calibrate(&grid, &opts).unwrap();

        assert_eq!(cal.params.a, 0.0);
        assert!(cal.params.b > 0.0);
        let grid_profile = cal.profile_grid();
        let (imax, _) = grid_profile
            .values
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert_eq!(cal.params.profile.eval(grid_profile.times[imax]), 1.0);
        assert!(grid_profile.values.iter().all(|&v| v <= 1.0));
    }

    #[test]
    fn default_start_recovers_known_parameters() {
        let cfg = SynthConfig {
            replicates: 1,
            ..SynthConfig::default()
        };
        let grid = synthetic_grid(&cfg);
        let opts = CalibrationOptions {
            n_gaussians: cfg.heights.len(),
            epsilon: 0.0,
            initial_guess: None,
            ..CalibrationOptions::default()
        };
        let cal = calibrate(&grid, &opts).unwrap();

        assert!(cal.report.converged(), "status={}", cal.report.status);
        assert!((cal.params.k - cfg.k_a).abs() < 1e-3 * cfg.k_a, "K={}", cal.params.k);
        assert!((cal.params.n - cfg.n_a).abs() < 1e-3 * cfg.n_a, "n={}", cal.params.n);
    }

    #[test]
    fn non_convergence_is_surfaced_and_receiver_untouched() {
        let data = generate_synthetic(&SynthConfig::default()).unwrap();
        let source = MemorySource::new()
            .with_signal("GFP", data.expression_rows)
            .with_signal("OD", data.biomass_rows);
        let opts = CalibrationOptions {
            n_gaussians: 4,
            solver: SolverOptions {
                max_nfev: Some(2),
                ..SolverOptions::default()
            },
            ..CalibrationOptions::default()
        };
        let mut rx = receiver();
        match rx.characterize(&source, &query(), &opts) {
            Ok(cal) => {
                rx.apply_calibration(cal);
                panic!("expected NotConverged");
            }
            Err(AppError::NotConverged { report }) => assert!(!report.converged()),
            Err(other) => panic!("expected NotConverged, got {other}"),
        }
        let p = rx.params();
        assert_eq!((p.a, p.b, p.k, p.n), (0.1, 1.0, 1.0, 1.0));
        assert_eq!(p.profile.kind_name(), "constant");
        assert!(rx.last_fit().is_none());
    }

    #[test]
    fn zero_gaussians_rejected() {
        let grid = synthetic_grid(&SynthConfig::default());
        let opts = CalibrationOptions {
            n_gaussians: 0,
            ..CalibrationOptions::default()
        };
        assert!(matches!(calibrate(&grid, &opts), Err(AppError::Precondition(_))));
    }

    #[test]
    fn wrong_initial_guess_length_rejected() {
        let grid = synthetic_grid(&SynthConfig::default());
        let opts = CalibrationOptions {
            n_gaussians: 3,
            initial_guess: Some(vec![1.0, 1.0]),
            ..CalibrationOptions::default()
        };
        assert!(matches!(calibrate(&grid, &opts), Err(AppError::Precondition(_))));
    }

    #[test]
    fn characterize_then_apply_updates_all_parameters() {
        let cfg = SynthConfig {
            replicates: 2,
            ..SynthConfig::default()
        };
        let data = generate_synthetic(&cfg).unwrap();
        let source = MemorySource::new()
            .with_signal("GFP", data.expression_rows.clone())
            .with_signal("OD", data.biomass_rows.clone());

        let mut rx = receiver();
        let opts = CalibrationOptions {
            n_gaussians: 4,
            epsilon: 0.0,
            initial_guess: Some(vec![1.0; 6]),
            solver: SolverOptions {
                max_nfev: Some(5000),
                ..SolverOptions::default()
            },
            ..CalibrationOptions::default()
        };
        let cal = rx.characterize(&source, &query(), &opts).unwrap();
        // Characterization alone leaves the receiver as it was.
        assert_eq!(rx.params().a, 0.1);

        let fitted = cal.fitted();
        rx.apply_calibration(cal);
        let p = rx.params();
        assert_eq!((p.a, p.b, p.k, p.n), (fitted.a, fitted.b, fitted.k, fitted.n));
        assert_eq!(p.profile.kind_name(), "interpolated");
        assert!(rx.last_fit().is_some());
        assert!(rx.expression_rate(5.0, 0.25).is_finite());
    }

    #[test]
    fn characterize_reports_missing_signal() {
        let data = generate_synthetic(&SynthConfig::default()).unwrap();
        let source = MemorySource::new().with_signal("GFP", data.expression_rows);
        let err = receiver()
            .characterize(&source, &query(), &CalibrationOptions::default())
            .unwrap_err();
        assert!(matches!(err, AppError::Data(_)));
    }
}
