//! Residual construction for calibration.
//!
//! The optimization variable is laid out as `[K_A, n_A, h_1, …, h_G]`. For a
//! given vector the residual is
//!
//! ```text
//! [ data − model(K_A, n_A, profile(h)) ; ε · h ]
//! ```
//!
//! where the second block is a Tikhonov penalty pulling unused Gaussian
//! heights toward zero.

use nalgebra::DVector;

use crate::error::AppError;
use crate::math::GaussianBasis;
use crate::models::{SimConfig, forward_model};

/// Bounds on the Hill constant.
pub const K_BOUNDS: (f64, f64) = (0.0, 1e2);
/// Bounds on the Hill coefficient.
pub const N_BOUNDS: (f64, f64) = (0.0, 4.0);
/// Bounds on each Gaussian height.
pub const HEIGHT_BOUNDS: (f64, f64) = (0.0, 1e8);

/// Layout, bounds and default starting point of the parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterLayout {
    pub n_gaussians: usize,
}

impl ParameterLayout {
    pub fn new(n_gaussians: usize) -> Result<Self, AppError> {
        if n_gaussians == 0 {
            return Err(AppError::precondition("n_gaussians must be >= 1."));
        }
        Ok(Self { n_gaussians })
    }

    pub fn len(&self) -> usize {
        2 + self.n_gaussians
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn lower_bounds(&self) -> Vec<f64> {
        let mut lb = vec![K_BOUNDS.0, N_BOUNDS.0];
        lb.extend(std::iter::repeat_n(HEIGHT_BOUNDS.0, self.n_gaussians));
        lb
    }

    pub fn upper_bounds(&self) -> Vec<f64> {
        let mut ub = vec![K_BOUNDS.1, N_BOUNDS.1];
        ub.extend(std::iter::repeat_n(HEIGHT_BOUNDS.1, self.n_gaussians));
        ub
    }

    /// Zero Hill parameters and unit heights.
    pub fn initial_guess(&self) -> Vec<f64> {
        let mut x0 = vec![0.0, 0.0];
        x0.extend(std::iter::repeat_n(1.0, self.n_gaussians));
        x0
    }
}

/// Builds residual vectors for a fixed experiment.
///
/// The builder owns copies of its inputs and is `Sync`, so the solver can
/// evaluate it from several threads while differencing the Jacobian.
#[derive(Debug, Clone)]
pub struct ResidualBuilder {
    data: DVector<f64>,
    p0: f64,
    concentrations: Vec<f64>,
    odval: Vec<f64>,
    epsilon: f64,
    dt: f64,
    times: Vec<f64>,
    basis: GaussianBasis,
    gamma: f64,
    sim_steps: usize,
}

impl ResidualBuilder {
    /// `data` is flattened condition-major then time-major, matching
    /// [`crate::models::Trajectories::ravel`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data: &[f64],
        p0: f64,
        concentrations: &[f64],
        odval: &[f64],
        epsilon: f64,
        dt: f64,
        times: &[f64],
        n_gaussians: usize,
    ) -> Result<Self, AppError> {
        let layout = ParameterLayout::new(n_gaussians)?;
        let nt = times.len();
        if concentrations.is_empty() {
            return Err(AppError::precondition("No inducer concentrations to fit."));
        }
        if data.len() != concentrations.len() * nt {
            return Err(AppError::precondition(format!(
                "Data length {} does not match {} conditions × {} time points.",
                data.len(),
                concentrations.len(),
                nt
            )));
        }
        if odval.len() != nt {
            return Err(AppError::precondition(format!(
                "Biomass length {} does not match {} time points.",
                odval.len(),
                nt
            )));
        }
        if !(epsilon.is_finite() && epsilon >= 0.0) {
            return Err(AppError::precondition(format!("epsilon must be finite and >= 0, got {epsilon}.")));
        }
        if data.iter().chain(odval).any(|v| !v.is_finite()) || !p0.is_finite() {
            return Err(AppError::precondition("Data, biomass and p0 must be finite."));
        }
        let basis = GaussianBasis::over_times(times, layout.n_gaussians)?;

        Ok(Self {
            data: DVector::from_column_slice(data),
            p0,
            concentrations: concentrations.to_vec(),
            odval: odval.to_vec(),
            epsilon,
            dt,
            times: times.to_vec(),
            basis,
            gamma: 0.0,
            sim_steps: 10,
        })
    }

    /// Override the decay rate and Euler sub-steps used by the model.
    pub fn with_dynamics(mut self, gamma: f64, sim_steps: usize) -> Self {
        self.gamma = gamma;
        self.sim_steps = sim_steps;
        self
    }

    pub fn layout(&self) -> ParameterLayout {
        ParameterLayout {
            n_gaussians: self.basis.len(),
        }
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Length of every residual vector: data points plus one entry per height.
    pub fn residual_len(&self) -> usize {
        self.data.len() + self.basis.len()
    }

    /// Gaussian-mixture profile at the observed time points.
    pub fn profile(&self, heights: &[f64]) -> Vec<f64> {
        self.basis.mixture(heights, &self.times)
    }

    /// Model predictions for `x`, flattened like the data.
    pub fn model(&self, x: &[f64]) -> Result<DVector<f64>, AppError> {
        self.check_len(x)?;
        let config = SimConfig {
            k_a: x[0],
            n_a: x[1],
            dt: self.dt,
            sim_steps: self.sim_steps,
            concentrations: self.concentrations.clone(),
            odval: self.odval.clone(),
            profile: self.profile(&x[2..]),
            gamma: self.gamma,
            p0: self.p0,
            nt: self.times.len(),
        };
        Ok(forward_model(&config)?.ravel())
    }

    /// Residual vector `[data − model ; ε·heights]`.
    pub fn residuals(&self, x: &[f64]) -> Result<DVector<f64>, AppError> {
        let model = self.model(x)?;
        let heights = &x[2..];

        let n_data = self.data.len();
        let mut out = DVector::<f64>::zeros(self.residual_len());
        out.rows_mut(0, n_data).copy_from(&(&self.data - &model));
        out.rows_mut(n_data, heights.len())
            .copy_from(&(DVector::from_column_slice(heights) * self.epsilon));
        Ok(out)
    }

    /// `sqrt(|Δprofile|)` between consecutive time points.
    ///
    /// Reported for diagnostics only; it is not part of the residual.
    pub fn total_variation(&self, x: &[f64]) -> Result<Vec<f64>, AppError> {
        self.check_len(x)?;
        let profile = self.profile(&x[2..]);
        Ok(profile.windows(2).map(|w| (w[1] - w[0]).abs().sqrt()).collect())
    }

    fn check_len(&self, x: &[f64]) -> Result<(), AppError> {
        let expected = self.layout().len();
        if x.len() != expected {
            return Err(AppError::precondition(format!(
                "Parameter vector has length {}, expected {expected}.",
                x.len()
            )));
        }
        Ok(())
    }
}
