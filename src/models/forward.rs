//! Forward simulation of reporter-protein dynamics.
//!
//! For each inducer concentration `A_c` (one "condition") the reporter level
//! follows
//!
//! ```text
//! dp/dt = od(t) · profile(t) · h/(1 + h) − γ·p,    h = (A_c / K_A)^n_A
//! ```
//!
//! integrated with explicit Euler. Each outer step of size `Dt` is split into
//! `sim_steps` equal sub-steps; `od` and `profile` are held constant across the
//! sub-steps of an outer step (piecewise-constant forcing). All conditions
//! advance together.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::math::hill_activation;

/// Inputs to [`forward_model`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Hill constant `K_A` (must be > 0).
    pub k_a: f64,
    /// Hill coefficient `n_A`.
    pub n_a: f64,
    /// Outer step size.
    pub dt: f64,
    /// Euler sub-steps per outer step.
    pub sim_steps: usize,
    /// Inducer concentration per condition (must be >= 0).
    pub concentrations: Vec<f64>,
    /// Biomass per outer step, shared by all conditions.
    pub odval: Vec<f64>,
    /// Profile value per outer step, shared by all conditions.
    pub profile: Vec<f64>,
    /// First-order decay rate.
    pub gamma: f64,
    /// Initial reporter level, broadcast to every condition.
    pub p0: f64,
    /// Number of outer steps.
    pub nt: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            k_a: 1.0,
            n_a: 2.0,
            dt: 0.05,
            sim_steps: 10,
            concentrations: vec![0.0],
            odval: vec![1.0; 100],
            profile: vec![1.0; 100],
            gamma: 0.0,
            p0: 0.0,
            nt: 100,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.k_a.is_finite() && self.k_a > 0.0) {
            return Err(AppError::precondition(format!("K_A must be finite and > 0, got {}.", self.k_a)));
        }
        if !self.n_a.is_finite() {
            return Err(AppError::precondition("n_A must be finite."));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(AppError::precondition(format!("Dt must be finite and > 0, got {}.", self.dt)));
        }
        if self.sim_steps == 0 {
            return Err(AppError::precondition("sim_steps must be >= 1."));
        }
        if self.nt == 0 {
            return Err(AppError::precondition("nt must be >= 1."));
        }
        if self.concentrations.is_empty() {
            return Err(AppError::precondition("At least one inducer concentration is required."));
        }
        if self.concentrations.iter().any(|a| !a.is_finite() || *a < 0.0) {
            return Err(AppError::precondition("Inducer concentrations must be finite and >= 0."));
        }
        if self.odval.len() < self.nt || self.profile.len() < self.nt {
            return Err(AppError::precondition(format!(
                "Forcing arrays shorter than nt={}: odval={}, profile={}.",
                self.nt,
                self.odval.len(),
                self.profile.len()
            )));
        }
        if !(self.gamma.is_finite() && self.p0.is_finite()) {
            return Err(AppError::precondition("gamma and p0 must be finite."));
        }
        Ok(())
    }
}

/// Simulated histories, each of shape (conditions × nt).
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectories {
    pub protein: DMatrix<f64>,
    pub concentration: DMatrix<f64>,
    pub time: DMatrix<f64>,
}

impl Trajectories {
    pub fn conditions(&self) -> usize {
        self.protein.nrows()
    }

    pub fn steps(&self) -> usize {
        self.protein.ncols()
    }

    /// Protein levels flattened condition-major, then time-major.
    pub fn ravel(&self) -> DVector<f64> {
        let (rows, cols) = self.protein.shape();
        DVector::from_iterator(
            rows * cols,
            (0..rows).flat_map(|c| (0..cols).map(move |s| self.protein[(c, s)])),
        )
    }
}

/// Integrate the reporter ODE for every condition in `config`.
pub fn forward_model(config: &SimConfig) -> Result<Trajectories, AppError> {
    config.validate()?;

    let n_cond = config.concentrations.len();
    let nt = config.nt;
    let h = config.dt / config.sim_steps as f64;

    // Activation depends only on the condition, not on time.
    let activation: Vec<f64> = config
        .concentrations
        .iter()
        .map(|&a| hill_activation(a, config.k_a, config.n_a))
        .collect();

    let mut protein = DMatrix::<f64>::zeros(n_cond, nt);
    let mut concentration = DMatrix::<f64>::zeros(n_cond, nt);
    let mut time = DMatrix::<f64>::zeros(n_cond, nt);
    let mut p1 = DVector::<f64>::from_element(n_cond, config.p0);

    for step in 0..nt {
        let elapsed = step as f64 * config.dt;
        protein.set_column(step, &p1);
        for c in 0..n_cond {
            concentration[(c, step)] = config.concentrations[c];
            time[(c, step)] = elapsed;
        }

        let od = config.odval[step];
        let prof = config.profile[step];
        for _sub in 0..config.sim_steps {
            for (p, &act) in p1.iter_mut().zip(&activation) {
                *p += (od * prof * act / (1.0 + act) - config.gamma * *p) * h;
            }
        }
    }

    if protein.iter().any(|v| !v.is_finite()) {
        return Err(AppError::numerical(format!(
            "Non-finite protein level in forward model (K_A={}, n_A={}).",
            config.k_a, config.n_a
        )));
    }

    Ok(Trajectories {
        protein,
        concentration,
        time,
    })
}
