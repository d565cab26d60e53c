//! Time-varying expression profile.
//!
//! The profile is a multiplier on the expression rate representing
//! growth-phase-dependent transcriptional capacity. It is a named strategy so
//! the default (`Constant`) is selectable from configuration rather than
//! hidden in a closure.

use std::fmt;
use std::sync::Arc;

use crate::error::AppError;
use crate::math::{interp_linear, is_strictly_increasing};

/// A user-supplied profile function.
pub type ProfileFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// A validated interpolation grid; only built through [`Profile::interpolated`].
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolant {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl Interpolant {
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[derive(Clone, Default)]
pub enum Profile {
    /// Returns 1 for every time point.
    #[default]
    Constant,
    /// Piecewise-linear interpolant with linear extrapolation.
    Interpolated(Interpolant),
    /// Arbitrary function of time.
    Custom(ProfileFn),
}

impl Profile {
    /// Build an interpolated profile, validating the grid.
    pub fn interpolated(times: Vec<f64>, values: Vec<f64>) -> Result<Self, AppError> {
        if times.len() != values.len() {
            return Err(AppError::precondition(format!(
                "Profile grid length mismatch: {} times vs {} values.",
                times.len(),
                values.len()
            )));
        }
        if times.len() < 2 {
            return Err(AppError::precondition("Interpolated profile needs at least 2 points."));
        }
        if !is_strictly_increasing(&times) {
            return Err(AppError::precondition(
                "Profile times must be finite and strictly increasing.",
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AppError::numerical("Profile values must be finite."));
        }
        Ok(Profile::Interpolated(Interpolant { times, values }))
    }

    pub fn custom(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Profile::Custom(Arc::new(f))
    }

    pub fn eval(&self, t: f64) -> f64 {
        match self {
            Profile::Constant => 1.0,
            Profile::Interpolated(grid) => interp_linear(&grid.times, &grid.values, t),
            Profile::Custom(f) => f(t),
        }
    }

    /// Evaluate at each time point, e.g. to feed the forward simulator.
    pub fn sample(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.eval(t)).collect()
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Profile::Constant => "constant",
            Profile::Interpolated(_) => "interpolated",
            Profile::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Constant => f.write_str("Constant"),
            Profile::Interpolated(grid) => f
                .debug_struct("Interpolated")
                .field("points", &grid.times.len())
                .field("t_min", &grid.times.first())
                .field("t_max", &grid.times.last())
                .field("peak", &grid.values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
                .finish(),
            Profile::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_constant_one() {
        let p = Profile::default();
        assert_eq!(p.eval(-5.0), 1.0);
        assert_eq!(p.eval(1e6), 1.0);
        assert_eq!(p.kind_name(), "constant");
    }

    #[test]
    fn interpolated_extrapolates() {
        let p = Profile::interpolated(vec![0.0, 1.0], vec![0.0, 0.5]).unwrap();
        assert!((p.eval(2.0) - 1.0).abs() < 1e-12);
        assert!((p.eval(-1.0) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn interpolated_rejects_bad_grid() {
        assert!(Profile::interpolated(vec![0.0], vec![1.0]).is_err());
        assert!(Profile::interpolated(vec![1.0, 0.0], vec![1.0, 1.0]).is_err());
        assert!(Profile::interpolated(vec![0.0, 1.0], vec![1.0]).is_err());
    }

    #[test]
    fn interpolated_exposes_its_grid() {
        let p = Profile::interpolated(vec![0.0, 1.0, 2.0], vec![0.5, 1.0, 0.25]).unwrap();
        let Profile::Interpolated(grid) = &p else {
            panic!("expected interpolated profile");
        };
        assert_eq!(grid.times(), &[0.0, 1.0, 2.0]);
        assert_eq!(grid.values(), &[0.5, 1.0, 0.25]);
    }

    #[test]
    fn custom_profile_is_called() {
        let p = Profile::custom(|t| 2.0 * t);
        assert_eq!(p.sample(&[1.0, 2.0]), vec![2.0, 4.0]);
    }
}
