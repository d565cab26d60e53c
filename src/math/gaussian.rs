//! Fixed-width Gaussian basis used to parameterize the expression profile.
//!
//! The basis has `G` Gaussians with means evenly spaced over the observed time
//! range and a shared variance `(t_max - t_min) / G`. Only the heights are free,
//! so the profile is linear in the fitted heights:
//!
//! ```text
//! profile(t) = Σ_g h_g · exp(-(t - μ_g)² / (2σ²)) / sqrt(2πσ²)
//! ```

use std::f64::consts::PI;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianBasis {
    pub means: Vec<f64>,
    pub variances: Vec<f64>,
}

impl GaussianBasis {
    /// Build a basis of `count` Gaussians spanning `times`.
    pub fn over_times(times: &[f64], count: usize) -> Result<Self, AppError> {
        if count == 0 {
            return Err(AppError::precondition("n_gaussians must be >= 1."));
        }
        if times.len() < 2 {
            return Err(AppError::precondition(
                "Gaussian basis needs at least 2 time points.",
            ));
        }
        let (t_min, t_max) = times
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)));
        if !(t_min.is_finite() && t_max.is_finite() && t_max > t_min) {
            return Err(AppError::precondition(format!(
                "Invalid time range for Gaussian basis: min={t_min}, max={t_max}."
            )));
        }

        let variance = (t_max - t_min) / count as f64;
        Ok(Self {
            means: linspace(t_min, t_max, count),
            variances: vec![variance; count],
        })
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Evaluate the weighted mixture at each time point.
    ///
    /// # Panics
    /// Panics in debug builds if `heights.len() != self.len()`.
    pub fn mixture(&self, heights: &[f64], times: &[f64]) -> Vec<f64> {
        debug_assert_eq!(heights.len(), self.len());
        let mut profile = vec![0.0; times.len()];
        for ((&mean, &var), &height) in self.means.iter().zip(&self.variances).zip(heights) {
            let norm = (2.0 * PI * var).sqrt();
            for (out, &t) in profile.iter_mut().zip(times) {
                let d = t - mean;
                *out += height * (-d * d / var / 2.0).exp() / norm;
            }
        }
        profile
    }
}

/// `steps` evenly spaced points from `min` to `max` inclusive.
///
/// A single step yields `[min]`.
pub fn linspace(min: f64, max: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (steps as f64 - 1.0);
            (0..steps)
                .map(|i| if i + 1 == steps { max } else { min + step * i as f64 })
                .collect()
        }
    }
}
