//! Linear least squares solver.
//!
//! Each Levenberg–Marquardt iteration needs the step `δ` minimizing
//!
//! ```text
//! ‖ J δ + r ‖² + λ ‖ D δ ‖²
//! ```
//!
//! which we solve as the stacked (tall) system `[J; sqrt(λ) D] δ = [-r; 0]`.
//!
//! Implementation choices:
//! - SVD handles the tall, possibly rank-deficient system without forming
//!   `JᵀJ` (which squares the condition number).
//! - Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices, so we stay with SVD.
//! - Parameter counts are small (2 Hill parameters + a handful of Gaussian
//!   heights), so SVD cost is negligible next to the forward simulations.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Heights and Hill parameters live on very different scales, so the
    // damped system can be nearly singular early on. Loosen gradually.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn damped_augmented_system_shrinks_step() {
        // Same system, stacked with a diagonal damping block.
        let lambda: f64 = 100.0;
        let s = lambda.sqrt();
        let x = DMatrix::from_row_slice(
            5,
            2,
            &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, s, 0.0, 0.0, s],
        );
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0, 0.0, 0.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!(beta[0].abs() < 2.0);
        assert!(beta[1].abs() < 3.0);
    }
}
