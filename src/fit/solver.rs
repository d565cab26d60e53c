//! Bounded nonlinear least squares.
//!
//! Minimizes `½‖r(x)‖²` subject to `lower ≤ x ≤ upper` with a projected
//! Levenberg–Marquardt iteration:
//!
//! - the Jacobian is approximated by forward differences, one column per
//!   parameter, evaluated in parallel (each column is independent, so the
//!   result does not depend on scheduling)
//! - the damped step solves `[J; sqrt(λ)·D] δ = [-r; 0]` with
//!   `D = sqrt(diag(JᵀJ))` (Marquardt scaling)
//! - trial points are projected strictly inside the box
//! - `λ` is adapted from the ratio of actual to predicted reduction
//!
//! Termination mirrors the usual gtol / ftol / xtol criteria plus an
//! evaluation budget. Reaching the budget or exhausting the damping is
//! reported in the status, not as an error; callers decide what to accept.

use std::cmp::Ordering;
use std::fmt;

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::AppError;
use crate::math::solve_least_squares;

/// Relative distance kept from active bounds.
const STRICT_STEP: f64 = 1e-10;
/// Damping beyond which the iteration is considered stalled.
const LAMBDA_MAX: f64 = 1e20;
/// Minimum gain ratio for accepting a step.
const ACCEPT_RATIO: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Relative step-size tolerance.
    pub xtol: f64,
    /// Projected-gradient (infinity norm) tolerance.
    pub gtol: f64,
    /// Residual evaluation budget; `None` means `100 · len(x)`.
    pub max_nfev: Option<usize>,
    /// Initial damping relative to `max(diag(JᵀJ))`.
    pub initial_damping: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            max_nfev: None,
            initial_damping: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    GtolReached,
    FtolReached,
    XtolReached,
    MaxEvaluations,
    Stalled,
}

impl SolverStatus {
    pub fn converged(self) -> bool {
        matches!(
            self,
            SolverStatus::GtolReached | SolverStatus::FtolReached | SolverStatus::XtolReached
        )
    }

    fn message(self) -> &'static str {
        match self {
            SolverStatus::GtolReached => "projected gradient below gtol",
            SolverStatus::FtolReached => "relative cost reduction below ftol",
            SolverStatus::XtolReached => "relative step size below xtol",
            SolverStatus::MaxEvaluations => "residual evaluation budget exhausted",
            SolverStatus::Stalled => "damping grew without finding a decreasing step",
        }
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolverStatus::GtolReached => "gtol",
            SolverStatus::FtolReached => "ftol",
            SolverStatus::XtolReached => "xtol",
            SolverStatus::MaxEvaluations => "max_nfev",
            SolverStatus::Stalled => "stalled",
        };
        f.write_str(s)
    }
}

/// Outcome of a solve, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverReport {
    pub x: Vec<f64>,
    /// `½‖r(x)‖²` at `x`.
    pub cost: f64,
    /// Residuals at `x`.
    pub fun: Vec<f64>,
    /// Infinity norm of the projected gradient at `x`.
    pub optimality: f64,
    pub nfev: usize,
    pub njev: usize,
    pub iterations: usize,
    pub status: SolverStatus,
    pub message: String,
}

impl SolverReport {
    pub fn converged(&self) -> bool {
        self.status.converged()
    }
}

/// Solve the bounded least squares problem for residual function `f`.
///
/// Errors are returned for malformed inputs (`Precondition`), an initial
/// guess outside the bounds (`Infeasible`), and failures evaluating `f` at the
/// starting point or while differencing the Jacobian. A trial point where `f`
/// reports a numerical failure is treated as a rejected step.
pub fn least_squares<F>(
    f: F,
    x0: &[f64],
    lower: &[f64],
    upper: &[f64],
    opts: &SolverOptions,
) -> Result<SolverReport, AppError>
where
    F: Fn(&[f64]) -> Result<DVector<f64>, AppError> + Sync,
{
    let n = x0.len();
    if n == 0 {
        return Err(AppError::precondition("Parameter vector is empty."));
    }
    if lower.len() != n || upper.len() != n {
        return Err(AppError::precondition(format!(
            "Bounds length mismatch: x0={n}, lower={}, upper={}.",
            lower.len(),
            upper.len()
        )));
    }
    if lower.iter().zip(upper).any(|(lo, hi)| lo.partial_cmp(hi) != Some(Ordering::Less)) {
        return Err(AppError::precondition("Each lower bound must be strictly below its upper bound."));
    }
    if let Some(j) = (0..n).find(|&j| !(lower[j]..=upper[j]).contains(&x0[j])) {
        return Err(AppError::Infeasible(format!(
            "x0[{j}]={} outside [{}, {}].",
            x0[j], lower[j], upper[j]
        )));
    }

    let max_nfev = opts.max_nfev.unwrap_or(100 * n).max(1);

    let mut x = strictly_feasible(&DVector::from_column_slice(x0), lower, upper);
    let mut r = f(x.as_slice())?;
    ensure_finite(&r, "initial residuals")?;
    let mut nfev = 1usize;
    let mut cost = 0.5 * r.norm_squared();

    let mut jac = jacobian(&f, &x, &r, upper)?;
    let mut njev = 1usize;
    let mut iterations = 0usize;

    let mut lambda: Option<f64> = None;
    let mut nu = 2.0;

    let status = 'outer: loop {
        let g = jac.tr_mul(&r);
        if projected_gradient_norm(&x, &g, lower, upper) < opts.gtol {
            break SolverStatus::GtolReached;
        }

        let col_norms: Vec<f64> = jac.column_iter().map(|c| c.norm_squared()).collect();
        let max_diag = col_norms.iter().copied().fold(0.0, f64::max);
        let floor = (max_diag * 1e-12).max(f64::MIN_POSITIVE);
        let scale: Vec<f64> = col_norms.iter().map(|d| d.max(floor).sqrt()).collect();
        let mut lam = *lambda.get_or_insert(opts.initial_damping * max_diag.max(1e-12));

        loop {
            if nfev >= max_nfev {
                break 'outer SolverStatus::MaxEvaluations;
            }
            if lam > LAMBDA_MAX {
                break 'outer SolverStatus::Stalled;
            }

            let Some(delta) = damped_step(&jac, &r, &scale, lam) else {
                lam *= nu;
                nu *= 2.0;
                continue;
            };
            let x_new = strictly_feasible(&(&x + &delta), lower, upper);
            let step = &x_new - &x;
            let step_norm = step.norm();

            // Predicted decrease of the local quadratic model along the projected step.
            let js = &jac * &step;
            let predicted = -(g.dot(&step) + 0.5 * js.norm_squared());

            nfev += 1;
            let trial = match f(x_new.as_slice()) {
                Ok(v) if v.iter().all(|e| e.is_finite()) => Some(v),
                Ok(_) | Err(AppError::Numerical(_)) => None,
                Err(e) => return Err(e),
            };

            let (cost_new, ratio) = match &trial {
                Some(v) => {
                    let c = 0.5 * v.norm_squared();
                    let ratio = if predicted > 0.0 { (cost - c) / predicted } else { -1.0 };
                    (c, ratio)
                }
                None => (f64::INFINITY, -1.0),
            };
            let actual = cost - cost_new;
            trace!(lambda = lam, cost, cost_new, ratio, "trial step");

            let ftol_hit = actual.is_finite() && actual.abs() < opts.ftol * cost && ratio > 0.25;
            let xtol_hit = step_norm < opts.xtol * (opts.xtol + x.norm());

            if ratio > ACCEPT_RATIO {
                if let Some(v) = trial {
                    x = x_new;
                    r = v;
                    cost = cost_new;
                    iterations += 1;
                    lam *= (1.0_f64 / 3.0).max(1.0 - (2.0 * ratio - 1.0).powi(3));
                    nu = 2.0;
                    lambda = Some(lam);
                    debug!(iteration = iterations, cost, lambda = lam, "accepted step");

                    if ftol_hit {
                        break 'outer SolverStatus::FtolReached;
                    }
                    if xtol_hit {
                        break 'outer SolverStatus::XtolReached;
                    }
                    jac = jacobian(&f, &x, &r, upper)?;
                    njev += 1;
                    continue 'outer;
                }
            }

            if xtol_hit {
                break 'outer SolverStatus::XtolReached;
            }
            lam *= nu;
            nu *= 2.0;
            lambda = Some(lam);
        }
    };

    let g = jac.tr_mul(&r);
    let optimality = projected_gradient_norm(&x, &g, lower, upper);
    debug!(%status, nfev, njev, iterations, cost, optimality, "least squares finished");

    Ok(SolverReport {
        x: x.iter().copied().collect(),
        cost,
        fun: r.iter().copied().collect(),
        optimality,
        nfev,
        njev,
        iterations,
        status,
        message: status.message().to_string(),
    })
}

fn ensure_finite(v: &DVector<f64>, what: &str) -> Result<(), AppError> {
    if v.iter().all(|e| e.is_finite()) {
        Ok(())
    } else {
        Err(AppError::numerical(format!("Non-finite {what}.")))
    }
}

/// Solve the Marquardt-damped step as an augmented linear least squares problem.
fn damped_step(jac: &DMatrix<f64>, r: &DVector<f64>, scale: &[f64], lambda: f64) -> Option<DVector<f64>> {
    let (m, n) = jac.shape();
    let mut a = DMatrix::<f64>::zeros(m + n, n);
    a.view_mut((0, 0), (m, n)).copy_from(jac);
    let s = lambda.sqrt();
    for j in 0..n {
        a[(m + j, j)] = s * scale[j];
    }
    let mut rhs = DVector::<f64>::zeros(m + n);
    for i in 0..m {
        rhs[i] = -r[i];
    }
    solve_least_squares(&a, &rhs)
}

/// Forward-difference Jacobian of `f` at `x`, stepping away from the upper bound.
fn jacobian<F>(f: &F, x: &DVector<f64>, r: &DVector<f64>, upper: &[f64]) -> Result<DMatrix<f64>, AppError>
where
    F: Fn(&[f64]) -> Result<DVector<f64>, AppError> + Sync,
{
    let eps = f64::EPSILON.sqrt();
    let columns: Vec<DVector<f64>> = (0..x.len())
        .into_par_iter()
        .map(|j| -> Result<DVector<f64>, AppError> {
            let mut h = eps * x[j].abs().max(1.0);
            if x[j] + h > upper[j] {
                h = -h;
            }
            let mut xp = x.clone();
            xp[j] += h;
            // Use the representable step to keep the quotient consistent.
            let h = xp[j] - x[j];
            let rp = f(xp.as_slice())?;
            ensure_finite(&rp, "residuals while differencing the Jacobian")?;
            Ok((rp - r) / h)
        })
        .collect::<Result<_, AppError>>()?;
    Ok(DMatrix::from_columns(&columns))
}

/// Infinity norm of `x − clamp(x − g)`, zero at a bound-constrained optimum.
fn projected_gradient_norm(x: &DVector<f64>, g: &DVector<f64>, lower: &[f64], upper: &[f64]) -> f64 {
    (0..x.len())
        .map(|j| (x[j] - (x[j] - g[j]).clamp(lower[j], upper[j])).abs())
        .fold(0.0, f64::max)
}

/// Clamp `x` into the box, keeping a small relative distance from each bound.
fn strictly_feasible(x: &DVector<f64>, lower: &[f64], upper: &[f64]) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        (0..x.len()).map(|j| {
            let lo = lower[j] + STRICT_STEP * lower[j].abs().max(1.0);
            let hi = upper[j] - STRICT_STEP * upper[j].abs().max(1.0);
            if lo >= hi {
                0.5 * (lower[j] + upper[j])
            } else {
                x[j].clamp(lo, hi)
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_decay_residuals(x: &[f64]) -> Result<DVector<f64>, AppError> {
        // y = 3·exp(-0.7 t)
        let ts: Vec<f64> = (0..15).map(|i| i as f64 * 0.4).collect();
        Ok(DVector::from_iterator(
            ts.len(),
            ts.iter().map(|&t| 3.0 * (-0.7 * t).exp() - x[0] * (-x[1] * t).exp()),
        ))
    }

    #[test]
    fn fits_exponential_decay() {
        let report = least_squares(
            exp_decay_residuals,
            &[1.0, 0.1],
            &[0.0, 0.0],
            &[10.0, 10.0],
            &SolverOptions::default(),
        )
        .unwrap();
        assert!(report.converged(), "{report:?}");
        assert!((report.x[0] - 3.0).abs() < 1e-6);
        assert!((report.x[1] - 0.7).abs() < 1e-6);
        assert!(report.cost < 1e-12);
    }

    #[test]
    fn respects_active_bound() {
        // Unconstrained optimum at x = -2; the bound keeps it at 0.
        let f = |x: &[f64]| -> Result<DVector<f64>, AppError> { Ok(DVector::from_row_slice(&[x[0] + 2.0])) };
        let report = least_squares(f, &[1.0], &[0.0], &[5.0], &SolverOptions::default()).unwrap();
        assert!(report.converged(), "{report:?}");
        assert!(report.x[0] >= 0.0 && report.x[0] < 1e-6);
    }

    #[test]
    fn infeasible_start_rejected() {
        let f = |x: &[f64]| -> Result<DVector<f64>, AppError> { Ok(DVector::from_row_slice(&[x[0]])) };
        let err = least_squares(f, &[-1.0], &[0.0], &[1.0], &SolverOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::Infeasible(_)));
    }

    #[test]
    fn start_on_bound_is_nudged_inside() {
        let f = |x: &[f64]| -> Result<DVector<f64>, AppError> {
            if x[0] <= 0.0 {
                return Err(AppError::numerical("x must be > 0"));
            }
            Ok(DVector::from_row_slice(&[x[0].ln()]))
        };
        let report = least_squares(f, &[0.0], &[0.0], &[10.0], &SolverOptions::default()).unwrap();
        assert!(report.converged(), "{report:?}");
        assert!((report.x[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let opts = SolverOptions {
            max_nfev: Some(2),
            ..SolverOptions::default()
        };
        let report =
            least_squares(exp_decay_residuals, &[1.0, 0.1], &[0.0, 0.0], &[10.0, 10.0], &opts).unwrap();
        assert_eq!(report.status, SolverStatus::MaxEvaluations);
        assert!(!report.converged());
    }

    #[test]
    fn bounds_length_mismatch_rejected() {
        let f = |x: &[f64]| -> Result<DVector<f64>, AppError> { Ok(DVector::from_row_slice(&[x[0]])) };
        let err = least_squares(f, &[0.5], &[0.0, 0.0], &[1.0], &SolverOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));
    }

    #[test]
    fn unordered_or_nan_bounds_rejected() {
        let f = |x: &[f64]| -> Result<DVector<f64>, AppError> { Ok(DVector::from_row_slice(&[x[0]])) };
        let opts = SolverOptions::default();
        for (lo, hi) in [(1.0, 1.0), (2.0, 1.0), (f64::NAN, 1.0), (0.0, f64::NAN)] {
            let err = least_squares(f, &[0.5], &[lo], &[hi], &opts).unwrap_err();
            assert!(matches!(err, AppError::Precondition(_)), "lo={lo} hi={hi}");
        }
    }

    #[test]
    fn nan_start_is_infeasible() {
        let f = |x: &[f64]| -> Result<DVector<f64>, AppError> { Ok(DVector::from_row_slice(&[x[0]])) };
        let err = least_squares(f, &[f64::NAN], &[0.0], &[1.0], &SolverOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::Infeasible(_)));
    }
}
