//! Terminal summaries.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use std::fmt::Write;

use crate::data::ExperimentGrid;
use crate::domain::CalibrationFile;
use crate::models::Trajectories;

/// Summarize a simulation: final level per condition.
pub fn format_simulation_summary(traj: &Trajectories) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== rcv - forward simulation ===");
    let t_end = if traj.steps() > 0 { traj.time[(0, traj.steps() - 1)] } else { 0.0 };
    let _ = writeln!(out, "Conditions: {} | steps: {} | t_end: {t_end:.3}", traj.conditions(), traj.steps());
    let _ = writeln!(out, "{:>12}  {:>14}", "inducer", "final protein");
    if traj.steps() == 0 {
        return out;
    }
    let last = traj.steps() - 1;
    for c in 0..traj.conditions() {
        let _ = writeln!(
            out,
            "{:>12.4}  {:>14.6}",
            traj.concentration[(c, last)],
            traj.protein[(c, last)]
        );
    }
    out
}

/// Summarize a calibration: data shape, fitted parameters and solver outcome.
pub fn format_calibration_summary(record: &CalibrationFile, grid: Option<&ExperimentGrid>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== rcv - receiver calibration ===");
    if let Some(q) = &record.query {
        let _ = writeln!(
            out,
            "Query: vector={} media={} strain={} signal={} biomass={}",
            q.vector, q.media, q.strain, q.signal, q.biomass_signal
        );
    }
    if let Some(g) = grid {
        let _ = writeln!(
            out,
            "Data: {} conditions × {} time points | dt={:.4} | inducer=[{:.3}, {:.3}]",
            g.conditions(),
            g.steps(),
            g.dt,
            g.concentrations.first().copied().unwrap_or(f64::NAN),
            g.concentrations.last().copied().unwrap_or(f64::NAN),
        );
    }
    let _ = writeln!(out, "Basis: {} Gaussians | epsilon={:.3e}", record.n_gaussians, record.epsilon);

    let p = &record.params;
    let _ = writeln!(out, "\nParameters:");
    let _ = writeln!(out, "  K = {:.6}", p.k);
    let _ = writeln!(out, "  n = {:.6}", p.n);
    let _ = writeln!(out, "  b = {:.6}  (profile peak)", p.b);
    let _ = writeln!(out, "  a = {:.6}", p.a);

    if let Some((t_peak, _)) = record
        .profile
        .times
        .iter()
        .zip(&record.profile.values)
        .fold(None, |best: Option<(f64, f64)>, (&t, &v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((t, v)),
        })
    {
        let _ = writeln!(out, "  profile peak at t = {t_peak:.4}");
    }

    let s = &record.solver;
    let _ = writeln!(out, "\nSolver:");
    let _ = writeln!(out, "  status: {} ({})", s.status, s.message);
    let _ = writeln!(
        out,
        "  cost={:.6e} | optimality={:.3e} | nfev={} | njev={} | iterations={}",
        s.cost, s.optimality, s.nfev, s.njev, s.iterations
    );
    out
}
