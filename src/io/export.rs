//! Export simulated trajectories to CSV.
//!
//! One row per (condition, time step), meant to be easy to consume in
//! spreadsheets or plotting scripts.

use std::path::Path;

use crate::error::AppError;
use crate::models::Trajectories;

/// Write trajectories in long format: `condition,concentration,time,protein`.
pub fn write_trajectories_csv(path: &Path, traj: &Trajectories) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["condition", "concentration", "time", "protein"])
        .map_err(|e| AppError::io(format!("Failed to write export CSV header: {e}")))?;

    for c in 0..traj.conditions() {
        for s in 0..traj.steps() {
            writer
                .write_record([
                    c.to_string(),
                    format!("{}", traj.concentration[(c, s)]),
                    format!("{:.10}", traj.time[(c, s)]),
                    format!("{:.10}", traj.protein[(c, s)]),
                ])
                .map_err(|e| AppError::io(format!("Failed to write export CSV row: {e}")))?;
        }
    }

    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}
