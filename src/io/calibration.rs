//! Read/write calibration JSON files.
//!
//! Calibration JSON is the portable record of a fit:
//! - fitted `a`, `b`, `K`, `n`
//! - the normalized profile on its time grid
//! - solver diagnostics and the query that selected the data
//!
//! The schema is defined by `domain::CalibrationFile`.

use std::fs::File;
use std::path::Path;

use chrono::Local;

use crate::domain::{AnalysisQuery, CalibrationFile};
use crate::error::AppError;
use crate::fit::{Calibration, CalibrationOptions};
use crate::models::{Profile, ReceiverParams};

/// Assemble the portable record for a calibration.
pub fn calibration_file(
    calibration: &Calibration,
    query: Option<&AnalysisQuery>,
    opts: &CalibrationOptions,
) -> CalibrationFile {
    CalibrationFile {
        tool: "rcv".to_string(),
        generated: Local::now(),
        query: query.cloned(),
        n_gaussians: opts.n_gaussians,
        epsilon: opts.epsilon,
        params: calibration.fitted(),
        profile: calibration.profile_grid(),
        solver: calibration.report.clone(),
    }
}

/// Write a calibration JSON file.
pub fn write_calibration_json(path: &Path, file: &CalibrationFile) -> Result<(), AppError> {
    let out = File::create(path).map_err(|e| {
        AppError::io(format!("Failed to create calibration JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(out, file)
        .map_err(|e| AppError::io(format!("Failed to write calibration JSON: {e}")))?;
    Ok(())
}

/// Read a calibration JSON file.
pub fn read_calibration_json(path: &Path) -> Result<CalibrationFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::io(format!("Failed to open calibration JSON '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file).map_err(|e| AppError::io(format!("Invalid calibration JSON: {e}")))
}

/// Rebuild receiver parameters from a saved calibration.
pub fn params_from_file(file: &CalibrationFile) -> Result<ReceiverParams, AppError> {
    let profile = Profile::interpolated(file.profile.times.clone(), file.profile.values.clone())?;
    let p = file.params;
    ReceiverParams::new(p.a, p.b, p.k, p.n, profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Correction;
    use crate::fit::{SolverReport, SolverStatus};

    fn calibration() -> Calibration {
        let profile = Profile::interpolated(vec![0.0, 1.0, 2.0], vec![0.5, 1.0, 0.25]).unwrap();
        Calibration {
            params: ReceiverParams::new(0.0, 12.5, 2.0, 1.5, profile).unwrap(),
            report: SolverReport {
                x: vec![2.0, 1.5, 3.0],
                cost: 1e-4,
                fun: vec![0.01, -0.01],
                optimality: 1e-9,
                nfev: 12,
                njev: 8,
                iterations: 7,
                status: SolverStatus::FtolReached,
                message: "relative cost reduction below ftol".into(),
            },
        }
    }

    #[test]
    fn calibration_json_reloads_into_params() {
        let query = AnalysisQuery {
            vector: "pRec".into(),
            media: "M9".into(),
            strain: "MG1655".into(),
            signal: "GFP".into(),
            biomass_signal: "OD".into(),
            correction: Correction::BackgroundCorrect,
        };
        let record = calibration_file(&calibration(), Some(&query), &CalibrationOptions::default());
        let path = std::env::temp_dir().join(format!("rcv_{}_cal.json", std::process::id()));
        write_calibration_json(&path, &record).unwrap();

        let loaded = read_calibration_json(&path).unwrap();
        assert_eq!(loaded.query, Some(query));
        assert_eq!(loaded.solver.status, SolverStatus::FtolReached);

        let params = params_from_file(&loaded).unwrap();
        assert_eq!(params.b, 12.5);
        assert_eq!(params.profile.eval(1.0), 1.0);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_calibration_json(Path::new("/nonexistent/rcv.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
