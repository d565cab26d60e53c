//! Shared calibration workflow used by the CLI.
//!
//! fetch -> aggregate -> calibrate -> portable record
//!
//! Keeping this in one place lets front-ends focus on presentation.

use crate::data::{ExperimentGrid, MeasurementSource};
use crate::domain::{AnalysisQuery, CalibrationFile};
use crate::error::AppError;
use crate::fit::{Calibration, CalibrationOptions, calibrate};
use crate::io::calibration_file;

/// All computed outputs of a single `rcv calibrate` run.
#[derive(Debug, Clone)]
pub struct CalibrationRun {
    pub grid: ExperimentGrid,
    pub calibration: Calibration,
    pub record: CalibrationFile,
}

/// Execute the full calibration pipeline against `source`.
pub fn run_calibration<S: MeasurementSource>(
    source: &S,
    query: &AnalysisQuery,
    opts: &CalibrationOptions,
) -> Result<CalibrationRun, AppError> {
    let grid = ExperimentGrid::fetch(source, query)?;

    let calibration = calibrate(&grid, opts)?;
    let record = calibration_file(&calibration, Some(query), opts);

    Ok(CalibrationRun {
        grid,
        calibration,
        record,
    })
}
