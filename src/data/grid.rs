//! Aggregation of measurement rows into a regular experiment grid.
//!
//! Calibration works on one mean series per (concentration, time) cell:
//!
//! - rows are sorted by (sample, concentration, time) so replicate sums are
//!   accumulated in a fixed order
//! - distinct concentrations define the conditions, distinct times the grid
//! - `dt` is the mean spacing of the time grid
//! - biomass is averaged per time point across all samples

use std::cmp::Ordering;

use tracing::debug;

use crate::data::MeasurementSource;
use crate::domain::{AnalysisQuery, MeasurementRow};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentGrid {
    /// Distinct inducer concentrations, ascending.
    pub concentrations: Vec<f64>,
    /// Distinct time points, ascending.
    pub times: Vec<f64>,
    /// Mean spacing of `times`.
    pub dt: f64,
    /// Mean expression per cell, condition-major then time-major.
    pub expression: Vec<f64>,
    /// Mean biomass per time point.
    pub biomass: Vec<f64>,
}

impl ExperimentGrid {
    /// Query the expression and biomass signals of one experiment and aggregate them.
    pub fn fetch<S: MeasurementSource>(source: &S, query: &AnalysisQuery) -> Result<Self, AppError> {
        let expression = source.analysis(query)?;
        let biomass = source.analysis(&query.biomass())?;
        Self::from_rows(&expression, &biomass)
    }

    pub fn from_rows(expression: &[MeasurementRow], biomass: &[MeasurementRow]) -> Result<Self, AppError> {
        if expression.is_empty() {
            return Err(AppError::data("No expression measurements."));
        }
        if let Some(bad) = expression.iter().chain(biomass).find(|r| !row_is_finite(r)) {
            return Err(AppError::data(format!(
                "Non-finite value in sample `{}` at time {}.",
                bad.sample, bad.time
            )));
        }

        let rows = sorted(expression);
        let concentrations = distinct(rows.iter().map(|r| r.concentration));
        let times = distinct(rows.iter().map(|r| r.time));

        if times.len() < 2 {
            return Err(AppError::precondition(format!(
                "At least 2 distinct time points are required, found {}.",
                times.len()
            )));
        }
        let dt = times.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (times.len() - 1) as f64;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(AppError::precondition(format!("Mean time step must be > 0, got {dt}.")));
        }

        let nt = times.len();
        let mut sums = vec![0.0; concentrations.len() * nt];
        let mut counts = vec![0usize; concentrations.len() * nt];
        for r in &rows {
            let c = index_of(&concentrations, r.concentration);
            let s = index_of(&times, r.time);
            sums[c * nt + s] += r.measurement;
            counts[c * nt + s] += 1;
        }
        if let Some(cell) = counts.iter().position(|&n| n == 0) {
            return Err(AppError::data(format!(
                "No expression data for concentration {} at time {}.",
                concentrations[cell / nt],
                times[cell % nt]
            )));
        }
        let expression: Vec<f64> = sums.iter().zip(&counts).map(|(s, &n)| s / n as f64).collect();

        let mut od_sums = vec![0.0; nt];
        let mut od_counts = vec![0usize; nt];
        let mut ignored = 0usize;
        for r in sorted(biomass) {
            match times.binary_search_by(|t| t.total_cmp(&r.time)) {
                Ok(s) => {
                    od_sums[s] += r.measurement;
                    od_counts[s] += 1;
                }
                Err(_) => ignored += 1,
            }
        }
        if ignored > 0 {
            debug!(ignored, "biomass rows outside the expression time grid");
        }
        if let Some(s) = od_counts.iter().position(|&n| n == 0) {
            return Err(AppError::data(format!("No biomass data at time {}.", times[s])));
        }
        let biomass: Vec<f64> = od_sums.iter().zip(&od_counts).map(|(s, &n)| s / n as f64).collect();

        Ok(Self {
            concentrations,
            times,
            dt,
            expression,
            biomass,
        })
    }

    pub fn conditions(&self) -> usize {
        self.concentrations.len()
    }

    pub fn steps(&self) -> usize {
        self.times.len()
    }

    /// Mean expression series of one condition.
    pub fn series(&self, condition: usize) -> &[f64] {
        let nt = self.steps();
        &self.expression[condition * nt..(condition + 1) * nt]
    }
}

fn row_is_finite(r: &MeasurementRow) -> bool {
    r.concentration.is_finite() && r.time.is_finite() && r.measurement.is_finite()
}

fn sorted(rows: &[MeasurementRow]) -> Vec<&MeasurementRow> {
    let mut out: Vec<&MeasurementRow> = rows.iter().collect();
    out.sort_by(|a, b| {
        a.sample
            .cmp(&b.sample)
            .then_with(|| a.concentration.total_cmp(&b.concentration))
            .then_with(|| a.time.total_cmp(&b.time))
    });
    out
}

fn distinct(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.collect();
    v.sort_by(f64::total_cmp);
    v.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
    v
}

/// Position of `value` in a sorted list known to contain it.
fn index_of(sorted: &[f64], value: f64) -> usize {
    sorted.partition_point(|v| v.total_cmp(&value) == Ordering::Less)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sample: &str, conc: f64, time: f64, value: f64) -> MeasurementRow {
        MeasurementRow {
            sample: sample.into(),
            concentration: conc,
            time,
            measurement: value,
        }
    }

    fn replicate_table() -> (Vec<MeasurementRow>, Vec<MeasurementRow>) {
        let mut expr = Vec::new();
        let mut od = Vec::new();
        // Two replicates per concentration, deliberately shuffled.
        for (sample, conc, offset) in [("S4", 5.0, 1.0), ("S1", 0.0, 0.0), ("S3", 5.0, 3.0), ("S2", 0.0, 2.0)] {
            for step in [2usize, 0, 1] {
                let t = step as f64 * 0.5;
                expr.push(row(sample, conc, t, conc + offset + t));
                od.push(row(sample, conc, t, 0.1 * (step as f64 + 1.0)));
            }
        }
        (expr, od)
    }

    #[test]
    fn aggregates_replicates_condition_major() {
        let (expr, od) = replicate_table();
        let grid = ExperimentGrid::from_rows(&expr, &od).unwrap();
        assert_eq!(grid.concentrations, vec![0.0, 5.0]);
        assert_eq!(grid.times, vec![0.0, 0.5, 1.0]);
        assert!((grid.dt - 0.5).abs() < 1e-15);
        // conc 0: offsets 0 and 2 → mean 1; conc 5: offsets 1 and 3 → mean 2.
        assert_eq!(grid.series(0), &[1.0, 1.5, 2.0]);
        assert_eq!(grid.series(1), &[7.0, 7.5, 8.0]);
        assert_eq!(grid.biomass.len(), 3);
        assert!((grid.biomass[2] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn fetch_reads_both_signals() {
        use crate::data::MemorySource;
        use crate::domain::Correction;

        let (expr, od) = replicate_table();
        let source = MemorySource::new().with_signal("GFP", expr.clone()).with_signal("OD", od.clone());
        let query = AnalysisQuery {
            vector: "v".into(),
            media: "m".into(),
            strain: "s".into(),
            signal: "GFP".into(),
            biomass_signal: "OD".into(),
            correction: Correction::BackgroundCorrect,
        };
        let fetched = ExperimentGrid::fetch(&source, &query).unwrap();
        assert_eq!(fetched, ExperimentGrid::from_rows(&expr, &od).unwrap());

        let missing = AnalysisQuery {
            biomass_signal: "absent".into(),
            ..query
        };
        assert!(matches!(ExperimentGrid::fetch(&source, &missing), Err(AppError::Data(_))));
    }

    #[test]
    fn single_time_point_rejected() {
        let expr = vec![row("S1", 1.0, 0.0, 1.0)];
        let od = vec![row("S1", 1.0, 0.0, 0.1)];
        assert!(matches!(
            ExperimentGrid::from_rows(&expr, &od),
            Err(AppError::Precondition(_))
        ));
    }

    #[test]
    fn empty_expression_rejected() {
        assert!(ExperimentGrid::from_rows(&[], &[]).is_err());
    }

    #[test]
    fn missing_cell_rejected() {
        let (mut expr, od) = replicate_table();
        expr.retain(|r| !(r.concentration == 5.0 && r.time == 1.0));
        assert!(matches!(ExperimentGrid::from_rows(&expr, &od), Err(AppError::Data(_))));
    }

    #[test]
    fn missing_biomass_rejected() {
        let (expr, mut od) = replicate_table();
        od.retain(|r| r.time != 0.5);
        assert!(matches!(ExperimentGrid::from_rows(&expr, &od), Err(AppError::Data(_))));
    }

    #[test]
    fn non_finite_rejected() {
        let (mut expr, od) = replicate_table();
        expr[0].measurement = f64::NAN;
        assert!(matches!(ExperimentGrid::from_rows(&expr, &od), Err(AppError::Data(_))));
    }
}
