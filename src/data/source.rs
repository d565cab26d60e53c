//! Narrow query interface to the measurement data service.
//!
//! Calibration only needs "rows for this experiment and signal". Grouping,
//! background correction and replicate bookkeeping happen on the other side of
//! this trait, which keeps the numerical code testable with in-memory tables.

use std::collections::HashMap;

use crate::domain::{AnalysisQuery, MeasurementRow};
use crate::error::AppError;

pub trait MeasurementSource {
    /// Rows matching `query` for `query.signal`.
    fn analysis(&self, query: &AnalysisQuery) -> Result<Vec<MeasurementRow>, AppError>;
}

impl<T: MeasurementSource + ?Sized> MeasurementSource for &T {
    fn analysis(&self, query: &AnalysisQuery) -> Result<Vec<MeasurementRow>, AppError> {
        (**self).analysis(query)
    }
}

/// In-memory rows keyed by signal name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    signals: HashMap<String, Vec<MeasurementRow>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, signal: impl Into<String>, rows: Vec<MeasurementRow>) {
        self.signals.entry(signal.into()).or_default().extend(rows);
    }

    pub fn with_signal(mut self, signal: impl Into<String>, rows: Vec<MeasurementRow>) -> Self {
        self.insert(signal, rows);
        self
    }
}

impl MeasurementSource for MemorySource {
    fn analysis(&self, query: &AnalysisQuery) -> Result<Vec<MeasurementRow>, AppError> {
        self.signals
            .get(&query.signal)
            .cloned()
            .ok_or_else(|| AppError::data(format!("No measurements for signal `{}`.", query.signal)))
    }
}
