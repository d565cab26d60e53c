//! CSV-backed measurement source.
//!
//! The table is the long format exported by plate-reader pipelines after
//! background correction, one row per (sample, signal, time):
//!
//! ```text
//! sample,vector,media,strain,signal,concentration,time,measurement
//! ```
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior**: rows keep file order; aggregation sorts later

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{AnalysisQuery, Correction, MeasurementRow};
use crate::error::AppError;
use crate::data::MeasurementSource;

const REQUIRED_COLUMNS: [&str; 8] = [
    "sample",
    "vector",
    "media",
    "strain",
    "signal",
    "concentration",
    "time",
    "measurement",
];

/// One row of the long-format table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub sample: String,
    pub vector: String,
    pub media: String,
    pub strain: String,
    pub signal: String,
    pub concentration: f64,
    pub time: f64,
    pub measurement: f64,
}

impl TableRecord {
    fn matches(&self, query: &AnalysisQuery) -> bool {
        self.vector == query.vector
            && self.media == query.media
            && self.strain == query.strain
            && self.signal == query.signal
    }

    fn to_row(&self) -> MeasurementRow {
        MeasurementRow {
            sample: self.sample.clone(),
            concentration: self.concentration,
            time: self.time,
            measurement: self.measurement,
        }
    }
}

/// A row-level error encountered while loading.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Background-corrected measurements loaded from a CSV file.
#[derive(Debug, Clone)]
pub struct CsvSource {
    records: Vec<TableRecord>,
    row_errors: Vec<RowError>,
}

impl CsvSource {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::io(format!("Failed to open CSV '{}': {e}", path.display())))?;

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| AppError::io(format!("Failed to read CSV headers: {e}")))?
            .clone();
        let header_map = build_header_map(&headers);
        for col in REQUIRED_COLUMNS {
            if !header_map.contains_key(col) {
                return Err(AppError::precondition(format!("Missing required column: `{col}`")));
            }
        }

        let mut records = Vec::new();
        let mut row_errors = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            // records() starts after the header; lines are 1-based.
            let line = idx + 2;
            let parsed = result
                .map_err(|e| format!("CSV parse error: {e}"))
                .and_then(|record| parse_record(&record, &header_map));
            match parsed {
                Ok(r) => records.push(r),
                Err(message) => row_errors.push(RowError { line, message }),
            }
        }

        if !row_errors.is_empty() {
            warn!(
                skipped = row_errors.len(),
                first_line = row_errors[0].line,
                first_error = %row_errors[0].message,
                "skipped invalid CSV rows"
            );
        }
        if records.is_empty() {
            return Err(AppError::data(format!("No valid rows in '{}'.", path.display())));
        }

        Ok(Self { records, row_errors })
    }

    pub fn from_records(records: Vec<TableRecord>) -> Self {
        Self {
            records,
            row_errors: Vec::new(),
        }
    }

    pub fn records(&self) -> &[TableRecord] {
        &self.records
    }

    pub fn row_errors(&self) -> &[RowError] {
        &self.row_errors
    }
}

impl MeasurementSource for CsvSource {
    fn analysis(&self, query: &AnalysisQuery) -> Result<Vec<MeasurementRow>, AppError> {
        if query.correction != Correction::BackgroundCorrect {
            return Err(AppError::precondition(
                "CSV tables hold background-corrected data only; use --correction background-correct.",
            ));
        }
        let rows: Vec<MeasurementRow> = self
            .records
            .iter()
            .filter(|r| r.matches(query))
            .map(TableRecord::to_row)
            .collect();
        if rows.is_empty() {
            return Err(AppError::data(format!(
                "No rows for vector={} media={} strain={} signal={}.",
                query.vector, query.media, query.strain, query.signal
            )));
        }
        Ok(rows)
    }
}

/// Write records in the long-format schema.
pub fn write_table_csv(path: &Path, records: &[TableRecord]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create CSV '{}': {e}", path.display())))?;
    for r in records {
        writer
            .serialize(r)
            .map_err(|e| AppError::io(format!("Failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush CSV '{}': {e}", path.display())))?;
    Ok(())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_record(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<TableRecord, String> {
    let text = |col: &str| -> Result<String, String> {
        let value = header_map
            .get(col)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
            .to_string();
        if value.is_empty() {
            Err(format!("missing `{col}`"))
        } else {
            Ok(value)
        }
    };
    let number = |col: &str| -> Result<f64, String> {
        let raw = text(col)?;
        let v: f64 = raw.parse().map_err(|_| format!("invalid `{col}`: {raw}"))?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(format!("non-finite `{col}`: {raw}"))
        }
    };

    Ok(TableRecord {
        sample: text("sample")?,
        vector: text("vector")?,
        media: text("media")?,
        strain: text("strain")?,
        signal: text("signal")?,
        concentration: number("concentration")?,
        time: number("time")?,
        measurement: number("measurement")?,
    })
}
