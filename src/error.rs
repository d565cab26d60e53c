//! Error type shared by the library and the `rcv` binary.
//!
//! Every variant maps to a process exit code:
//! - `2` input/usage problems (bad arguments, unreadable files)
//! - `3` data problems (empty or inconsistent measurement tables)
//! - `4` computation problems (numerical failure, fit rejected)

use thiserror::Error;

use crate::fit::SolverReport;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Inputs violate a documented precondition (shapes, ranges, degenerate grids).
    #[error("invalid input: {0}")]
    Precondition(String),

    /// Measurement data could not be turned into a usable experiment grid.
    #[error("data error: {0}")]
    Data(String),

    /// A computation produced non-finite values.
    #[error("numerical failure: {0}")]
    Numerical(String),

    /// The initial guess lies outside the parameter bounds.
    #[error("infeasible initial guess: {0}")]
    Infeasible(String),

    /// The solver stopped without meeting any tolerance.
    #[error("fit did not converge ({}): {}", report.status, report.message)]
    NotConverged { report: Box<SolverReport> },

    /// File or stream failure with context.
    #[error("{0}")]
    Io(String),
}

impl AppError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical(message.into())
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Precondition(_) | AppError::Io(_) => 2,
            AppError::Data(_) => 3,
            AppError::Numerical(_) | AppError::Infeasible(_) | AppError::NotConverged { .. } => 4,
        }
    }
}
