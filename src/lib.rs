//! `receiver-circuit` library crate.
//!
//! Simulates and calibrates a Hill-type receiver gene circuit: reporter
//! expression driven by an inducer through a Hill response and modulated by
//! a time-varying expression profile.
//!
//! The binary (`rcv`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the simulator and calibrator are reusable from other circuit code

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod report;
