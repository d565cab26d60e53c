//! Receiver circuit models.
//!
//! - `profile`: time-varying expression multiplier
//! - `forward`: explicit-Euler simulation of reporter dynamics
//! - `receiver`: parameter record, inducer coupling and expression rate

pub mod forward;
pub mod profile;
pub mod receiver;

pub use forward::*;
pub use profile::*;
pub use receiver::*;
