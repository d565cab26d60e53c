//! Mathematical utilities: Hill response, Gaussian basis, interpolation and
//! linear least squares.

pub mod gaussian;
pub mod hill;
pub mod interp;
pub mod ols;

pub use gaussian::*;
pub use hill::*;
pub use interp::*;
pub use ols::*;
