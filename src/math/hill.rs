//! Hill response helpers.
//!
//! The activation term used throughout is `h = (A / K)^n` with the saturating
//! fraction `h / (1 + h)`.

/// Hill activation `(conc / k)^n`.
///
/// Callers guarantee `k > 0` and `conc >= 0`; a negative base with a
/// fractional exponent yields NaN.
#[inline]
pub fn hill_activation(conc: f64, k: f64, n: f64) -> f64 {
    (conc / k).powf(n)
}

/// Saturating Hill fraction `h / (1 + h)` for `h = (conc / k)^n`.
#[inline]
pub fn hill_fraction(conc: f64, k: f64, n: f64) -> f64 {
    let h = hill_activation(conc, k, n);
    h / (1.0 + h)
}
