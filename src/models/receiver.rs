//! Receiver state: biological parameters plus the coupled inducer source.

use crate::error::AppError;
use crate::fit::{Calibration, SolverReport};
use crate::math::hill_activation;
use crate::models::Profile;

/// Anything exposing a current inducer concentration.
pub trait InducerSource {
    fn concentration(&self) -> f64;
}

/// An inducer held at a fixed concentration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedInducer(pub f64);

impl InducerSource for FixedInducer {
    fn concentration(&self) -> f64 {
        self.0
    }
}

impl<T: InducerSource + ?Sized> InducerSource for &T {
    fn concentration(&self) -> f64 {
        (**self).concentration()
    }
}

/// Immutable parameter record of a receiver.
#[derive(Debug, Clone)]
pub struct ReceiverParams {
    /// Baseline rate.
    pub a: f64,
    /// Induced rate amplitude.
    pub b: f64,
    /// Hill constant.
    pub k: f64,
    /// Hill coefficient.
    pub n: f64,
    pub profile: Profile,
}

impl ReceiverParams {
    pub fn new(a: f64, b: f64, k: f64, n: f64, profile: Profile) -> Result<Self, AppError> {
        if !(k.is_finite() && k > 0.0) {
            return Err(AppError::precondition(format!("K must be finite and > 0, got {k}.")));
        }
        if !(a.is_finite() && b.is_finite() && n.is_finite()) {
            return Err(AppError::precondition("a, b and n must be finite."));
        }
        Ok(Self { a, b, k, n, profile })
    }
}

/// One expression unit driven by an inducer `I`, feeding an opaque output `O`.
#[derive(Debug)]
pub struct Receiver<I, O = ()> {
    params: ReceiverParams,
    inducer: I,
    output: O,
    last_fit: Option<SolverReport>,
}

impl<I: InducerSource, O> Receiver<I, O> {
    pub fn new(inducer: I, output: O, params: ReceiverParams) -> Self {
        Self {
            params,
            inducer,
            output,
            last_fit: None,
        }
    }

    pub fn params(&self) -> &ReceiverParams {
        &self.params
    }

    pub fn inducer(&self) -> &I {
        &self.inducer
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Solver diagnostics from the last applied calibration.
    pub fn last_fit(&self) -> Option<&SolverReport> {
        self.last_fit.as_ref()
    }

    /// Instantaneous expression rate at time `t`.
    ///
    /// `_dt` is part of the operator interface shared with other circuit
    /// elements and is not used by the Hill rate.
    pub fn expression_rate(&self, t: f64, _dt: f64) -> f64 {
        let p = &self.params;
        let i = hill_activation(self.inducer.concentration(), p.k, p.n);
        p.profile.eval(t) * (p.a + p.b * i) / (1.0 + i)
    }

    /// Replace all parameters with a calibration result in one step.
    pub fn apply_calibration(&mut self, calibration: Calibration) {
        let Calibration { params, report } = calibration;
        self.params = params;
        self.last_fit = Some(report);
    }
}
