//! Heater element with first-order thermal lag and rate limiting.

use crate::error::{SimError, SimResult};

/// Fraction of rated power the element is currently delivering, [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ElementState {
    pub output: f64,
}

/// First-order element lag.
///
/// Dynamics: dout/dt = (1/tau) * (cmd - out), clamped to [-rate_limit, rate_limit].
#[derive(Clone, Debug)]
pub struct HeaterElement {
    /// Time constant (seconds)
    pub tau: f64,
    /// Rate limit (1/second)
    pub rate_limit: f64,
}

impl HeaterElement {
    pub fn new(tau: f64, rate_limit: f64) -> SimResult<Self> {
        if !(tau > 0.0) {
            return Err(SimError::InvalidArg {
                what: "element tau must be positive",
            });
        }
        if !(rate_limit > 0.0) {
            return Err(SimError::InvalidArg {
                what: "element rate_limit must be positive",
            });
        }
        Ok(Self { tau, rate_limit })
    }

    pub fn doutdt(&self, output: f64, command: f64) -> f64 {
        ((command - output) / self.tau).clamp(-self.rate_limit, self.rate_limit)
    }

    /// Advance by `dt` towards `command` (a fraction of full power).
    pub fn step(&self, state: ElementState, dt: f64, command: f64) -> ElementState {
        let command = command.clamp(0.0, 1.0);
        let output = state.output + self.doutdt(state.output, command) * dt;
        ElementState {
            output: output.clamp(0.0, 1.0),
        }
    }
}
