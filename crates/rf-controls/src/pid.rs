//! Sampled PID controller driving the oven effort.
//!
//! The controller pulls the process value from a [`ProcessSource`] and pushes
//! its output into an [`OutputSink`]. Both are plain closures in most uses:
//!
//! ```
//! use rf_controls::{PidConfig, PidController};
//!
//! let mut last = 0.0;
//! let mut pid = PidController::new(PidConfig::default(), || 20.0, |out: f64| last = out);
//! pid.set_setpoint(25.0);
//! pid.enable(true);
//! pid.update();
//! drop(pid);
//! assert!(last > 0.0);
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ControlError, ControlResult};
use crate::sampled::SampleConfig;

/// Supplies the measured oven temperature.
pub trait ProcessSource {
    fn read(&mut self) -> f64;
}

impl<F> ProcessSource for F
where
    F: FnMut() -> f64,
{
    fn read(&mut self) -> f64 {
        self()
    }
}

/// Receives each controller output.
pub trait OutputSink {
    fn write(&mut self, output: f64);
}

impl<F> OutputSink for F
where
    F: FnMut(f64),
{
    fn write(&mut self, output: f64) {
        self(output)
    }
}

/// Gains expressed per second; scaled by the sample period internally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 40.0,
            ki: 0.05,
            kd: 62.5,
        }
    }
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> ControlResult<Self> {
        let gains = Self { kp, ki, kd };
        gains.validate()?;
        Ok(gains)
    }

    pub fn validate(&self) -> ControlResult<()> {
        for g in [self.kp, self.ki, self.kd] {
            if rf_core::ensure_finite(g, "pid gain")? < 0.0 {
                return Err(ControlError::InvalidArg {
                    what: "gains must be non-negative",
                });
            }
        }
        Ok(())
    }
}

/// PID controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidConfig {
    pub gains: PidGains,
    pub sample: SampleConfig,
    /// Minimum output value.
    pub out_min: f64,
    /// Maximum output value.
    pub out_max: f64,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            gains: PidGains::default(),
            sample: SampleConfig::default(),
            out_min: -100.0,
            out_max: 100.0,
        }
    }
}

impl PidConfig {
    pub fn new(gains: PidGains, sample: SampleConfig, out_min: f64, out_max: f64) -> ControlResult<Self> {
        let config = Self {
            gains,
            sample,
            out_min,
            out_max,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ControlResult<()> {
        self.gains.validate()?;
        SampleConfig::new(self.sample.dt)?;
        if !(self.out_min < self.out_max) {
            return Err(ControlError::InvalidArg {
                what: "out_min must be less than out_max",
            });
        }
        Ok(())
    }

    fn ki_per_sample(&self) -> f64 {
        self.gains.ki * self.sample.dt
    }

    fn kd_per_sample(&self) -> f64 {
        self.gains.kd / self.sample.dt
    }
}

/// Controller memory and last inputs/outputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidState {
    pub setpoint: f64,
    /// Accumulated integral term, already scaled by `ki`.
    pub integral: f64,
    pub previous_error: f64,
    pub input: f64,
    pub output: f64,
    pub enabled: bool,
    /// Updates since the last `enable(true)`.
    pub ticks: u64,
    /// Last process value was not finite.
    pub faulted: bool,
}

impl Default for PidState {
    fn default() -> Self {
        Self {
            setpoint: 0.0,
            integral: 0.0,
            previous_error: 0.0,
            input: f64::NAN,
            output: 0.0,
            enabled: false,
            ticks: 0,
            faulted: false,
        }
    }
}

/// PID controller bound to its input and output.
///
/// A non-finite process value means no thermocouple can be trusted. The
/// controller then holds its integral and drives the output to `out_min`,
/// which the mixer turns into heater off and full fan.
pub struct PidController<S, O> {
    config: PidConfig,
    state: PidState,
    source: S,
    sink: O,
}

impl<S: ProcessSource, O: OutputSink> PidController<S, O> {
    pub fn new(config: PidConfig, source: S, sink: O) -> Self {
        Self {
            config,
            state: PidState::default(),
            source,
            sink,
        }
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    pub fn set_tunings(&mut self, gains: PidGains) -> ControlResult<()> {
        gains.validate()?;
        self.config.gains = gains;
        Ok(())
    }

    /// Enable or disable the controller. Either way the integral and
    /// derivative memory is cleared.
    pub fn enable(&mut self, enable: bool) {
        self.state.integral = 0.0;
        self.state.previous_error = 0.0;
        self.state.ticks = 0;
        self.state.faulted = false;
        self.state.enabled = enable;
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    /// Takes effect on the next update.
    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.state.setpoint = setpoint;
    }

    pub fn setpoint(&self) -> f64 {
        self.state.setpoint
    }

    pub fn input(&self) -> f64 {
        self.state.input
    }

    pub fn output(&self) -> f64 {
        self.state.output
    }

    pub fn ticks(&self) -> u64 {
        self.state.ticks
    }

    pub fn is_faulted(&self) -> bool {
        self.state.faulted
    }

    pub fn state(&self) -> PidState {
        self.state
    }

    /// Seconds since the controller was enabled.
    pub fn elapsed_time(&self) -> f64 {
        self.config.sample.elapsed(self.state.ticks)
    }

    /// Run one control update. Does nothing while disabled.
    pub fn update(&mut self) {
        if !self.state.enabled {
            return;
        }
        self.state.ticks += 1;

        let pv = self.source.read();
        self.state.input = pv;

        let output = if pv.is_finite() {
            self.state.faulted = false;
            self.compute(pv)
        } else {
            if !self.state.faulted {
                warn!(pv, "no valid process value; forcing full cooling");
            }
            self.state.faulted = true;
            self.config.out_min
        };

        self.state.output = output;
        self.sink.write(output);
    }

    fn compute(&mut self, pv: f64) -> f64 {
        let c = &self.config;
        let error = self.state.setpoint - pv;

        let integral =
            (self.state.integral + c.ki_per_sample() * error).clamp(c.out_min, c.out_max);

        // No history on the first sample after enable.
        let derivative = if self.state.ticks > 1 {
            c.kd_per_sample() * (error - self.state.previous_error)
        } else {
            0.0
        };

        self.state.integral = integral;
        self.state.previous_error = error;

        (c.gains.kp * error + integral + derivative).clamp(c.out_min, c.out_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn config(kp: f64, ki: f64, kd: f64) -> PidConfig {
        PidConfig::new(
            PidGains::new(kp, ki, kd).unwrap(),
            SampleConfig::new(1.0).unwrap(),
            -100.0,
            100.0,
        )
        .unwrap()
    }

    #[test]
    fn proportional_only() {
        let out = Cell::new(f64::NAN);
        let mut pid = PidController::new(config(2.0, 0.0, 0.0), || 90.0, |o: f64| out.set(o));
        pid.set_setpoint(100.0);
        pid.enable(true);
        pid.update();
        assert_eq!(out.get(), 20.0);
        assert_eq!(pid.output(), 20.0);
        assert_eq!(pid.input(), 90.0);
    }

    #[test]
    fn disabled_does_nothing() {
        let calls = Cell::new(0);
        let mut pid = PidController::new(config(1.0, 0.0, 0.0), || 0.0, |_: f64| calls.set(calls.get() + 1));
        pid.update();
        assert_eq!(calls.get(), 0);
        assert_eq!(pid.ticks(), 0);
    }

    #[test]
    fn output_clamped() {
        let out = Cell::new(0.0);
        let mut pid = PidController::new(config(40.0, 0.0, 0.0), || 25.0, |o: f64| out.set(o));
        pid.set_setpoint(250.0);
        pid.enable(true);
        pid.update();
        assert_eq!(out.get(), 100.0);

        pid.set_setpoint(0.0);
        pid.update();
        assert_eq!(out.get(), -100.0);
    }

    #[test]
    fn integral_clamped_to_output_range() {
        let mut pid = PidController::new(config(0.0, 10.0, 0.0), || 0.0, |_: f64| {});
        pid.set_setpoint(100.0);
        pid.enable(true);
        for _ in 0..50 {
            pid.update();
        }
        assert_eq!(pid.state().integral, 100.0);
    }

    #[test]
    fn derivative_from_consecutive_errors() {
        let pv = Cell::new(50.0);
        let mut pid = PidController::new(config(0.0, 0.0, 2.0), || pv.get(), |_: f64| {});
        pid.set_setpoint(100.0);
        pid.enable(true);
        pid.update();
        // First sample carries no derivative kick.
        assert_eq!(pid.output(), 0.0);
        pv.set(60.0);
        pid.update();
        // error 50 -> 40
        assert_eq!(pid.output(), -20.0);
    }

    #[test]
    fn gains_scale_with_interval() {
        let cfg = PidConfig::new(
            PidGains::new(0.0, 1.0, 1.0).unwrap(),
            SampleConfig::new(0.25).unwrap(),
            -100.0,
            100.0,
        )
        .unwrap();
        let mut pid = PidController::new(cfg, || 0.0, |_: f64| {});
        pid.set_setpoint(4.0);
        pid.enable(true);
        pid.update();
        assert_eq!(pid.state().integral, 1.0);
        assert_eq!(pid.elapsed_time(), 0.25);
    }

    #[test]
    fn enable_resets_memory() {
        let mut pid = PidController::new(config(1.0, 1.0, 1.0), || 0.0, |_: f64| {});
        pid.set_setpoint(10.0);
        pid.enable(true);
        pid.update();
        pid.update();
        assert!(pid.state().integral > 0.0);
        assert_eq!(pid.elapsed_time(), 2.0);

        pid.enable(false);
        assert_eq!(pid.state().integral, 0.0);
        assert_eq!(pid.state().previous_error, 0.0);
        pid.enable(true);
        assert_eq!(pid.ticks(), 0);
        assert_eq!(pid.setpoint(), 10.0);
    }

    #[test]
    fn nan_process_value_forces_full_cooling() {
        let pv = Cell::new(100.0);
        let out = Cell::new(0.0);
        let mut pid = PidController::new(config(1.0, 1.0, 0.0), || pv.get(), |o: f64| out.set(o));
        pid.set_setpoint(150.0);
        pid.enable(true);
        pid.update();
        let integral = pid.state().integral;

        pv.set(f64::NAN);
        pid.update();
        assert_eq!(out.get(), -100.0);
        assert!(pid.is_faulted());
        assert_eq!(pid.state().integral, integral);

        pv.set(100.0);
        pid.update();
        assert!(!pid.is_faulted());
        assert!(out.get() > 0.0);
    }

    #[test]
    fn invalid_params() {
        assert!(PidGains::new(-1.0, 0.0, 0.0).is_err());
        assert!(PidGains::new(1.0, f64::NAN, 0.0).is_err());
        assert!(
            PidConfig::new(PidGains::default(), SampleConfig::default(), 100.0, -100.0).is_err()
        );
    }

    #[test]
    fn retuning_keeps_old_gains_on_error() {
        let mut pid = PidController::new(PidConfig::default(), || 25.0, |_: f64| {});
        pid.set_tunings(PidGains::new(10.0, 0.0, 0.0).unwrap()).unwrap();
        assert_eq!(pid.config().gains.kp, 10.0);
        assert!(pid.set_tunings(PidGains { kp: f64::INFINITY, ki: 0.0, kd: 0.0 }).is_err());
        assert_eq!(pid.config().gains.kp, 10.0);
    }
}
