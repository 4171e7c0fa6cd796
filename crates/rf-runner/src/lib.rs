//! Reflow profile execution.
//!
//! [`ProfileRunner`] drives a [`SolderProfile`](rf_profile::SolderProfile) on
//! an oven: once per tick it advances the [`ProfileSequencer`], interpolates a
//! setpoint, runs the PID against the aggregated thermocouple temperature and
//! mixes the output into heater and fan duty. Hardware is reached only through
//! the traits in [`oven`], [`timer`], [`buttons`] and [`reporter`].
//!
//! [`ManualController`] holds an operator-chosen setpoint instead, and
//! [`CaseFanMonitor`] keeps the electronics cool on its own timer.

pub mod buttons;
pub mod case_fan;
pub mod config;
pub mod error;
pub mod manual;
pub mod monitor;
pub mod oven;
pub mod reporter;
pub mod runner;
pub mod sequencer;
pub mod timer;

pub use buttons::{Button, ButtonQueue, ButtonSender, ButtonSource, ButtonValue};
pub use case_fan::{CaseFan, CaseFanCurve, CaseFanMonitor, CaseFanRegister};
pub use config::{ManualSettings, OvenConfig, PidSettings, RunSettings};
pub use error::{RunnerError, RunnerResult};
pub use manual::{ManualController, ManualOptions, ManualSummary};
pub use monitor::ThermocoupleMonitor;
pub use oven::{Annunciator, DutyRegister, LogAnnunciator, OvenControl};
pub use reporter::{
    DataPoint, DisplayMode, LogReporter, PlotBuffer, Reporter, RunPhase, StatusReport,
    ThermocoupleSample,
};
pub use runner::{Peripherals, ProfileRunner, RunHandle, RunOutcome, RunSummary, RunnerOptions};
pub use sequencer::{AMBIENT_CLAMP_C, ProfileSequencer, RunState, TickAction, capture_ambient};
pub use timer::{ManualTimer, PeriodicTimer, ThreadTimer, TickCallback};
