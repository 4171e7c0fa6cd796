//! Closed-loop control for the reflow oven.
//!
//! The loop is split into two stages:
//! - a sampled PID controller producing a signed effort in `[-100, 100]`,
//!   where positive means heat and negative means cool;
//! - an output mixer that turns the effort into heater and fan duty cycles.
//!
//! The controller never returns its output. It pushes it into an
//! [`OutputSink`], so the mixer runs exactly once per control update.

pub mod error;
pub mod mixer;
pub mod pid;
pub mod sampled;

pub use error::{ControlError, ControlResult};
pub use mixer::{Duty, MixerConfig, OutputMixer};
pub use pid::{OutputSink, PidConfig, PidController, PidGains, PidState, ProcessSource};
pub use sampled::SampleConfig;
