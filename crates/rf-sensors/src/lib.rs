//! Thermocouple acquisition for the reflow oven.
//!
//! Each oven has four MAX31855 thermocouple amplifiers. This crate decodes
//! their frames, applies per-channel offsets and enables, and aggregates the
//! healthy channels into a single oven temperature.
//!
//! The aggregate is NaN when no channel is healthy. Callers must treat that as
//! "no valid temperature" and never as a cold oven.

pub mod aggregator;
pub mod channel;
pub mod error;
pub mod max31855;
pub mod status;

pub use aggregator::{ChannelMeasurement, Measurement, OVERSAMPLES, TemperatureAggregator};
pub use channel::{ChannelSettings, Thermocouple, ThermocoupleChannel};
pub use error::{SensorError, SensorResult};
pub use max31855::Reading;
pub use status::ThermocoupleStatus;

/// Number of thermocouple channels on the controller board.
pub const CHANNELS: usize = 4;
