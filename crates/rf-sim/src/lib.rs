//! Simulated reflow oven.
//!
//! Provides:
//! - a lumped thermal plant with a lagging heater element and fan cooling
//! - an [`OvenControl`](rf_runner::OvenControl) implementation driving it
//! - MAX31855 channels that read the plant, with fault injection
//! - a background driver that advances the plant in scaled wall-clock time

pub mod element;
pub mod error;
pub mod oven;
pub mod plant;
pub mod thermocouple;

pub use element::{ElementState, HeaterElement};
pub use error::{SimError, SimResult};
pub use oven::{PlantDriver, SimOven};
pub use plant::{OvenParams, OvenPlant, PlantState};
pub use thermocouple::{FaultSwitch, SimThermocouple, parse_fault};
