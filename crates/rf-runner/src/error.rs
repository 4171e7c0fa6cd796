//! Error types for the profile runner.

use rf_controls::ControlError;
use rf_profile::ValidationError;
use rf_sensors::SensorError;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Profile rejected: {0}")]
    InvalidProfile(#[from] ValidationError),

    #[error("No valid thermocouple reading; check the sensors")]
    NoThermocouples,

    #[error("A run is already in progress")]
    Busy,

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Invalid configuration: {what}")]
    Config { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for rf-runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
