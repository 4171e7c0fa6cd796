//! Sample period of the digital controller.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Sample configuration for a controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Sample period in seconds.
    pub dt: f64,
}

impl SampleConfig {
    /// Create a new sample configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `dt` is not a positive finite number.
    pub fn new(dt: f64) -> ControlResult<Self> {
        if rf_core::ensure_finite(dt, "sample period")? <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "sample period must be positive",
            });
        }
        Ok(Self { dt })
    }

    /// Create a sample configuration from frequency in Hz.
    pub fn from_frequency(freq_hz: f64) -> ControlResult<Self> {
        if !freq_hz.is_finite() || freq_hz <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "frequency must be positive",
            });
        }
        Self::new(1.0 / freq_hz)
    }

    /// Get the sample frequency in Hz.
    pub fn frequency(&self) -> f64 {
        1.0 / self.dt
    }

    /// Elapsed time after `ticks` samples.
    pub fn elapsed(&self, ticks: u64) -> f64 {
        ticks as f64 * self.dt
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self { dt: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_creation() {
        let config = SampleConfig::new(0.25).unwrap();
        assert_eq!(config.dt, 0.25);
        assert!((config.frequency() - 4.0).abs() < 1e-10);
        assert_eq!(config.elapsed(8), 2.0);
    }

    #[test]
    fn sample_config_from_frequency() {
        let config = SampleConfig::from_frequency(10.0).unwrap();
        assert!((config.dt - 0.1).abs() < 1e-10);
    }

    #[test]
    fn rejects_non_positive_period() {
        assert!(SampleConfig::new(0.0).is_err());
        assert!(SampleConfig::new(-1.0).is_err());
        assert!(SampleConfig::new(f64::NAN).is_err());
        assert!(SampleConfig::from_frequency(0.0).is_err());
    }
}
