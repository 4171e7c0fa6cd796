//! Maps the signed controller effort onto heater and fan duty cycles.
//!
//! Positive effort heats with the fan at its floor. Negative effort turns the
//! heater off and uses the fan as the cooling actuator. The oven never heats
//! and force-cools in the same tick.

use rf_core::{FanSpeed, duty_from_percent, ensure_in_range};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Heater and fan duty cycles, percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Duty {
    pub heater: u8,
    pub fan: u8,
}

impl Duty {
    pub const OFF: Duty = Duty { heater: 0, fan: 0 };
    pub const FULL_COOL: Duty = Duty {
        heater: 0,
        fan: 100,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixerConfig {
    /// Fan floor that keeps air moving over the thermocouples.
    pub minimum_fan_speed: f64,
    /// Heater duty used when cooling demand is below the fan floor.
    pub idle_heater_duty: f64,
    /// Fan floor for segments hinted `Medium`.
    pub medium_floor: f64,
    /// Fan floor for segments hinted `High`.
    pub high_floor: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            minimum_fan_speed: 30.0,
            idle_heater_duty: 10.0,
            medium_floor: 60.0,
            high_floor: 100.0,
        }
    }
}

impl MixerConfig {
    pub fn validate(&self) -> ControlResult<()> {
        ensure_in_range(self.minimum_fan_speed, 5.0, 100.0, "minimum fan speed")?;
        ensure_in_range(self.idle_heater_duty, 0.0, 100.0, "idle heater duty")?;
        ensure_in_range(self.medium_floor, 0.0, 100.0, "medium fan floor")?;
        ensure_in_range(self.high_floor, 0.0, 100.0, "high fan floor")?;
        if self.medium_floor > self.high_floor {
            return Err(ControlError::InvalidArg {
                what: "medium fan floor above high fan floor",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputMixer {
    config: MixerConfig,
}

impl Default for OutputMixer {
    fn default() -> Self {
        Self {
            config: MixerConfig::default(),
        }
    }
}

impl OutputMixer {
    pub fn new(config: MixerConfig) -> ControlResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Fan floor for a segment hint. Never below the minimum fan speed.
    pub fn fan_floor(&self, hint: FanSpeed) -> f64 {
        let c = &self.config;
        match hint {
            FanSpeed::Low => c.minimum_fan_speed,
            FanSpeed::Medium => c.medium_floor.max(c.minimum_fan_speed),
            FanSpeed::High => c.high_floor.max(c.minimum_fan_speed),
        }
    }

    pub fn mix(&self, output: f64) -> Duty {
        self.mix_with_hint(output, FanSpeed::Low)
    }

    pub fn mix_with_hint(&self, output: f64, hint: FanSpeed) -> Duty {
        if !output.is_finite() {
            return Duty::FULL_COOL;
        }
        let c = &self.config;
        let output = output.clamp(-100.0, 100.0);

        let floor = self.fan_floor(hint);
        let (heater, fan) = if output >= 0.0 {
            (output, c.minimum_fan_speed)
        } else if -output < c.minimum_fan_speed {
            // Cooling demand the fan floor already covers. The idle heater
            // only runs while the fan is at its minimum.
            let heater = if floor > c.minimum_fan_speed { 0.0 } else { c.idle_heater_duty };
            (heater, c.minimum_fan_speed)
        } else {
            (0.0, -output)
        };
        let fan = fan.max(floor);

        Duty {
            heater: duty_from_percent(heater).unwrap_or(0),
            fan: duty_from_percent(fan).unwrap_or(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heating_keeps_fan_at_floor() {
        let m = OutputMixer::default();
        assert_eq!(m.mix(55.4), Duty { heater: 55, fan: 30 });
        assert_eq!(m.mix(0.0), Duty { heater: 0, fan: 30 });
    }

    #[test]
    fn cooling_uses_fan() {
        let m = OutputMixer::default();
        assert_eq!(m.mix(-80.0), Duty { heater: 0, fan: 80 });
        assert_eq!(m.mix(-100.0), Duty::FULL_COOL);
    }

    #[test]
    fn idle_bump_below_fan_floor() {
        let m = OutputMixer::default();
        assert_eq!(m.mix(-10.0), Duty { heater: 10, fan: 30 });
    }

    #[test]
    fn raised_fan_floor_suppresses_idle_heat() {
        let m = OutputMixer::default();
        assert_eq!(
            m.mix_with_hint(-10.0, FanSpeed::Medium),
            Duty { heater: 0, fan: 60 }
        );
        assert_eq!(
            m.mix_with_hint(-10.0, FanSpeed::High),
            Duty { heater: 0, fan: 100 }
        );
        // A hint floor equal to the minimum leaves the idle bump in place.
        let m = OutputMixer::new(MixerConfig {
            medium_floor: 20.0,
            ..MixerConfig::default()
        })
        .unwrap();
        assert_eq!(
            m.mix_with_hint(-10.0, FanSpeed::Medium),
            Duty { heater: 10, fan: 30 }
        );
    }

    #[test]
    fn hints_raise_the_fan_floor() {
        let m = OutputMixer::default();
        assert_eq!(
            m.mix_with_hint(40.0, FanSpeed::Medium),
            Duty { heater: 40, fan: 60 }
        );
        assert_eq!(
            m.mix_with_hint(-70.0, FanSpeed::Medium),
            Duty { heater: 0, fan: 70 }
        );
        assert_eq!(
            m.mix_with_hint(20.0, FanSpeed::High),
            Duty { heater: 20, fan: 100 }
        );
    }

    #[test]
    fn non_finite_is_full_cooling() {
        let m = OutputMixer::default();
        assert_eq!(m.mix(f64::NAN), Duty::FULL_COOL);
        assert_eq!(m.mix(f64::INFINITY), Duty::FULL_COOL);
    }

    #[test]
    fn config_ranges() {
        let bad = MixerConfig {
            minimum_fan_speed: 2.0,
            ..MixerConfig::default()
        };
        assert!(OutputMixer::new(bad).is_err());
        let bad = MixerConfig {
            medium_floor: 90.0,
            high_floor: 80.0,
            ..MixerConfig::default()
        };
        assert!(OutputMixer::new(bad).is_err());
    }
}
