//! One thermocouple channel: a frame source plus user settings.

use serde::{Deserialize, Serialize};

use crate::error::{SensorError, SensorResult};
use crate::max31855::{self, Reading};
use crate::ThermocoupleStatus;

pub const MAX_OFFSET_C: f64 = 30.0;

/// Raw access to a thermocouple amplifier.
///
/// Hardware builds implement this over SPI; the simulator implements it from
/// the plant model.
pub trait ThermocoupleChannel: Send {
    /// Clock one 32-bit frame out of the amplifier.
    fn read_frame(&mut self) -> u32;
}

impl<F> ThermocoupleChannel for F
where
    F: FnMut() -> u32 + Send,
{
    fn read_frame(&mut self) -> u32 {
        self()
    }
}

/// Per-channel user settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Manual calibration offset added to the thermocouple temperature (degC).
    #[serde(default)]
    pub offset_c: f64,
    /// Whether the channel contributes to the oven average.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            offset_c: 0.0,
            enabled: true,
        }
    }
}

impl ChannelSettings {
    pub fn validate(&self) -> SensorResult<()> {
        if !self.offset_c.is_finite() || self.offset_c.abs() > MAX_OFFSET_C {
            return Err(SensorError::InvalidOffset {
                value: self.offset_c,
            });
        }
        Ok(())
    }
}

/// A thermocouple amplifier with offset and enable applied.
pub struct Thermocouple {
    device: Box<dyn ThermocoupleChannel>,
    settings: ChannelSettings,
}

impl Thermocouple {
    pub fn new(device: Box<dyn ThermocoupleChannel>) -> Self {
        Self {
            device,
            settings: ChannelSettings::default(),
        }
    }

    pub fn settings(&self) -> ChannelSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: ChannelSettings) -> SensorResult<()> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
    }

    /// Read one frame and apply the channel settings.
    pub fn read(&mut self) -> Reading {
        let mut reading = max31855::decode(self.device.read_frame());
        if reading.status.is_ok() {
            reading.temperature += self.settings.offset_c;
            if !self.settings.enabled {
                reading.status = ThermocoupleStatus::Disabled;
            }
        }
        reading
    }
}
