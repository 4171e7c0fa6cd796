use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of one thermocouple channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ThermocoupleStatus {
    /// Reading is valid and the channel is enabled.
    #[default]
    Ok,
    /// Open circuit; thermocouple not connected.
    Open,
    /// Thermocouple shorted to VCC.
    ShortToVcc,
    /// Thermocouple shorted to GND.
    ShortToGnd,
    /// Amplifier not responding.
    Missing,
    /// Reading is valid but the user excluded the channel.
    Disabled,
}

impl ThermocoupleStatus {
    /// True for the only status that contributes to the oven average.
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// True when the hardware reported a fault.
    pub fn is_fault(self) -> bool {
        matches!(
            self,
            Self::Open | Self::ShortToVcc | Self::ShortToGnd | Self::Missing
        )
    }

    /// Four-character code shown in the status line.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Open => "Open",
            Self::ShortToVcc => "Vcc",
            Self::ShortToGnd => "Gnd",
            Self::Missing => "----",
            Self::Disabled => "Dis",
        }
    }
}

impl fmt::Display for ThermocoupleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ok_counts() {
        assert!(ThermocoupleStatus::Ok.is_ok());
        assert!(!ThermocoupleStatus::Disabled.is_ok());
        assert!(!ThermocoupleStatus::Disabled.is_fault());
        assert!(ThermocoupleStatus::Missing.is_fault());
    }

    #[test]
    fn short_names() {
        assert_eq!(ThermocoupleStatus::ShortToGnd.to_string(), "Gnd");
        assert_eq!(ThermocoupleStatus::Missing.short_name(), "----");
    }
}
