//! Solder profile schema definitions.

pub use rf_core::FanSpeed;
use serde::{Deserialize, Serialize};

/// Target temperature of a profile point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileTemperature {
    /// Use the oven temperature captured when the run started.
    Ambient,
    Celsius(f64),
}

impl ProfileTemperature {
    pub fn resolve(self, ambient: f64) -> f64 {
        match self {
            Self::Ambient => ambient,
            Self::Celsius(t) => t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    /// Seconds from the start of the run.
    pub time_s: u32,
    pub temperature: ProfileTemperature,
    #[serde(default)]
    pub fan: FanSpeed,
    /// Terminal point: reaching it ends the run.
    #[serde(default)]
    pub stop: bool,
}

impl ProfilePoint {
    pub fn at(time_s: u32, celsius: f64) -> Self {
        Self {
            time_s,
            temperature: ProfileTemperature::Celsius(celsius),
            fan: FanSpeed::Low,
            stop: false,
        }
    }

    pub fn ambient(time_s: u32) -> Self {
        Self {
            time_s,
            temperature: ProfileTemperature::Ambient,
            fan: FanSpeed::Low,
            stop: false,
        }
    }

    pub fn with_fan(mut self, fan: FanSpeed) -> Self {
        self.fan = fan;
        self
    }

    pub fn with_stop(mut self) -> Self {
        self.stop = true;
        self
    }
}

/// Metallurgical landmarks of the solder, used for display and validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub liquidus_c: f64,
    pub soak_start_c: f64,
    pub soak_end_c: f64,
    pub peak_c: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolderProfile {
    pub description: String,
    /// Unlocked profiles may be overwritten by the editor.
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub lead_free: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,
    pub points: Vec<ProfilePoint>,
}

impl SolderProfile {
    pub fn new(description: impl Into<String>, points: Vec<ProfilePoint>) -> Self {
        Self {
            description: description.into(),
            editable: true,
            lead_free: false,
            thresholds: None,
            points,
        }
    }

    /// Time of the final point, or 0 for an empty profile.
    pub fn duration_s(&self) -> u32 {
        self.points.last().map_or(0, |p| p.time_s)
    }

    /// Highest explicit temperature in the profile.
    pub fn peak_c(&self) -> Option<f64> {
        self.points
            .iter()
            .filter_map(|p| match p.temperature {
                ProfileTemperature::Celsius(t) => Some(t),
                ProfileTemperature::Ambient => None,
            })
            .reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambient_resolves_to_capture() {
        assert_eq!(ProfileTemperature::Ambient.resolve(23.0), 23.0);
        assert_eq!(ProfileTemperature::Celsius(150.0).resolve(23.0), 150.0);
    }

    #[test]
    fn duration_and_peak() {
        let p = SolderProfile::new(
            "x",
            vec![
                ProfilePoint::ambient(0),
                ProfilePoint::at(60, 150.0),
                ProfilePoint::at(90, 210.0),
                ProfilePoint::ambient(120).with_stop(),
            ],
        );
        assert_eq!(p.duration_s(), 120);
        assert_eq!(p.peak_c(), Some(210.0));
    }
}
