//! Oven configuration file.
//!
//! ```yaml
//! pid: { kp: 40.0, ki: 0.05, kd: 62.5, interval_s: 1.0 }
//! fan: { minimum_fan_speed: 30.0, idle_heater_duty: 10.0, medium_floor: 60.0, high_floor: 100.0 }
//! thermocouples:
//!   - { offset_c: 0.0, enabled: true }
//!   - { offset_c: 0.0, enabled: true }
//!   - { offset_c: -1.5, enabled: true }
//!   - { offset_c: 0.0, enabled: false }
//! run: { tick_period_ms: 1000, supervisor_period_ms: 1000, ambient_clamp_c: 35.0, await_acknowledge: true }
//! manual: { max_heater_time_s: 600 }
//! case_fan: { start_c: 35.0, full_c: 45.0, min_duty: 10 }
//! ```

use std::path::Path;
use std::time::Duration;

use rf_controls::{MixerConfig, PidConfig, PidGains, SampleConfig};
use rf_sensors::{CHANNELS, ChannelSettings};
use serde::{Deserialize, Serialize};

use crate::case_fan::CaseFanCurve;
use crate::error::{RunnerError, RunnerResult};
use crate::sequencer::AMBIENT_CLAMP_C;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidSettings {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub interval_s: f64,
}

impl Default for PidSettings {
    fn default() -> Self {
        let gains = PidGains::default();
        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            interval_s: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Wall-clock period of one profile second.
    pub tick_period_ms: u64,
    pub supervisor_period_ms: u64,
    pub ambient_clamp_c: f64,
    /// Wait for the select key before leaving the run view.
    pub await_acknowledge: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            tick_period_ms: 1000,
            supervisor_period_ms: 1000,
            ambient_clamp_c: AMBIENT_CLAMP_C,
            await_acknowledge: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManualSettings {
    /// Continuous heating allowed in manual mode before the heater is forced off.
    pub max_heater_time_s: u32,
}

impl Default for ManualSettings {
    fn default() -> Self {
        Self { max_heater_time_s: 600 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OvenConfig {
    #[serde(default)]
    pub pid: PidSettings,
    #[serde(default)]
    pub fan: MixerConfig,
    #[serde(default)]
    pub thermocouples: [ChannelSettings; CHANNELS],
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub manual: ManualSettings,
    #[serde(default)]
    pub case_fan: CaseFanCurve,
}

fn invalid(what: impl Into<String>) -> RunnerError {
    RunnerError::Config { what: what.into() }
}

fn check_range(v: f64, lo: f64, hi: f64, name: &str) -> RunnerResult<()> {
    if !v.is_finite() || v < lo || v > hi {
        return Err(invalid(format!("{name} = {v} outside {lo}..={hi}")));
    }
    Ok(())
}

impl OvenConfig {
    pub fn validate(&self) -> RunnerResult<()> {
        check_range(self.pid.kp, 0.5, 60.0, "pid.kp")?;
        check_range(self.pid.ki, 0.0, 1.0, "pid.ki")?;
        check_range(self.pid.kd, 0.0, 200.0, "pid.kd")?;
        check_range(self.pid.interval_s, 0.01, 10.0, "pid.interval_s")?;
        self.fan.validate()?;
        for tc in &self.thermocouples {
            tc.validate()?;
        }
        if self.run.tick_period_ms == 0 || self.run.supervisor_period_ms == 0 {
            return Err(invalid("run periods must be positive"));
        }
        check_range(self.run.ambient_clamp_c, 0.0, 100.0, "run.ambient_clamp_c")?;
        check_range(
            f64::from(self.manual.max_heater_time_s),
            10.0,
            1000.0,
            "manual.max_heater_time_s",
        )?;
        self.case_fan.validate()?;
        Ok(())
    }

    pub fn pid_config(&self) -> RunnerResult<PidConfig> {
        Ok(PidConfig::new(
            PidGains::new(self.pid.kp, self.pid.ki, self.pid.kd)?,
            SampleConfig::new(self.pid.interval_s)?,
            -100.0,
            100.0,
        )?)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.run.tick_period_ms)
    }

    pub fn supervisor_period(&self) -> Duration {
        Duration::from_millis(self.run.supervisor_period_ms)
    }

    pub fn load_yaml(path: &Path) -> RunnerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: OvenConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_yaml(&self, path: &Path) -> RunnerResult<()> {
        self.validate()?;
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = OvenConfig::default();
        c.validate().unwrap();
        let pid = c.pid_config().unwrap();
        assert_eq!(pid.gains.kp, 40.0);
        assert_eq!(pid.out_min, -100.0);
        assert_eq!(c.fan.minimum_fan_speed, 30.0);
        assert!(c.thermocouples.iter().all(|t| t.enabled));
    }

    #[test]
    fn ranges_enforced() {
        let mut c = OvenConfig::default();
        c.pid.kp = 61.0;
        assert!(matches!(c.validate(), Err(RunnerError::Config { .. })));

        let mut c = OvenConfig::default();
        c.thermocouples[2].offset_c = -31.0;
        assert!(matches!(c.validate(), Err(RunnerError::Sensor(_))));

        let mut c = OvenConfig::default();
        c.fan.minimum_fan_speed = 4.0;
        assert!(matches!(c.validate(), Err(RunnerError::Control(_))));

        let mut c = OvenConfig::default();
        c.run.tick_period_ms = 0;
        assert!(c.validate().is_err());

        let mut c = OvenConfig::default();
        c.manual.max_heater_time_s = 5;
        assert!(matches!(c.validate(), Err(RunnerError::Config { .. })));

        let mut c = OvenConfig::default();
        c.case_fan.full_c = c.case_fan.start_c;
        assert!(matches!(c.validate(), Err(RunnerError::Config { .. })));
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let c: OvenConfig = serde_yaml::from_str("pid: { kp: 20.0, ki: 0.1, kd: 10.0, interval_s: 1.0 }\n").unwrap();
        c.validate().unwrap();
        assert_eq!(c.pid.kp, 20.0);
        assert_eq!(c.run, RunSettings::default());
        assert_eq!(c.manual.max_heater_time_s, 600);
        assert_eq!(c.case_fan, CaseFanCurve::default());
    }

    #[test]
    fn yaml_roundtrip() {
        let mut c = OvenConfig::default();
        c.thermocouples[3].enabled = false;
        c.run.await_acknowledge = false;
        let path = std::env::temp_dir().join("rf_runner_config_roundtrip.yaml");
        c.save_yaml(&path).unwrap();
        assert_eq!(OvenConfig::load_yaml(&path).unwrap(), c);
        let _ = std::fs::remove_file(&path);
    }
}
