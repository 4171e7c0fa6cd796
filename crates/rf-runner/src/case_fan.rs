//! Electronics case fan driven by the amplifier board temperature.
//!
//! The first thermocouple amplifier's cold junction stands in for the case
//! temperature. Below `start_c` the fan is off; from `start_c` it runs at
//! `min_duty` and rises linearly to full speed at `full_c`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use rf_sensors::TemperatureAggregator;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RunnerError, RunnerResult};
use crate::timer::PeriodicTimer;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaseFanCurve {
    pub start_c: f64,
    pub full_c: f64,
    pub min_duty: u8,
}

impl Default for CaseFanCurve {
    fn default() -> Self {
        Self {
            start_c: 35.0,
            full_c: 45.0,
            min_duty: 10,
        }
    }
}

impl CaseFanCurve {
    pub fn validate(&self) -> RunnerResult<()> {
        if !self.start_c.is_finite() || !self.full_c.is_finite() || self.full_c <= self.start_c {
            return Err(RunnerError::Config {
                what: format!(
                    "case fan curve {}..{} must be finite and increasing",
                    self.start_c, self.full_c
                ),
            });
        }
        if self.min_duty > 100 {
            return Err(RunnerError::Config {
                what: format!("case fan min_duty {} exceeds 100", self.min_duty),
            });
        }
        Ok(())
    }

    /// Fan duty for a case temperature; `None` when there is no reading.
    pub fn duty(&self, case_c: f64) -> Option<u8> {
        if case_c.is_nan() {
            return None;
        }
        let raw = f64::from(self.min_duty)
            + 100.0 * (case_c - self.start_c) / (self.full_c - self.start_c);
        // Truncated toward zero like an integer conversion.
        let duty = raw.trunc();
        Some(if duty < f64::from(self.min_duty) {
            0
        } else {
            duty.min(100.0) as u8
        })
    }
}

/// Case fan output.
pub trait CaseFan: Send + Sync {
    fn set_case_fan_duty(&self, percent: u8);
    fn case_fan_duty(&self) -> u8;
}

/// Case fan register with no hardware behind it.
#[derive(Debug, Default)]
pub struct CaseFanRegister(AtomicU8);

impl CaseFanRegister {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaseFan for CaseFanRegister {
    fn set_case_fan_duty(&self, percent: u8) {
        self.0.store(percent.min(100), Ordering::Relaxed);
    }

    fn case_fan_duty(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Periodically maps the case temperature onto the case fan.
///
/// Runs on its own timer, independent of any profile run. Stopped on drop.
pub struct CaseFanMonitor {
    timer: Arc<dyn PeriodicTimer>,
}

impl CaseFanMonitor {
    pub fn start(
        sensors: Arc<TemperatureAggregator>,
        fan: Arc<dyn CaseFan>,
        timer: Arc<dyn PeriodicTimer>,
        curve: CaseFanCurve,
        period: Duration,
    ) -> RunnerResult<Self> {
        curve.validate()?;
        timer.set_period(period);
        timer.set_callback(Some(Box::new(move || {
            // Missing readings leave the fan where it is.
            let case_c = sensors.case_temperature();
            let Some(duty) = curve.duty(case_c) else {
                return;
            };
            let previous = fan.case_fan_duty();
            if duty != previous {
                debug!(case_c, previous, duty, "case fan duty changed");
            }
            fan.set_case_fan_duty(duty);
        })));
        timer.enable_channel(true);
        timer.enable_interrupts(true);
        info!(?curve, ?period, "case fan monitor started");
        Ok(Self { timer })
    }

    pub fn stop(&self) {
        self.timer.enable_interrupts(false);
        self.timer.enable_channel(false);
        self.timer.set_callback(None);
    }
}

impl Drop for CaseFanMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualTimer;
    use rf_sensors::ThermocoupleChannel;
    use rf_sensors::max31855::encode;

    #[test]
    fn duty_curve() {
        let c = CaseFanCurve::default();
        assert_eq!(c.duty(20.0), Some(0));
        assert_eq!(c.duty(34.9), Some(0));
        assert_eq!(c.duty(35.0), Some(10));
        assert_eq!(c.duty(36.05), Some(20));
        assert_eq!(c.duty(40.0), Some(60));
        assert_eq!(c.duty(44.0), Some(100));
        assert_eq!(c.duty(80.0), Some(100));
        assert_eq!(c.duty(f64::NAN), None);
    }

    #[test]
    fn curve_must_increase() {
        let c = CaseFanCurve {
            full_c: 30.0,
            ..CaseFanCurve::default()
        };
        assert!(matches!(c.validate(), Err(RunnerError::Config { .. })));
        assert!(CaseFanCurve::default().validate().is_ok());
    }

    fn sensors(cold_junction: f64) -> Arc<TemperatureAggregator> {
        let ch = move || -> Box<dyn ThermocoupleChannel> { Box::new(move || encode(25.0, cold_junction)) };
        Arc::new(TemperatureAggregator::new([ch(), ch(), ch(), ch()]))
    }

    #[test]
    fn monitor_follows_case_temperature() {
        let sensors = sensors(40.0);
        let fan = Arc::new(CaseFanRegister::new());
        let timer = Arc::new(ManualTimer::new());
        let monitor = CaseFanMonitor::start(
            Arc::clone(&sensors),
            fan.clone(),
            timer.clone(),
            CaseFanCurve::default(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(timer.is_armed());
        assert_eq!(timer.period(), Duration::from_secs(1));

        // No measurement yet.
        assert!(timer.fire());
        assert_eq!(fan.case_fan_duty(), 0);

        sensors.update_measurements();
        assert!(timer.fire());
        assert_eq!(fan.case_fan_duty(), 60);

        monitor.stop();
        assert!(!timer.is_armed());
        assert!(!timer.has_callback());
    }

    #[test]
    fn dropping_the_monitor_disarms_its_timer() {
        let timer = Arc::new(ManualTimer::new());
        {
            let _monitor = CaseFanMonitor::start(
                sensors(30.0),
                Arc::new(CaseFanRegister::new()),
                timer.clone(),
                CaseFanCurve::default(),
                Duration::from_millis(500),
            )
            .unwrap();
            assert!(timer.is_armed());
        }
        assert!(!timer.is_armed());
    }
}
