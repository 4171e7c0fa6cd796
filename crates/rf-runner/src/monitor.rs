//! Standalone thermocouple view: live readings with per-channel enable.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rf_controls::Duty;
use rf_sensors::TemperatureAggregator;
use tracing::{info, warn};

use crate::buttons::{Button, ButtonSource};
use crate::reporter::{DataPoint, Reporter, RunPhase, StatusReport};

/// Polls the sensors at a fixed cadence until select is pressed.
///
/// F1..F4 toggle the matching channel in or out of the average.
pub struct ThermocoupleMonitor {
    sensors: Arc<TemperatureAggregator>,
    buttons: Arc<dyn ButtonSource>,
    reporter: Arc<dyn Reporter>,
    period: Duration,
}

impl ThermocoupleMonitor {
    pub fn new(
        sensors: Arc<TemperatureAggregator>,
        buttons: Arc<dyn ButtonSource>,
        reporter: Arc<dyn Reporter>,
        period: Duration,
    ) -> Self {
        Self {
            sensors,
            buttons,
            reporter,
            period,
        }
    }

    /// Run until select, or for at most `max_cycles` refreshes. Returns the
    /// number of refreshes performed.
    ///
    /// Points are indexed by wall-clock seconds since the monitor started.
    pub fn run(&self, max_cycles: Option<u32>) -> u32 {
        let started = Instant::now();
        let mut cycles = 0u32;
        loop {
            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }
            cycles += 1;
            let elapsed_s = u32::try_from(started.elapsed().as_secs()).unwrap_or(u32::MAX);

            let measurement = self.sensors.update_measurements();
            let point = DataPoint::new(elapsed_s, RunPhase::Off, f64::NAN, Duty::OFF, &measurement);
            self.reporter.add_log_point(&point);
            self.reporter.report_thermocouple_status(&StatusReport {
                elapsed_s,
                phase: RunPhase::Off,
                setpoint: f64::NAN,
                duty: Duty::OFF,
                measurement,
                case_temperature: self.sensors.case_temperature(),
            });

            let Some(key) = self.buttons.get_button(self.period) else {
                continue;
            };
            if key.repeating {
                continue;
            }
            if key.button == Button::Select {
                break;
            }
            if let Some(index) = key.button.function_index() {
                match self.sensors.toggle_enable(index) {
                    Ok(enabled) => info!(channel = index + 1, enabled, "channel toggled"),
                    Err(e) => warn!(error = %e, "toggle failed"),
                }
            }
        }
        cycles
    }
}
