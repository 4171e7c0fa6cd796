//! Data points, the plot buffer, and the reporter seam.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rf_controls::Duty;
use rf_profile::MAX_PROFILE_TIME;
use rf_sensors::{CHANNELS, Measurement, ThermocoupleStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Oven state recorded with each data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RunPhase {
    #[default]
    Off,
    Running,
    Complete,
    Aborted,
    /// Operator-held setpoint with the heater enabled.
    Manual,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Complete | RunPhase::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermocoupleSample {
    #[serde(with = "rf_core::serde_nan")]
    pub temperature: f64,
    pub status: ThermocoupleStatus,
}

/// One per-tick snapshot of the oven.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub time_s: u32,
    pub state: RunPhase,
    #[serde(with = "rf_core::serde_nan")]
    pub target: f64,
    pub heater: u8,
    pub fan: u8,
    pub thermocouples: [ThermocoupleSample; CHANNELS],
}

impl DataPoint {
    pub fn new(time_s: u32, state: RunPhase, target: f64, duty: Duty, m: &Measurement) -> Self {
        Self {
            time_s,
            state,
            target,
            heater: duty.heater,
            fan: duty.fan,
            thermocouples: m.channels.map(|c| ThermocoupleSample {
                temperature: c.temperature,
                status: c.status,
            }),
        }
    }

    /// Mean of the healthy channels, NaN if there are none.
    pub fn average_temperature(&self) -> f64 {
        rf_core::finite_mean(
            self.thermocouples
                .iter()
                .filter(|t| t.status.is_ok())
                .map(|t| t.temperature),
        )
    }

    /// Largest value on the plot for this point, used for axis scaling.
    pub fn maximum(&self) -> f64 {
        self.thermocouples
            .iter()
            .map(|t| t.temperature)
            .chain(std::iter::once(self.target))
            .filter(|v| v.is_finite())
            .fold(f64::NAN, f64::max)
    }
}

struct PlotInner {
    targets: Vec<f64>,
    points: Vec<Option<DataPoint>>,
    last_valid: Option<usize>,
    live_data_present: bool,
}

/// Time-indexed record of a run, one slot per second.
///
/// Written by the tick handler, read by displays and the CLI.
pub struct PlotBuffer {
    inner: Mutex<PlotInner>,
}

impl Default for PlotBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlotBuffer {
    /// One slot per second from 0 up to and including the longest profile.
    pub const CAPACITY: usize = MAX_PROFILE_TIME as usize + 1;

    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PlotInner {
                targets: vec![f64::NAN; Self::CAPACITY],
                points: vec![None; Self::CAPACITY],
                last_valid: None,
                live_data_present: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.targets.fill(f64::NAN);
        inner.points.fill(None);
        inner.last_valid = None;
        inner.live_data_present = false;
    }

    /// Pre-plot the profile so the target line is visible before data arrives.
    pub fn prefill_targets(&self, curve: &[f64]) {
        let mut inner = self.lock();
        for (slot, &t) in inner.targets.iter_mut().zip(curve) {
            *slot = t;
        }
    }

    /// Store `point` at its time index. Points beyond capacity are ignored.
    pub fn record(&self, point: DataPoint) {
        let index = point.time_s as usize;
        if index >= Self::CAPACITY {
            debug!(time_s = point.time_s, "data point beyond plot capacity");
            return;
        }
        let mut inner = self.lock();
        inner.points[index] = Some(point);
        inner.last_valid = Some(inner.last_valid.map_or(index, |l| l.max(index)));
        inner.live_data_present = true;
    }

    pub fn get(&self, time_s: usize) -> Option<DataPoint> {
        self.lock().points.get(time_s).copied().flatten()
    }

    pub fn target(&self, time_s: usize) -> f64 {
        self.lock().targets.get(time_s).copied().unwrap_or(f64::NAN)
    }

    pub fn last_valid(&self) -> Option<usize> {
        self.lock().last_valid
    }

    pub fn live_data_present(&self) -> bool {
        self.lock().live_data_present
    }

    /// Recorded points in time order.
    pub fn points(&self) -> Vec<DataPoint> {
        self.lock().points.iter().flatten().copied().collect()
    }
}

/// Supervisory status refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    pub elapsed_s: u32,
    pub phase: RunPhase,
    pub setpoint: f64,
    pub duty: Duty,
    pub measurement: Measurement,
    pub case_temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Table,
    Plot,
}

impl DisplayMode {
    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::Table => DisplayMode::Plot,
            DisplayMode::Plot => DisplayMode::Table,
        }
    }
}

/// Consumer of run data, typically a display or a log.
pub trait Reporter: Send + Sync {
    /// Called once per tick from the tick handler; must not block.
    fn add_log_point(&self, point: &DataPoint);

    /// Called at the supervisory cadence.
    fn report_thermocouple_status(&self, report: &StatusReport);

    fn set_display_mode(&self, _mode: DisplayMode) {}

    fn display_mode(&self) -> DisplayMode {
        DisplayMode::Table
    }

    /// Operator-facing message, e.g. the outcome of a run.
    fn message(&self, _text: &str) {}
}

/// Reports through `tracing`.
#[derive(Debug, Default)]
pub struct LogReporter {
    mode: AtomicU8,
}

impl LogReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for LogReporter {
    fn add_log_point(&self, p: &DataPoint) {
        debug!(
            t = p.time_s,
            state = ?p.state,
            target = p.target,
            actual = p.average_temperature(),
            heater = p.heater,
            fan = p.fan,
            "log point"
        );
    }

    fn report_thermocouple_status(&self, r: &StatusReport) {
        let channels: Vec<String> = r
            .measurement
            .channels
            .iter()
            .map(|c| {
                if c.status.is_fault() {
                    c.status.short_name().to_string()
                } else {
                    format!("{:.1}", c.temperature)
                }
            })
            .collect();
        info!(
            t = r.elapsed_s,
            phase = ?r.phase,
            setpoint = format_args!("{:.1}", r.setpoint),
            average = format_args!("{:.1}", r.measurement.average),
            heater = r.duty.heater,
            fan = r.duty.fan,
            case = format_args!("{:.1}", r.case_temperature),
            channels = %channels.join(" "),
            "status"
        );
    }

    fn set_display_mode(&self, mode: DisplayMode) {
        let raw = match mode {
            DisplayMode::Table => 0,
            DisplayMode::Plot => 1,
        };
        self.mode.store(raw, Ordering::Relaxed);
    }

    fn display_mode(&self) -> DisplayMode {
        match self.mode.load(Ordering::Relaxed) {
            0 => DisplayMode::Table,
            _ => DisplayMode::Plot,
        }
    }

    fn message(&self, text: &str) {
        info!("{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_sensors::ChannelMeasurement;

    fn measurement(temps: [f64; 4], statuses: [ThermocoupleStatus; 4]) -> Measurement {
        let mut m = Measurement::default();
        for i in 0..4 {
            m.channels[i] = ChannelMeasurement {
                temperature: temps[i],
                cold_junction: 25.0,
                status: statuses[i],
            };
        }
        m
    }

    #[test]
    fn data_point_average_skips_faults() {
        use ThermocoupleStatus::*;
        let m = measurement([100.0, 110.0, f64::NAN, 300.0], [Ok, Ok, Open, Disabled]);
        let p = DataPoint::new(3, RunPhase::Running, 120.0, Duty::OFF, &m);
        assert_eq!(p.average_temperature(), 105.0);
        assert_eq!(p.maximum(), 300.0);
    }

    #[test]
    fn data_point_without_healthy_channels() {
        use ThermocoupleStatus::*;
        let m = measurement([f64::NAN; 4], [Open, Missing, ShortToGnd, ShortToVcc]);
        let p = DataPoint::new(0, RunPhase::Running, 50.0, Duty::OFF, &m);
        assert!(p.average_temperature().is_nan());
        assert_eq!(p.maximum(), 50.0);
    }

    #[test]
    fn plot_buffer_tracks_last_valid() {
        let plot = PlotBuffer::new();
        assert!(!plot.live_data_present());
        plot.prefill_targets(&[25.0, 30.0, 35.0]);
        assert_eq!(plot.target(1), 30.0);
        assert!(plot.target(3).is_nan());

        let m = Measurement::default();
        plot.record(DataPoint::new(2, RunPhase::Running, 35.0, Duty::OFF, &m));
        plot.record(DataPoint::new(1, RunPhase::Running, 30.0, Duty::OFF, &m));
        plot.record(DataPoint::new(9999, RunPhase::Running, 30.0, Duty::OFF, &m));
        assert_eq!(plot.last_valid(), Some(2));
        assert!(plot.live_data_present());
        assert_eq!(plot.points().len(), 2);
        assert_eq!(plot.points()[0].time_s, 1);

        plot.reset();
        assert_eq!(plot.last_valid(), None);
        assert!(plot.get(2).is_none());
    }

    #[test]
    fn display_mode_toggles() {
        let r = LogReporter::new();
        assert_eq!(r.display_mode(), DisplayMode::Table);
        r.set_display_mode(r.display_mode().toggled());
        assert_eq!(r.display_mode(), DisplayMode::Plot);
    }
}
