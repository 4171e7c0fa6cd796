//! Oversampled, fault-tolerant aggregation of the thermocouple channels.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rf_core::finite_mean;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::channel::{ChannelSettings, Thermocouple, ThermocoupleChannel};
use crate::error::{SensorError, SensorResult};
use crate::{CHANNELS, ThermocoupleStatus};

/// Reads per channel per update.
pub const OVERSAMPLES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelMeasurement {
    pub temperature: f64,
    pub cold_junction: f64,
    pub status: ThermocoupleStatus,
}

impl Default for ChannelMeasurement {
    fn default() -> Self {
        Self {
            temperature: f64::NAN,
            cold_junction: f64::NAN,
            status: ThermocoupleStatus::Missing,
        }
    }
}

/// Snapshot of all channels after one update.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub channels: [ChannelMeasurement; CHANNELS],
    /// Mean of the `Ok` channels; NaN when there are none.
    pub average: f64,
}

impl Measurement {
    pub fn healthy_channels(&self) -> usize {
        self.channels.iter().filter(|c| c.status.is_ok()).count()
    }
}

struct Inner {
    channels: [Thermocouple; CHANNELS],
    current: Measurement,
}

/// Owns the four channels and the shared "current measurement".
///
/// The lock is held for the whole oversampled read, so every reader sees a
/// snapshot produced by one complete update.
pub struct TemperatureAggregator {
    inner: Mutex<Inner>,
}

impl TemperatureAggregator {
    pub fn new(devices: [Box<dyn ThermocoupleChannel>; CHANNELS]) -> Self {
        Self {
            inner: Mutex::new(Inner {
                channels: devices.map(Thermocouple::new),
                current: Measurement {
                    average: f64::NAN,
                    ..Measurement::default()
                },
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Oversample every channel and replace the current measurement.
    pub fn update_measurements(&self) -> Measurement {
        let mut inner = self.lock();
        let previous = inner.current;
        let mut next = Measurement::default();

        for (index, channel) in inner.channels.iter_mut().enumerate() {
            let mut temp_sum = 0.0;
            let mut cold_sum = 0.0;
            let mut cold_count = 0u32;
            let mut status = ThermocoupleStatus::Ok;

            for _ in 0..OVERSAMPLES {
                let reading = channel.read();
                // Faults stick for the burst; otherwise the last status wins.
                if !status.is_fault() {
                    status = reading.status;
                }
                temp_sum += reading.temperature;
                if reading.cold_junction.is_finite() {
                    cold_sum += reading.cold_junction;
                    cold_count += 1;
                }
            }

            let temperature = if status.is_fault() {
                f64::NAN
            } else {
                temp_sum / OVERSAMPLES as f64
            };
            let cold_junction = if cold_count == 0 {
                f64::NAN
            } else {
                cold_sum / cold_count as f64
            };
            next.channels[index] = ChannelMeasurement {
                temperature,
                cold_junction,
                status,
            };

            let was = previous.channels[index].status;
            if status.is_fault() && was != status {
                warn!(channel = index + 1, status = %status, "thermocouple fault");
            } else if was.is_fault() && !status.is_fault() {
                debug!(channel = index + 1, status = %status, "thermocouple recovered");
            }
        }

        next.average = finite_mean(
            next.channels
                .iter()
                .filter(|c| c.status.is_ok())
                .map(|c| c.temperature),
        );
        inner.current = next;
        next
    }

    /// Refresh the measurement and return the oven average.
    ///
    /// Blocks for a full oversampled read. NaN means no channel is healthy.
    pub fn get_temperature(&self) -> f64 {
        self.update_measurements().average
    }

    /// Copy of the most recent measurement without touching the hardware.
    pub fn last_measurement(&self) -> Measurement {
        self.lock().current
    }

    /// Board temperature as seen by the first amplifier's cold junction.
    pub fn case_temperature(&self) -> f64 {
        self.lock().current.channels[0].cold_junction
    }

    pub fn channel_settings(&self, index: usize) -> SensorResult<ChannelSettings> {
        check_index(index)?;
        Ok(self.lock().channels[index].settings())
    }

    pub fn set_channel_settings(&self, index: usize, settings: ChannelSettings) -> SensorResult<()> {
        check_index(index)?;
        self.lock().channels[index].set_settings(settings)
    }

    /// Flip whether a channel contributes to the average. Returns the new state.
    pub fn toggle_enable(&self, index: usize) -> SensorResult<bool> {
        check_index(index)?;
        let mut inner = self.lock();
        let enabled = !inner.channels[index].settings().enabled;
        inner.channels[index].set_enabled(enabled);
        debug!(channel = index + 1, enabled, "thermocouple enable toggled");
        Ok(enabled)
    }
}

fn check_index(index: usize) -> SensorResult<()> {
    if index >= CHANNELS {
        return Err(SensorError::ChannelIndex {
            index,
            len: CHANNELS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::max31855::{encode, encode_fault};

    fn fixed(t: f64) -> Box<dyn ThermocoupleChannel> {
        Box::new(move || encode(t, 25.0))
    }

    fn faulted(status: ThermocoupleStatus) -> Box<dyn ThermocoupleChannel> {
        Box::new(move || encode_fault(status, 25.0))
    }

    #[test]
    fn averages_healthy_channels() {
        let agg = TemperatureAggregator::new([
            fixed(100.0),
            fixed(102.0),
            faulted(ThermocoupleStatus::Open),
            fixed(104.0),
        ]);
        assert_eq!(agg.get_temperature(), 102.0);
        let m = agg.last_measurement();
        assert_eq!(m.healthy_channels(), 3);
        assert_eq!(m.channels[2].status, ThermocoupleStatus::Open);
        assert!(m.channels[2].temperature.is_nan());
    }

    #[test]
    fn oversamples_each_channel() {
        let mut n = 0u32;
        let ramp: Box<dyn ThermocoupleChannel> = Box::new(move || {
            n += 1;
            encode(100.0 + n as f64, 25.0)
        });
        let agg = TemperatureAggregator::new([
            ramp,
            faulted(ThermocoupleStatus::Missing),
            faulted(ThermocoupleStatus::Missing),
            faulted(ThermocoupleStatus::Missing),
        ]);
        // 101, 102, 103, 104
        assert_eq!(agg.get_temperature(), 102.5);
    }

    #[test]
    fn fault_within_burst_marks_channel() {
        let mut n = 0u32;
        let flaky: Box<dyn ThermocoupleChannel> = Box::new(move || {
            n += 1;
            if n == 2 {
                encode_fault(ThermocoupleStatus::ShortToGnd, 25.0)
            } else {
                encode(150.0, 25.0)
            }
        });
        let agg = TemperatureAggregator::new([flaky, fixed(150.0), fixed(150.0), fixed(150.0)]);
        let m = agg.update_measurements();
        assert_eq!(m.channels[0].status, ThermocoupleStatus::ShortToGnd);
        assert_eq!(m.average, 150.0);
    }

    #[test]
    fn no_healthy_channel_is_nan() {
        let agg = TemperatureAggregator::new([
            faulted(ThermocoupleStatus::Open),
            faulted(ThermocoupleStatus::ShortToVcc),
            faulted(ThermocoupleStatus::ShortToGnd),
            faulted(ThermocoupleStatus::Missing),
        ]);
        assert!(agg.get_temperature().is_nan());
    }

    #[test]
    fn disabled_channels_are_excluded() {
        let agg = TemperatureAggregator::new([fixed(100.0), fixed(200.0), fixed(100.0), fixed(100.0)]);
        assert_eq!(agg.toggle_enable(1), Ok(false));
        assert_eq!(agg.get_temperature(), 100.0);
        assert_eq!(
            agg.last_measurement().channels[1].status,
            ThermocoupleStatus::Disabled
        );
        for i in [0, 2, 3] {
            agg.toggle_enable(i).unwrap();
        }
        assert!(agg.get_temperature().is_nan());
    }

    #[test]
    fn case_temperature_from_first_cold_junction() {
        let agg = TemperatureAggregator::new([fixed(100.0), fixed(100.0), fixed(100.0), fixed(100.0)]);
        assert!(agg.case_temperature().is_nan());
        agg.update_measurements();
        assert_eq!(agg.case_temperature(), 25.0);
    }

    #[test]
    fn bad_index_rejected() {
        let agg = TemperatureAggregator::new([fixed(1.0), fixed(1.0), fixed(1.0), fixed(1.0)]);
        assert!(matches!(
            agg.toggle_enable(4),
            Err(SensorError::ChannelIndex { index: 4, len: 4 })
        ));
    }
}
