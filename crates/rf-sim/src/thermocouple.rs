//! MAX31855 channels that sample the simulated plant.

use std::sync::{Arc, Mutex, PoisonError};

use rf_sensors::max31855::{encode, encode_fault};
use rf_sensors::{CHANNELS, ThermocoupleChannel, ThermocoupleStatus};
use tracing::info;

use crate::error::{SimError, SimResult};
use crate::oven::SimOven;

/// Shared fault injection for one channel.
#[derive(Clone, Debug, Default)]
pub struct FaultSwitch(Arc<Mutex<Option<ThermocoupleStatus>>>);

impl FaultSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `status` instead of a reading. `Ok` or `Disabled` clear the fault.
    pub fn inject(&self, status: ThermocoupleStatus) {
        let fault = status.is_fault().then_some(status);
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = fault;
    }

    pub fn clear(&self) {
        self.inject(ThermocoupleStatus::Ok);
    }

    pub fn current(&self) -> Option<ThermocoupleStatus> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One amplifier reading the plant temperature, plus a sensor bias.
pub struct SimThermocouple {
    oven: Arc<SimOven>,
    bias_c: f64,
    fault: FaultSwitch,
}

impl SimThermocouple {
    pub fn new(oven: Arc<SimOven>, bias_c: f64, fault: FaultSwitch) -> Self {
        Self { oven, bias_c, fault }
    }

    pub fn frame(&self) -> u32 {
        let cold = self.oven.ambient_c();
        match self.fault.current() {
            Some(status) => encode_fault(status, cold),
            None => encode(self.oven.temperature_c() + self.bias_c, cold),
        }
    }

    pub fn into_channel(self) -> Box<dyn ThermocoupleChannel> {
        Box::new(move || self.frame())
    }

    /// Four channels on one oven with the given biases. Returns the fault
    /// switches alongside.
    pub fn bank(
        oven: &Arc<SimOven>,
        biases: [f64; CHANNELS],
    ) -> ([Box<dyn ThermocoupleChannel>; CHANNELS], [FaultSwitch; CHANNELS]) {
        let faults: [FaultSwitch; CHANNELS] = Default::default();
        let channels = std::array::from_fn(|i| {
            SimThermocouple::new(Arc::clone(oven), biases[i], faults[i].clone()).into_channel()
        });
        (channels, faults)
    }
}

/// Parse a fault injection such as `2=open` (channels are 1-based).
pub fn parse_fault(arg: &str) -> SimResult<(usize, ThermocoupleStatus)> {
    let (channel, status) = arg.split_once('=').ok_or(SimError::InvalidArg {
        what: "fault must look like CHANNEL=STATUS",
    })?;
    let channel: usize = channel.trim().parse().map_err(|_| SimError::InvalidArg {
        what: "fault channel must be a number",
    })?;
    if channel == 0 || channel > CHANNELS {
        return Err(SimError::ChannelIndex { index: channel });
    }
    let status = match status.trim().to_ascii_lowercase().as_str() {
        "open" => ThermocoupleStatus::Open,
        "vcc" => ThermocoupleStatus::ShortToVcc,
        "gnd" => ThermocoupleStatus::ShortToGnd,
        "missing" => ThermocoupleStatus::Missing,
        _ => {
            return Err(SimError::InvalidArg {
                what: "fault status must be open, vcc, gnd or missing",
            });
        }
    };
    info!(channel, %status, "fault injected");
    Ok((channel - 1, status))
}
