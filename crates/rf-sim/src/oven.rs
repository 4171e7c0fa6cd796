//! Simulated oven outputs, and the thread that advances the plant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rf_controls::Duty;
use rf_runner::{DutyRegister, OvenControl};
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::plant::{OvenPlant, PlantState};

/// Integration step used when advancing the plant.
const MAX_DT_S: f64 = 0.1;

/// Heater and fan registers wired to a thermal plant.
pub struct SimOven {
    outputs: DutyRegister,
    plant: Mutex<OvenPlant>,
}

impl SimOven {
    pub fn new(plant: OvenPlant) -> Self {
        Self {
            outputs: DutyRegister::new(),
            plant: Mutex::new(plant),
        }
    }

    fn plant(&self) -> MutexGuard<'_, OvenPlant> {
        self.plant.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advance the plant by `seconds` of oven time under the current duty.
    pub fn advance(&self, seconds: f64) {
        let duty = self.outputs.duty();
        self.plant().advance(seconds, MAX_DT_S, duty);
    }

    pub fn temperature_c(&self) -> f64 {
        self.plant().temperature_c()
    }

    pub fn plant_state(&self) -> PlantState {
        self.plant().state()
    }

    pub fn set_temperature_c(&self, t: f64) {
        self.plant().set_temperature_c(t);
    }

    /// Board temperature seen by the cold junctions.
    pub fn ambient_c(&self) -> f64 {
        rf_core::as_degc(self.plant().params().ambient)
    }
}

impl OvenControl for SimOven {
    fn set_heater_duty(&self, percent: u8) {
        self.outputs.set_heater_duty(percent);
    }

    fn set_fan_duty(&self, percent: u8) {
        self.outputs.set_fan_duty(percent);
    }

    fn heater_duty(&self) -> u8 {
        self.outputs.heater_duty()
    }

    fn fan_duty(&self) -> u8 {
        self.outputs.fan_duty()
    }

    fn apply(&self, duty: Duty) {
        self.outputs.apply(duty);
    }
}

/// Advances a [`SimOven`] in scaled real time until dropped.
///
/// With `time_scale` 60, one wall-clock second covers a minute of oven time.
pub struct PlantDriver {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl PlantDriver {
    pub fn spawn(oven: Arc<SimOven>, time_scale: f64) -> SimResult<Self> {
        if !(time_scale > 0.0 && time_scale.is_finite()) {
            return Err(SimError::InvalidArg {
                what: "time_scale must be positive",
            });
        }
        let stop = Arc::new(AtomicBool::new(false));
        let wall_step = Duration::from_secs_f64(MAX_DT_S / time_scale).max(Duration::from_micros(100));
        let oven_step = wall_step.as_secs_f64() * time_scale;

        let worker = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("rf-plant".into())
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        oven.advance(oven_step);
                        thread::sleep(wall_step);
                    }
                })?
        };
        debug!(time_scale, ?wall_step, "plant driver started");
        Ok(Self {
            stop,
            worker: Some(worker),
        })
    }
}

impl Drop for PlantDriver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                debug!("plant thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plant::OvenParams;

    #[test]
    fn outputs_drive_the_plant() {
        let oven = SimOven::new(OvenPlant::new(OvenParams::default()).unwrap());
        oven.apply(Duty { heater: 100, fan: 30 });
        assert_eq!(oven.duty(), Duty { heater: 100, fan: 30 });
        oven.advance(60.0);
        assert!(oven.temperature_c() > 60.0);
    }

    #[test]
    fn driver_advances_in_background() {
        let oven = Arc::new(SimOven::new(OvenPlant::new(OvenParams::default()).unwrap()));
        oven.set_heater_duty(100);
        let driver = PlantDriver::spawn(Arc::clone(&oven), 100.0).unwrap();
        thread::sleep(Duration::from_millis(200));
        drop(driver);
        let t = oven.plant_state().time_s;
        assert!(t > 1.0, "advanced {t} s");
        assert!(oven.temperature_c() > 25.0);
    }

    #[test]
    fn rejects_bad_time_scale() {
        let oven = Arc::new(SimOven::new(OvenPlant::new(OvenParams::default()).unwrap()));
        assert!(PlantDriver::spawn(oven, 0.0).is_err());
    }
}
