//! Heater and fan outputs, and the audible signal.

use std::sync::atomic::{AtomicU8, Ordering};

use rf_controls::Duty;
use tracing::info;

use crate::runner::RunOutcome;

/// Duty-cycle outputs of the oven.
pub trait OvenControl: Send + Sync {
    fn set_heater_duty(&self, percent: u8);
    fn set_fan_duty(&self, percent: u8);
    fn heater_duty(&self) -> u8;
    fn fan_duty(&self) -> u8;

    fn apply(&self, duty: Duty) {
        self.set_heater_duty(duty.heater);
        self.set_fan_duty(duty.fan);
    }

    fn duty(&self) -> Duty {
        Duty {
            heater: self.heater_duty(),
            fan: self.fan_duty(),
        }
    }
}

/// Output registers with no hardware behind them.
#[derive(Debug, Default)]
pub struct DutyRegister {
    heater: AtomicU8,
    fan: AtomicU8,
}

impl DutyRegister {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OvenControl for DutyRegister {
    fn set_heater_duty(&self, percent: u8) {
        self.heater.store(percent.min(100), Ordering::Relaxed);
    }

    fn set_fan_duty(&self, percent: u8) {
        self.fan.store(percent.min(100), Ordering::Relaxed);
    }

    fn heater_duty(&self) -> u8 {
        self.heater.load(Ordering::Relaxed)
    }

    fn fan_duty(&self) -> u8 {
        self.fan.load(Ordering::Relaxed)
    }
}

/// Signals the end of a run to the operator.
pub trait Annunciator: Send + Sync {
    fn announce(&self, outcome: RunOutcome);
}

/// Writes the announcement to the log instead of a buzzer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAnnunciator;

impl Annunciator for LogAnnunciator {
    fn announce(&self, outcome: RunOutcome) {
        info!(?outcome, "beep");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_clamps_to_100() {
        let r = DutyRegister::new();
        r.apply(Duty { heater: 150, fan: 40 });
        assert_eq!(r.duty(), Duty { heater: 100, fan: 40 });
    }
}
