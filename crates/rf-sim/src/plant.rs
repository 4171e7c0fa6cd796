//! Lumped thermal model of the oven chamber.
//!
//! dT/dt = (P_rated * element - (k_passive + k_fan * fan) * (T - T_amb)) / C

use rf_controls::Duty;
use rf_core::{HeatCapacity, Power, Temperature, Time, as_degc, degc, j_per_k, s, w};

use crate::element::{ElementState, HeaterElement};
use crate::error::{SimError, SimResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OvenParams {
    pub heater_power: Power,
    pub heat_capacity: HeatCapacity,
    /// Loss through the walls with the fan off (W/K).
    pub passive_loss: f64,
    /// Additional loss at full fan (W/K).
    pub fan_loss: f64,
    /// Heating element lag.
    pub element_tau: Time,
    pub ambient: Temperature,
}

impl Default for OvenParams {
    fn default() -> Self {
        Self {
            heater_power: w(1500.0),
            heat_capacity: j_per_k(600.0),
            passive_loss: 4.0,
            fan_loss: 5.0,
            element_tau: s(5.0),
            ambient: degc(25.0),
        }
    }
}

impl OvenParams {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.heater_power.value > 0.0) {
            return Err(SimError::InvalidArg {
                what: "heater_power must be positive",
            });
        }
        if !(self.heat_capacity.value > 0.0) {
            return Err(SimError::InvalidArg {
                what: "heat_capacity must be positive",
            });
        }
        if !(self.passive_loss >= 0.0 && self.fan_loss >= 0.0) {
            return Err(SimError::InvalidArg {
                what: "loss coefficients must be non-negative",
            });
        }
        if !as_degc(self.ambient).is_finite() {
            return Err(SimError::InvalidArg {
                what: "ambient must be finite",
            });
        }
        Ok(())
    }

    /// Steady-state chamber temperature for a constant duty, in degC.
    pub fn steady_state_c(&self, duty: Duty) -> f64 {
        let k = self.loss_coefficient(duty.fan);
        let ambient = as_degc(self.ambient);
        if k <= 0.0 {
            return f64::INFINITY;
        }
        ambient + self.heater_power.value * f64::from(duty.heater) / 100.0 / k
    }

    fn loss_coefficient(&self, fan: u8) -> f64 {
        self.passive_loss + self.fan_loss * f64::from(fan.min(100)) / 100.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlantState {
    pub temperature_c: f64,
    pub element: ElementState,
    pub time_s: f64,
}

#[derive(Clone, Debug)]
pub struct OvenPlant {
    params: OvenParams,
    element: HeaterElement,
    state: PlantState,
}

impl OvenPlant {
    /// Plant at ambient with a cold element.
    pub fn new(params: OvenParams) -> SimResult<Self> {
        params.validate()?;
        let element = HeaterElement::new(params.element_tau.value, 1.0)?;
        Ok(Self {
            state: PlantState {
                temperature_c: as_degc(params.ambient),
                element: ElementState::default(),
                time_s: 0.0,
            },
            params,
            element,
        })
    }

    pub fn params(&self) -> &OvenParams {
        &self.params
    }

    pub fn state(&self) -> PlantState {
        self.state
    }

    pub fn temperature_c(&self) -> f64 {
        self.state.temperature_c
    }

    /// Force the chamber temperature, e.g. to start from a warm oven.
    pub fn set_temperature_c(&mut self, t: f64) {
        self.state.temperature_c = t;
    }

    /// Forward-Euler step of `dt` seconds under `duty`.
    pub fn step(&mut self, dt: f64, duty: Duty) {
        let p = &self.params;
        let element = self
            .element
            .step(self.state.element, dt, f64::from(duty.heater) / 100.0);

        let ambient = as_degc(p.ambient);
        let heat_in = p.heater_power.value * element.output;
        let heat_out = p.loss_coefficient(duty.fan) * (self.state.temperature_c - ambient);
        let dtdt = (heat_in - heat_out) / p.heat_capacity.value;

        self.state = PlantState {
            temperature_c: self.state.temperature_c + dtdt * dt,
            element,
            time_s: self.state.time_s + dt,
        };
    }

    /// Advance `duration` seconds in sub-steps no longer than `max_dt`.
    pub fn advance(&mut self, duration: f64, max_dt: f64, duty: Duty) {
        if !(duration > 0.0 && max_dt > 0.0) {
            return;
        }
        let steps = (duration / max_dt).ceil().max(1.0) as u32;
        let dt = duration / f64::from(steps);
        for _ in 0..steps {
            self.step(dt, duty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn idle_plant_stays_at_ambient() {
        let mut plant = OvenPlant::new(OvenParams::default()).unwrap();
        plant.advance(600.0, 0.1, Duty::OFF);
        assert!((plant.temperature_c() - 25.0).abs() < 1e-9);
        assert!((plant.state().time_s - 600.0).abs() < 1e-6);
    }

    #[test]
    fn converges_to_steady_state() {
        let params = OvenParams::default();
        let duty = Duty { heater: 50, fan: 30 };
        let mut plant = OvenPlant::new(params).unwrap();
        plant.advance(3000.0, 0.1, duty);
        let expected = params.steady_state_c(duty);
        assert!((plant.temperature_c() - expected).abs() < 0.5, "{}", plant.temperature_c());
    }

    #[test]
    fn fan_cools_towards_ambient() {
        let mut slow = OvenPlant::new(OvenParams::default()).unwrap();
        slow.set_temperature_c(200.0);
        let mut fast = slow.clone();
        slow.advance(30.0, 0.1, Duty::OFF);
        fast.advance(30.0, 0.1, Duty::FULL_COOL);
        assert!(fast.temperature_c() < slow.temperature_c());
        assert!(fast.temperature_c() > 25.0);
    }

    #[test]
    fn element_lags_command() {
        let mut plant = OvenPlant::new(OvenParams::default()).unwrap();
        plant.advance(1.0, 0.1, Duty { heater: 100, fan: 0 });
        let out = plant.state().element.output;
        assert!(out > 0.0 && out < 0.5, "{out}");
    }

    #[test]
    fn invalid_params_rejected() {
        let params = OvenParams {
            heat_capacity: j_per_k(0.0),
            ..OvenParams::default()
        };
        assert!(OvenPlant::new(params).is_err());
    }

    proptest! {
        #[test]
        fn temperature_bounded_by_ambient_and_full_power(
            heater in 0u8..=100,
            fan in 0u8..=100,
            seconds in 1.0f64..600.0,
        ) {
            let params = OvenParams::default();
            let duty = Duty { heater, fan };
            let mut plant = OvenPlant::new(params).unwrap();
            plant.advance(seconds, 0.1, duty);
            let t = plant.temperature_c();
            prop_assert!(t >= 25.0 - 1e-9);
            prop_assert!(t <= params.steady_state_c(duty) + 1e-6);
        }
    }
}
