//! Manual oven control.
//!
//! The operator either holds a setpoint with the PID (heating) or runs the
//! fan at a chosen speed with the heater off. The keypad maps as follows:
//!
//! | key    | heating          | not heating           |
//! |--------|------------------|-----------------------|
//! | F1     | ignored          | fan on/off            |
//! | F2     | heating off      | heating on            |
//! | F3     | setpoint +5 °C   | fan speed +1 %        |
//! | F4     | setpoint -5 °C   | fan speed -1 %        |
//! | select | leave manual mode, everything off        |
//!
//! Continuous heating is capped at `max_heater_time_s`; past it the PID is
//! disabled and the heater switched off.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

use rf_controls::{Duty, MixerConfig, OutputMixer, PidConfig, PidController};
use rf_sensors::TemperatureAggregator;
use tracing::{debug, info, warn};

use crate::buttons::{Button, ButtonValue};
use crate::config::OvenConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::oven::OvenControl;
use crate::reporter::{DataPoint, Reporter, RunPhase, StatusReport};
use crate::runner::{BoxedPid, Peripherals, RunHandle};
use crate::timer::TickCallback;

pub const INITIAL_SETPOINT_C: f64 = 100.0;
pub const SETPOINT_STEP_C: f64 = 5.0;
pub const MAX_SETPOINT_C: f64 = 255.0;
pub const INITIAL_FAN_SPEED: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualOptions {
    pub pid: PidConfig,
    pub mixer: MixerConfig,
    pub tick_period: Duration,
    pub supervisor_period: Duration,
    pub max_heater_time_s: f64,
}

impl Default for ManualOptions {
    fn default() -> Self {
        let config = OvenConfig::default();
        Self {
            pid: PidConfig::default(),
            mixer: config.fan,
            tick_period: config.tick_period(),
            supervisor_period: config.supervisor_period(),
            max_heater_time_s: f64::from(config.manual.max_heater_time_s),
        }
    }
}

impl ManualOptions {
    pub fn from_config(config: &OvenConfig) -> RunnerResult<Self> {
        config.validate()?;
        Ok(Self {
            pid: config.pid_config()?,
            mixer: config.fan,
            tick_period: config.tick_period(),
            supervisor_period: config.supervisor_period(),
            max_heater_time_s: f64::from(config.manual.max_heater_time_s),
        })
    }

    fn validate(&self) -> RunnerResult<()> {
        self.pid.validate()?;
        self.mixer.validate()?;
        if !self.max_heater_time_s.is_finite() || self.max_heater_time_s <= 0.0 {
            return Err(RunnerError::Config {
                what: format!("max heater time {} must be positive", self.max_heater_time_s),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualSummary {
    pub elapsed_s: u32,
    /// Whether the heater time cap switched heating off at least once.
    pub heater_timed_out: bool,
    pub skipped_ticks: u32,
}

/// Snapshot handed back to the supervisory loop after a key is handled.
#[derive(Debug, Clone, Copy)]
struct Published {
    elapsed_s: u32,
    setpoint: f64,
    phase: RunPhase,
}

/// State shared by the tick handler and the keypad.
struct ManualContext {
    pid: BoxedPid,
    heating: bool,
    fan_speed: u8,
    elapsed_s: u32,
    heater_timed_out: bool,
    max_heater_time_s: f64,
    sensors: Arc<TemperatureAggregator>,
    oven: Arc<dyn OvenControl>,
    reporter: Arc<dyn Reporter>,
    handle: RunHandle,
}

impl ManualContext {
    fn new(options: &ManualOptions, p: &Peripherals, handle: RunHandle) -> RunnerResult<Self> {
        let mixer = OutputMixer::new(options.mixer)?;
        let source: Box<dyn FnMut() -> f64 + Send> = {
            let sensors = Arc::clone(&p.sensors);
            Box::new(move || sensors.get_temperature())
        };
        let sink: Box<dyn FnMut(f64) + Send> = {
            let oven = Arc::clone(&p.oven);
            Box::new(move |output: f64| oven.apply(mixer.mix(output)))
        };
        let mut pid = PidController::new(options.pid, source, sink);
        pid.set_setpoint(INITIAL_SETPOINT_C);

        Ok(Self {
            pid,
            heating: false,
            fan_speed: INITIAL_FAN_SPEED,
            elapsed_s: 0,
            heater_timed_out: false,
            max_heater_time_s: options.max_heater_time_s,
            sensors: Arc::clone(&p.sensors),
            oven: Arc::clone(&p.oven),
            reporter: Arc::clone(&p.reporter),
            handle,
        })
    }

    fn phase(&self) -> RunPhase {
        if self.heating { RunPhase::Manual } else { RunPhase::Off }
    }

    fn published(&self) -> Published {
        Published {
            elapsed_s: self.elapsed_s,
            setpoint: self.pid.setpoint(),
            phase: self.phase(),
        }
    }

    fn tick(&mut self) {
        self.elapsed_s = self.elapsed_s.saturating_add(1);
        if self.heating {
            self.pid.update();
            if self.pid.elapsed_time() >= self.max_heater_time_s {
                warn!(
                    on_time = self.pid.elapsed_time(),
                    limit = self.max_heater_time_s,
                    "heater time limit reached; heating off"
                );
                self.heater_timed_out = true;
                self.stop_heating();
            }
        } else {
            self.sensors.update_measurements();
        }

        let published = self.published();
        self.handle.publish(published.elapsed_s, published.setpoint);
        self.handle.set_phase(published.phase);
        let point = DataPoint::new(
            self.elapsed_s,
            published.phase,
            published.setpoint,
            self.oven.duty(),
            &self.sensors.last_measurement(),
        );
        self.reporter.add_log_point(&point);
    }

    fn start_heating(&mut self) {
        self.heating = true;
        self.pid.enable(true);
        info!(setpoint = self.pid.setpoint(), "manual heating on");
    }

    /// Heater off; the fan keeps whatever speed the controller left it at.
    fn stop_heating(&mut self) {
        self.fan_speed = self.oven.fan_duty();
        self.heating = false;
        self.pid.enable(false);
        self.oven.set_heater_duty(0);
        info!(fan = self.fan_speed, "manual heating off");
    }

    fn set_fan_speed(&mut self, speed: u8) {
        self.fan_speed = speed;
        self.oven.set_fan_duty(speed);
    }

    fn press(&mut self, key: ButtonValue) -> Published {
        let sp = self.pid.setpoint();
        match (key.button, self.heating) {
            (Button::F1, false) if !key.repeating => {
                let fan = if self.oven.fan_duty() > 0 { 0 } else { self.fan_speed };
                self.oven.set_fan_duty(fan);
            }
            (Button::F2, true) if !key.repeating => self.stop_heating(),
            (Button::F2, false) if !key.repeating => self.start_heating(),
            (Button::F3, true) if sp < MAX_SETPOINT_C => {
                self.pid.set_setpoint((sp + SETPOINT_STEP_C).min(MAX_SETPOINT_C));
            }
            (Button::F4, true) if sp > 0.0 => {
                self.pid.set_setpoint((sp - SETPOINT_STEP_C).max(0.0));
            }
            (Button::F3, false) if self.fan_speed < 100 => self.set_fan_speed(self.fan_speed + 1),
            (Button::F4, false) if self.fan_speed > 0 => self.set_fan_speed(self.fan_speed - 1),
            _ => {}
        }
        debug!(?key, setpoint = self.pid.setpoint(), fan = self.fan_speed, "manual key");
        self.published()
    }

    fn shut_down(&mut self) {
        self.heating = false;
        self.pid.set_setpoint(0.0);
        self.pid.enable(false);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs the oven under operator control until select is pressed.
pub struct ManualController {
    peripherals: Peripherals,
    options: ManualOptions,
    handle: RunHandle,
    skipped_ticks: Arc<AtomicU32>,
}

impl ManualController {
    pub fn new(peripherals: Peripherals, options: ManualOptions) -> RunnerResult<Self> {
        options.validate()?;
        Ok(Self {
            peripherals,
            options,
            handle: RunHandle::default(),
            skipped_ticks: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Status view; [`RunHandle::abort`] leaves manual mode like select.
    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    pub fn options(&self) -> &ManualOptions {
        &self.options
    }

    /// Blocks until the operator presses select or the handle is aborted.
    /// Heater and fan are off on return.
    pub fn run(&self) -> RunnerResult<ManualSummary> {
        let p = &self.peripherals;
        if p.sensors.get_temperature().is_nan() {
            p.reporter.message("No thermocouples available");
            return Err(RunnerError::NoThermocouples);
        }

        self.handle.reset();
        self.handle.publish(0, INITIAL_SETPOINT_C);
        self.skipped_ticks.store(0, Ordering::Relaxed);
        let context = Arc::new(Mutex::new(ManualContext::new(
            &self.options,
            p,
            self.handle.clone(),
        )?));

        p.timer.set_period(self.options.tick_period);
        p.timer.set_callback(Some(self.tick_callback(Arc::clone(&context))));
        p.timer.enable_channel(true);
        p.timer.enable_interrupts(true);
        info!(max_heater_time_s = self.options.max_heater_time_s, "manual mode started");

        self.supervise(&context);

        p.timer.enable_interrupts(false);
        p.timer.enable_channel(false);
        p.timer.set_callback(None);
        let mut ctx = lock(&context);
        ctx.shut_down();
        p.oven.apply(Duty::OFF);
        self.handle.publish(ctx.elapsed_s, 0.0);
        self.handle.set_phase(RunPhase::Off);

        let summary = ManualSummary {
            elapsed_s: ctx.elapsed_s,
            heater_timed_out: ctx.heater_timed_out,
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
        };
        info!(?summary, "manual mode ended");
        Ok(summary)
    }

    fn tick_callback(&self, context: Arc<Mutex<ManualContext>>) -> TickCallback {
        let skipped = Arc::clone(&self.skipped_ticks);
        Box::new(move || {
            let mut ctx = match context.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(p)) => p.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    skipped.fetch_add(1, Ordering::Relaxed);
                    warn!("manual tick skipped: keypad busy");
                    return;
                }
            };
            ctx.tick();
        })
    }

    fn supervise(&self, context: &Mutex<ManualContext>) {
        let p = &self.peripherals;
        loop {
            if self.handle.abort_requested() {
                info!("manual mode ended remotely");
                return;
            }
            self.report_status();

            let Some(key) = p.buttons.get_button(self.options.supervisor_period) else {
                continue;
            };
            if key.is_press_of(Button::Select) {
                return;
            }
            // Published outside the lock so a reader that sees the change can
            // fire the next tick without contending with the keypad.
            let published = lock(context).press(key);
            self.handle.publish(published.elapsed_s, published.setpoint);
            self.handle.set_phase(published.phase);
        }
    }

    fn report_status(&self) {
        let p = &self.peripherals;
        p.reporter.report_thermocouple_status(&StatusReport {
            elapsed_s: self.handle.elapsed_s(),
            phase: self.handle.phase(),
            setpoint: self.handle.setpoint(),
            duty: p.oven.duty(),
            measurement: p.sensors.last_measurement(),
            case_temperature: p.sensors.case_temperature(),
        });
    }
}
