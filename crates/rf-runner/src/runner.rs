//! The profile runner: ties the sequencer, PID, mixer and peripherals together
//! under a periodic tick.
//!
//! A run has two execution contexts:
//! - the tick handler, fired by the [`PeriodicTimer`]. It owns the
//!   [`TickContext`] and never waits on a lock;
//! - the supervisory loop inside [`ProfileRunner::run`], which reports status,
//!   polls the keypad and performs the exit sequence.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

use rf_controls::{Duty, MixerConfig, OutputMixer, PidConfig, PidController};
use rf_core::{FanSpeed, TickTimer};
use rf_profile::{SolderProfile, target_curve, validate_profile};
use rf_sensors::TemperatureAggregator;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::buttons::{Button, ButtonSource};
use crate::config::OvenConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::oven::{Annunciator, OvenControl};
use crate::reporter::{DataPoint, PlotBuffer, Reporter, RunPhase, StatusReport};
use crate::sequencer::{ProfileSequencer, TickAction, capture_ambient};
use crate::timer::PeriodicTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// The stop point was reached; the oven cools passively.
    Completed,
    /// The operator or a remote request ended the run; full fan.
    Aborted,
}

impl RunOutcome {
    pub fn phase(self) -> RunPhase {
        match self {
            RunOutcome::Completed => RunPhase::Complete,
            RunOutcome::Aborted => RunPhase::Aborted,
        }
    }
}

/// Everything the runner drives or listens to.
#[derive(Clone)]
pub struct Peripherals {
    pub sensors: Arc<TemperatureAggregator>,
    pub oven: Arc<dyn OvenControl>,
    pub timer: Arc<dyn PeriodicTimer>,
    pub buttons: Arc<dyn ButtonSource>,
    pub reporter: Arc<dyn Reporter>,
    pub annunciator: Arc<dyn Annunciator>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerOptions {
    pub pid: PidConfig,
    pub mixer: MixerConfig,
    pub tick_period: Duration,
    pub supervisor_period: Duration,
    pub ambient_clamp_c: f64,
    pub await_acknowledge: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        let config = OvenConfig::default();
        Self {
            pid: PidConfig::default(),
            mixer: config.fan,
            tick_period: config.tick_period(),
            supervisor_period: config.supervisor_period(),
            ambient_clamp_c: config.run.ambient_clamp_c,
            await_acknowledge: config.run.await_acknowledge,
        }
    }
}

impl RunnerOptions {
    pub fn from_config(config: &OvenConfig) -> RunnerResult<Self> {
        config.validate()?;
        Ok(Self {
            pid: config.pid_config()?,
            mixer: config.fan,
            tick_period: config.tick_period(),
            supervisor_period: config.supervisor_period(),
            ambient_clamp_c: config.run.ambient_clamp_c,
            await_acknowledge: config.run.await_acknowledge,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub profile: String,
    pub ambient_c: f64,
    pub elapsed_s: u32,
    pub ticks: u64,
    pub worst_tick: Duration,
    pub skipped_ticks: u32,
}

#[derive(Default)]
struct HandleShared {
    abort: AtomicBool,
    acknowledge: AtomicBool,
    phase: AtomicU8,
    elapsed_s: AtomicU32,
    setpoint: AtomicU64,
}

/// Cross-context view of the current run: status plus abort and acknowledge.
///
/// Cloned freely; suitable for a remote-control path.
#[derive(Clone, Default)]
pub struct RunHandle {
    shared: Arc<HandleShared>,
}

impl RunHandle {
    /// Ask the run to stop. Observed at the next tick or supervisory cycle.
    pub fn abort(&self) {
        self.shared.abort.store(true, Ordering::SeqCst);
    }

    pub fn abort_requested(&self) -> bool {
        self.shared.abort.load(Ordering::SeqCst)
    }

    /// Remote equivalent of pressing select on the end-of-run screen.
    pub fn acknowledge(&self) {
        self.shared.acknowledge.store(true, Ordering::SeqCst);
    }

    pub fn phase(&self) -> RunPhase {
        match self.shared.phase.load(Ordering::SeqCst) {
            1 => RunPhase::Running,
            2 => RunPhase::Complete,
            3 => RunPhase::Aborted,
            4 => RunPhase::Manual,
            _ => RunPhase::Off,
        }
    }

    pub fn elapsed_s(&self) -> u32 {
        self.shared.elapsed_s.load(Ordering::SeqCst)
    }

    /// Setpoint applied by the most recent tick.
    pub fn setpoint(&self) -> f64 {
        f64::from_bits(self.shared.setpoint.load(Ordering::SeqCst))
    }

    pub(crate) fn publish(&self, elapsed_s: u32, setpoint: f64) {
        self.shared.elapsed_s.store(elapsed_s, Ordering::SeqCst);
        self.shared.setpoint.store(setpoint.to_bits(), Ordering::SeqCst);
    }

    pub(crate) fn set_phase(&self, phase: RunPhase) {
        let raw = match phase {
            RunPhase::Off => 0,
            RunPhase::Running => 1,
            RunPhase::Complete => 2,
            RunPhase::Aborted => 3,
            RunPhase::Manual => 4,
        };
        self.shared.phase.store(raw, Ordering::SeqCst);
    }

    pub(crate) fn reset(&self) {
        self.shared.abort.store(false, Ordering::SeqCst);
        self.shared.acknowledge.store(false, Ordering::SeqCst);
        self.publish(0, 0.0);
        self.set_phase(RunPhase::Off);
    }

    fn take_acknowledge(&self) -> bool {
        self.shared.acknowledge.swap(false, Ordering::SeqCst)
    }
}

/// Fan hint handed from the sequencer to the mixer sink within one tick.
struct FanHintCell(AtomicU8);

impl FanHintCell {
    fn set(&self, fan: FanSpeed) {
        let raw = match fan {
            FanSpeed::Low => 0,
            FanSpeed::Medium => 1,
            FanSpeed::High => 2,
        };
        self.0.store(raw, Ordering::Relaxed);
    }

    fn get(&self) -> FanSpeed {
        match self.0.load(Ordering::Relaxed) {
            0 => FanSpeed::Low,
            1 => FanSpeed::Medium,
            _ => FanSpeed::High,
        }
    }
}

pub(crate) type BoxedPid = PidController<Box<dyn FnMut() -> f64 + Send>, Box<dyn FnMut(f64) + Send>>;

/// State owned by the tick handler for the duration of one run.
pub struct TickContext {
    sequencer: ProfileSequencer,
    pid: BoxedPid,
    fan_hint: Arc<FanHintCell>,
    sensors: Arc<TemperatureAggregator>,
    oven: Arc<dyn OvenControl>,
    reporter: Arc<dyn Reporter>,
    plot: Arc<PlotBuffer>,
    handle: RunHandle,
}

impl TickContext {
    fn new(
        sequencer: ProfileSequencer,
        options: &RunnerOptions,
        p: &Peripherals,
        plot: Arc<PlotBuffer>,
        handle: RunHandle,
    ) -> RunnerResult<Self> {
        let mixer = OutputMixer::new(options.mixer)?;
        let fan_hint = Arc::new(FanHintCell(AtomicU8::new(0)));

        let source: Box<dyn FnMut() -> f64 + Send> = {
            let sensors = Arc::clone(&p.sensors);
            Box::new(move || sensors.get_temperature())
        };
        let sink: Box<dyn FnMut(f64) + Send> = {
            let oven = Arc::clone(&p.oven);
            let hint = Arc::clone(&fan_hint);
            Box::new(move |output: f64| oven.apply(mixer.mix_with_hint(output, hint.get())))
        };

        let mut pid = PidController::new(options.pid, source, sink);
        pid.set_setpoint(sequencer.initial_setpoint());
        pid.enable(true);

        Ok(Self {
            sequencer,
            pid,
            fan_hint,
            sensors: Arc::clone(&p.sensors),
            oven: Arc::clone(&p.oven),
            reporter: Arc::clone(&p.reporter),
            plot,
            handle,
        })
    }

    pub fn sequencer(&self) -> &ProfileSequencer {
        &self.sequencer
    }

    pub fn setpoint(&self) -> f64 {
        self.pid.setpoint()
    }

    /// One control period: advance, interpolate, control, mix, record.
    pub fn tick(&mut self) {
        if self.handle.abort_requested() {
            self.sequencer.abort();
        }
        match self.sequencer.tick() {
            TickAction::Idle => {}
            TickAction::Complete => {
                self.pid.set_setpoint(0.0);
                self.handle.publish(self.sequencer.state().elapsed_s, 0.0);
                self.handle.set_phase(RunPhase::Complete);
                info!(t = self.sequencer.state().elapsed_s, "profile complete");
            }
            TickAction::Setpoint { setpoint, fan } => {
                self.fan_hint.set(fan);
                self.pid.set_setpoint(setpoint);
                self.pid.update();

                let elapsed = self.sequencer.state().elapsed_s;
                self.handle.publish(elapsed, setpoint);
                let point = DataPoint::new(
                    elapsed,
                    RunPhase::Running,
                    setpoint,
                    self.oven.duty(),
                    &self.sensors.last_measurement(),
                );
                self.plot.record(point);
                self.reporter.add_log_point(&point);
            }
        }
    }

    /// First half of the exit sequence: stop the sequence and the controller.
    fn shut_down(&mut self) {
        self.sequencer.abort();
        self.pid.set_setpoint(0.0);
        self.pid.enable(false);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Executes solder profiles on an oven.
pub struct ProfileRunner {
    peripherals: Peripherals,
    options: RunnerOptions,
    context: Arc<Mutex<Option<TickContext>>>,
    plot: Arc<PlotBuffer>,
    handle: RunHandle,
    tick_stats: Arc<TickTimer>,
    skipped_ticks: Arc<AtomicU32>,
}

impl ProfileRunner {
    pub fn new(peripherals: Peripherals, options: RunnerOptions) -> RunnerResult<Self> {
        options.pid.validate()?;
        options.mixer.validate()?;
        Ok(Self {
            peripherals,
            options,
            context: Arc::new(Mutex::new(None)),
            plot: Arc::new(PlotBuffer::new()),
            handle: RunHandle::default(),
            tick_stats: Arc::new(TickTimer::new()),
            skipped_ticks: Arc::new(AtomicU32::new(0)),
        })
    }

    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    pub fn plot(&self) -> Arc<PlotBuffer> {
        Arc::clone(&self.plot)
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Execute `profile` to completion or abort.
    ///
    /// Blocks the calling thread, which becomes the supervisory loop. Returns
    /// after the operator acknowledges the outcome (unless disabled in the
    /// options).
    pub fn run(&self, profile: &SolderProfile) -> RunnerResult<RunSummary> {
        validate_profile(profile)?;
        let ambient = self.begin(profile)?;
        let outcome = self.supervise();
        self.finish(outcome);

        let elapsed_s = lock(&self.context)
            .take()
            .map_or(0, |c| c.sequencer.state().elapsed_s);
        Ok(RunSummary {
            outcome,
            profile: profile.description.clone(),
            ambient_c: ambient,
            elapsed_s,
            ticks: self.tick_stats.count(),
            worst_tick: self.tick_stats.worst(),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
        })
    }

    fn begin(&self, profile: &SolderProfile) -> RunnerResult<f64> {
        let p = &self.peripherals;
        let mut context = lock(&self.context);
        if context.is_some() {
            return Err(RunnerError::Busy);
        }

        let raw = p.sensors.get_temperature();
        if raw.is_nan() {
            p.reporter.message("No thermocouples available");
            return Err(RunnerError::NoThermocouples);
        }
        let ambient = capture_ambient(raw, self.options.ambient_clamp_c);

        self.plot.reset();
        self.plot.prefill_targets(&target_curve(profile, ambient));
        self.handle.reset();
        self.tick_stats.reset();
        self.skipped_ticks.store(0, Ordering::Relaxed);

        let sequencer = ProfileSequencer::new(profile.clone(), ambient);
        self.handle.publish(0, sequencer.initial_setpoint());
        *context = Some(TickContext::new(
            sequencer,
            &self.options,
            p,
            Arc::clone(&self.plot),
            self.handle.clone(),
        )?);
        drop(context);

        self.handle.set_phase(RunPhase::Running);
        p.timer.set_period(self.options.tick_period);
        p.timer.set_callback(Some(self.tick_callback()));
        p.timer.enable_channel(true);
        p.timer.enable_interrupts(true);

        info!(profile = %profile.description, ambient, raw, "run started");
        Ok(ambient)
    }

    fn tick_callback(&self) -> crate::timer::TickCallback {
        let context = Arc::clone(&self.context);
        let stats = Arc::clone(&self.tick_stats);
        let skipped = Arc::clone(&self.skipped_ticks);
        let period = self.options.tick_period;

        Box::new(move || {
            let mut guard = match context.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(p)) => p.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    skipped.fetch_add(1, Ordering::Relaxed);
                    warn!("tick skipped: run context busy");
                    return;
                }
            };
            let Some(ctx) = guard.as_mut() else {
                return;
            };
            let ((), took) = stats.measure(|| ctx.tick());
            if took > period {
                warn!(?took, ?period, "tick overran its period");
            }
        })
    }

    /// Normal-priority loop: status at the supervisory cadence, keypad, abort.
    fn supervise(&self) -> RunOutcome {
        let p = &self.peripherals;
        loop {
            match self.handle.phase() {
                RunPhase::Complete => return RunOutcome::Completed,
                RunPhase::Aborted => return RunOutcome::Aborted,
                _ => {}
            }
            if self.handle.abort_requested() {
                info!("abort requested remotely");
                return RunOutcome::Aborted;
            }

            self.report_status();

            let Some(key) = p.buttons.get_button(self.options.supervisor_period) else {
                continue;
            };
            if key.is_press_of(Button::Select) {
                info!("run aborted by operator");
                return RunOutcome::Aborted;
            }
            if key.is_press_of(Button::F4) {
                let mode = p.reporter.display_mode().toggled();
                p.reporter.set_display_mode(mode);
                debug!(?mode, "display mode changed");
            }
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

    /// Exit sequence shared by completion and abort.
    fn finish(&self, outcome: RunOutcome) {
        let p = &self.peripherals;

        let (elapsed_s, target) = {
            let mut context = lock(&self.context);
            match context.as_mut() {
                Some(ctx) => {
                    ctx.shut_down();
                    (ctx.sequencer().state().elapsed_s, ctx.setpoint())
                }
                None => (0, 0.0),
            }
        };
        p.oven.set_heater_duty(0);

        p.timer.enable_interrupts(false);
        p.timer.enable_channel(false);
        p.timer.set_callback(None);

        p.oven.set_fan_duty(match outcome {
            RunOutcome::Completed => 0,
            RunOutcome::Aborted => 100,
        });
        self.handle.set_phase(outcome.phase());

        let point = DataPoint::new(
            elapsed_s,
            outcome.phase(),
            target,
            p.oven.duty(),
            &p.sensors.last_measurement(),
        );
        self.plot.record(point);
        p.reporter.add_log_point(&point);

        info!(
            ?outcome,
            elapsed_s,
            ticks = self.tick_stats.count(),
            worst_tick = ?self.tick_stats.worst(),
            "run finished"
        );
        p.annunciator.announce(outcome);
        p.reporter.message(match outcome {
            RunOutcome::Completed => "Profile complete. Press select to exit.",
            RunOutcome::Aborted => "Profile aborted. Press select to exit.",
        });

        if self.options.await_acknowledge {
            self.await_acknowledge();
        }
        p.oven.apply(Duty::OFF);
    }

    fn await_acknowledge(&self) {
        let p = &self.peripherals;
        loop {
            if self.handle.take_acknowledge() {
                return;
            }
            if let Some(key) = p.buttons.get_button(self.options.supervisor_period) {
                if key.is_press_of(Button::Select) {
                    return;
                }
            }
            self.report_status();
        }
    }
}
