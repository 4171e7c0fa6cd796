//! Terminal stand-ins for the display and keypad.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;

use rf_runner::{Button, ButtonSender, ButtonValue, DataPoint, DisplayMode, Reporter, StatusReport};

/// Prints one status line per supervisory cycle.
#[derive(Default)]
pub struct ConsoleReporter {
    mode: AtomicU8,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(r: &StatusReport) -> String {
        let cells: Vec<String> = r
            .measurement
            .channels
            .iter()
            .map(|c| {
                if c.status.is_ok() {
                    format!("{:>6.1}", c.temperature)
                } else {
                    format!("{:>6}", c.status.short_name())
                }
            })
            .collect();
        cells.join(" ")
    }

    fn plot(r: &StatusReport) -> String {
        let width = 40usize;
        let scale = |t: f64| -> usize {
            if t.is_finite() {
                ((t / 300.0 * width as f64).round().max(0.0) as usize).min(width)
            } else {
                0
            }
        };
        let actual = scale(r.measurement.average);
        let target = scale(r.setpoint);
        (0..=width)
            .map(|i| match (i == target, i == actual) {
                (_, true) => '*',
                (true, false) => '|',
                _ => '.',
            })
            .collect()
    }
}

impl Reporter for ConsoleReporter {
    fn add_log_point(&self, _point: &DataPoint) {}

    fn report_thermocouple_status(&self, r: &StatusReport) {
        let body = match self.display_mode() {
            DisplayMode::Table => Self::table(r),
            DisplayMode::Plot => Self::plot(r),
        };
        print!(
            "\r{:>4}s {:<8} set {:>6.1}  avg {:>6.1}  H{:>3}% F{:>3}%  {}   ",
            r.elapsed_s,
            format!("{:?}", r.phase),
            r.setpoint,
            r.measurement.average,
            r.duty.heater,
            r.duty.fan,
            body,
        );
        let _ = io::stdout().flush();
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
        println!("\n{text}");
    }
}

/// Map typed keys to buttons: `1`..`4` for F1..F4, anything else is select.
pub fn spawn_keyboard(sender: ButtonSender) {
    let spawned = thread::Builder::new()
        .name("rf-keys".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let button = match line.trim() {
                    "1" => Button::F1,
                    "2" => Button::F2,
                    "3" => Button::F3,
                    "4" => Button::F4,
                    _ => Button::Select,
                };
                sender.push(ButtonValue::pressed(button));
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "keyboard input unavailable");
    }
}
