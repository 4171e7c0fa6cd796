//! Periodic tick sources.
//!
//! The runner only sees [`PeriodicTimer`]. [`ThreadTimer`] fires from a
//! dedicated thread; [`ManualTimer`] fires only when told to and is used to
//! step a run deterministically.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

pub type TickCallback = Box<dyn FnMut() + Send>;

/// Generic periodic hardware timer.
///
/// The callback only fires while both the channel and interrupts are enabled.
/// Clearing the callback waits for an in-flight invocation to return.
pub trait PeriodicTimer: Send + Sync {
    fn set_period(&self, period: Duration);
    fn set_callback(&self, callback: Option<TickCallback>);
    fn enable_channel(&self, enable: bool);
    fn enable_interrupts(&self, enable: bool);
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct TimerState {
    period: Duration,
    channel: bool,
    interrupts: bool,
    shutdown: bool,
    /// Bumped on every reconfiguration so the worker restarts its schedule.
    generation: u64,
}

impl TimerState {
    fn armed(&self) -> bool {
        self.channel && self.interrupts
    }
}

struct Shared {
    state: Mutex<TimerState>,
    wake: Condvar,
    callback: Mutex<Option<TickCallback>>,
}

/// Periodic timer backed by a worker thread.
pub struct ThreadTimer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadTimer {
    pub fn new() -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(TimerState {
                period: Duration::from_secs(1),
                channel: false,
                interrupts: false,
                shutdown: false,
                generation: 0,
            }),
            wake: Condvar::new(),
            callback: Mutex::new(None),
        });
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("rf-timer".into())
                .spawn(move || worker_loop(&shared))?
        };
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    fn reconfigure(&self, f: impl FnOnce(&mut TimerState)) {
        let mut st = lock(&self.shared.state);
        f(&mut st);
        st.generation += 1;
        self.shared.wake.notify_all();
    }
}

fn worker_loop(shared: &Shared) {
    let mut schedule: Option<(u64, Instant)> = None;
    loop {
        let mut st = lock(&shared.state);
        if st.shutdown {
            return;
        }
        if !st.armed() {
            schedule = None;
            drop(shared.wake.wait(st).unwrap_or_else(PoisonError::into_inner));
            continue;
        }

        let now = Instant::now();
        let due = match schedule {
            Some((generation, due)) if generation == st.generation => due,
            _ => {
                let due = now + st.period;
                schedule = Some((st.generation, due));
                due
            }
        };
        if now < due {
            drop(
                shared
                    .wake
                    .wait_timeout(st, due - now)
                    .unwrap_or_else(PoisonError::into_inner),
            );
            continue;
        }

        // Late ticks are not replayed.
        let next = (due + st.period).max(now);
        schedule = Some((st.generation, next));
        drop(st);

        if let Some(cb) = lock(&shared.callback).as_mut() {
            cb();
        }
    }
}

impl PeriodicTimer for ThreadTimer {
    fn set_period(&self, period: Duration) {
        self.reconfigure(|st| st.period = period.max(Duration::from_millis(1)));
    }

    fn set_callback(&self, callback: Option<TickCallback>) {
        *lock(&self.shared.callback) = callback;
    }

    fn enable_channel(&self, enable: bool) {
        self.reconfigure(|st| st.channel = enable);
    }

    fn enable_interrupts(&self, enable: bool) {
        self.reconfigure(|st| st.interrupts = enable);
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.reconfigure(|st| st.shutdown = true);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                debug!("timer worker panicked");
            }
        }
    }
}

/// Timer that fires only from [`ManualTimer::fire`].
#[derive(Default)]
pub struct ManualTimer {
    state: Mutex<(Duration, bool, bool)>,
    callback: Mutex<Option<TickCallback>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        let st = lock(&self.state);
        st.1 && st.2
    }

    pub fn has_callback(&self) -> bool {
        lock(&self.callback).is_some()
    }

    pub fn period(&self) -> Duration {
        lock(&self.state).0
    }

    /// Invoke the callback once if the timer is armed. Returns whether it ran.
    pub fn fire(&self) -> bool {
        if !self.is_armed() {
            return false;
        }
        match lock(&self.callback).as_mut() {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }
}

impl PeriodicTimer for ManualTimer {
    fn set_period(&self, period: Duration) {
        lock(&self.state).0 = period;
    }

    fn set_callback(&self, callback: Option<TickCallback>) {
        *lock(&self.callback) = callback;
    }

    fn enable_channel(&self, enable: bool) {
        lock(&self.state).1 = enable;
    }

    fn enable_interrupts(&self, enable: bool) {
        lock(&self.state).2 = enable;
    }
}
