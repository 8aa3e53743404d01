//! Cancellable periodic tick driver.
//!
//! An [`UpdateScheduler`] owns one named worker thread that invokes a callback
//! every `interval`. Ticks run synchronously on that thread, so at most one is
//! ever in flight. Pausing keeps the thread parked without losing any state
//! held by the callback; resuming schedules the next tick one full interval
//! later. Interval changes only affect the next wait. `stop` is final.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};

/// Default tick interval, matching the dashboards' 30 second refresh.
pub const DEFAULT_INTERVAL_MS: u64 = 30_000;

/// Scheduling parameters for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_enabled() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            enabled: true,
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(VigilError::invalid_config("interval_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Shared state between the handle and the worker thread
// ---------------------------------------------------------------------------

struct Control {
    interval: Duration,
    paused: bool,
    closed: bool,
    started: bool,
    /// Set by `resume`; the worker re-anchors its next deadline on it.
    resumed_at: Option<Instant>,
    /// First deadline, fixed when `start` is called.
    first_due: Option<Instant>,
}

struct Shared {
    control: Mutex<Control>,
    wake: Condvar,
    ticks: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// UpdateScheduler
// ---------------------------------------------------------------------------

/// Periodic tick driver with pause, resume, interval change and stop.
pub struct UpdateScheduler {
    name: String,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateScheduler {
    /// Create an idle scheduler. The worker thread is named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
                    paused: false,
                    closed: false,
                    started: false,
                    resumed_at: None,
                    first_due: None,
                }),
                wake: Condvar::new(),
                ticks: AtomicU64::new(0),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Start ticking every `interval_ms`. The first tick fires one interval
    /// after the call.
    pub fn start<F>(&self, callback: F, interval_ms: u64) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.start_with(
            callback,
            ScheduleConfig {
                interval_ms,
                enabled: true,
            },
        )
    }

    /// Start with a full [`ScheduleConfig`]; a disabled config starts paused.
    pub fn start_with<F>(&self, callback: F, config: ScheduleConfig) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        config.validate()?;
        {
            let mut control = self.shared.lock();
            if control.closed {
                return Err(VigilError::SchedulerClosed);
            }
            if control.started {
                return Err(VigilError::AlreadyStarted);
            }
            control.interval = config.interval();
            control.paused = control.paused || !config.enabled;
            control.started = true;
            control.first_due = Some(Instant::now() + control.interval);
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_loop(shared, callback));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.lock().started = false;
                return Err(e.into());
            }
        };
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        log::debug!(
            "scheduler '{}' started (interval {} ms)",
            self.name,
            config.interval_ms
        );
        Ok(())
    }

    /// Suspend ticking. A tick already running completes.
    pub fn pause(&self) -> Result<()> {
        let mut control = self.open_control()?;
        control.paused = true;
        control.resumed_at = None;
        Ok(())
    }

    /// Resume ticking; the next tick fires one full interval from now.
    pub fn resume(&self) -> Result<()> {
        let mut control = self.open_control()?;
        if control.paused {
            control.paused = false;
            control.resumed_at = Some(Instant::now());
            self.shared.wake.notify_all();
        }
        Ok(())
    }

    /// Change the interval. The wait currently in progress is not shortened
    /// or extended; the new value applies from the next scheduled wait.
    pub fn set_interval(&self, interval_ms: u64) -> Result<()> {
        if interval_ms == 0 {
            return Err(VigilError::invalid_config("interval_ms must be greater than zero"));
        }
        let mut control = self.open_control()?;
        control.interval = Duration::from_millis(interval_ms);
        Ok(())
    }

    /// Stop for good. Waits for an in-flight tick, then joins the worker
    /// unless called from the tick callback itself.
    pub fn stop(&self) -> Result<()> {
        {
            let mut control = self.open_control()?;
            control.closed = true;
            self.shared.wake.notify_all();
        }
        self.join_worker();
        log::debug!("scheduler '{}' stopped", self.name);
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn is_started(&self) -> bool {
        self.shared.lock().started
    }

    /// Started, not paused and not stopped.
    pub fn is_running(&self) -> bool {
        let control = self.shared.lock();
        control.started && !control.paused && !control.closed
    }

    pub fn interval(&self) -> Duration {
        self.shared.lock().interval
    }

    /// Number of ticks completed so far.
    pub fn tick_count(&self) -> u64 {
        self.shared.ticks.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn open_control(&self) -> Result<MutexGuard<'_, Control>> {
        let control = self.shared.lock();
        if control.closed {
            return Err(VigilError::SchedulerClosed);
        }
        Ok(control)
    }

    fn join_worker(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };
        // Joining from inside the callback would deadlock; the worker exits
        // on its own once the callback returns.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::warn!("scheduler '{}' worker panicked", self.name);
        }
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        {
            let mut control = self.shared.lock();
            control.closed = true;
            self.shared.wake.notify_all();
        }
        self.join_worker();
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let control = self.shared.lock();
        f.debug_struct("UpdateScheduler")
            .field("name", &self.name)
            .field("interval", &control.interval)
            .field("paused", &control.paused)
            .field("closed", &control.closed)
            .field("ticks", &self.shared.ticks.load(Ordering::SeqCst))
            .finish()
    }
}

fn run_loop<F: FnMut()>(shared: Arc<Shared>, mut callback: F) {
    let mut control = shared.lock();
    let mut next_due = control
        .first_due
        .take()
        .unwrap_or_else(|| Instant::now() + control.interval);

    loop {
        if control.closed {
            break;
        }
        if let Some(at) = control.resumed_at.take() {
            next_due = at + control.interval;
        }
        if control.paused {
            control = shared.wake.wait(control).unwrap_or_else(PoisonError::into_inner);
            continue;
        }

        let now = Instant::now();
        if now < next_due {
            let (guard, _) = shared
                .wake
                .wait_timeout(control, next_due - now)
                .unwrap_or_else(PoisonError::into_inner);
            control = guard;
            continue;
        }

        drop(control);
        if catch_unwind(AssertUnwindSafe(&mut callback)).is_err() {
            log::error!(
                "tick callback panicked on '{}'",
                thread::current().name().unwrap_or("scheduler")
            );
        }
        shared.ticks.fetch_add(1, Ordering::SeqCst);

        control = shared.lock();
        next_due = Instant::now() + control.interval;
    }
}
