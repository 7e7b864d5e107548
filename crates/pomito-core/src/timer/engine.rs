//! Thread-backed interval timer.
//!
//! A [`Timer`] owns a background thread that ticks once per interval and
//! reports every tick to a caller-supplied callback. The callback runs on the
//! timer thread.
//!
//! ## Callback sequence
//!
//! ```text
//! Increment(I) -> Increment(2I) -> ... -> Increment(D) -> Complete(D)
//! Increment(I) -> ... -> Interrupt(e)          (stop() requested)
//! ```
//!
//! A duration of `0` never completes; only [`Timer::stop`] ends it.
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = Timer::new(25 * 60, Box::new(|reason, elapsed| { /* ... */ }));
//! timer.start()?;
//! // later, from another thread:
//! timer.stop()?;
//! timer.join()?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use super::kind::NotifyReason;
use crate::error::{Result, UsageError};

const COMPONENT: &str = "timer";

/// Callback invoked on the timer thread with the reason and the elapsed units.
pub type TimerCallback = Box<dyn FnMut(NotifyReason, u64) + Send + 'static>;

/// The operations the pomodoro service needs from a timer.
///
/// [`Timer`] is the real implementation; [`super::ManualTimer`] is a
/// deterministic stand-in driven by hand.
pub trait Ticker: Send {
    fn start(&mut self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    /// Block until the timer has fully terminated.
    fn join(&mut self) -> Result<()>;
    fn is_alive(&self) -> bool;
    fn elapsed(&self) -> u64;
}

/// Creates a fresh timer for every session, break or interruption.
pub trait TimerFactory: Send + Sync {
    fn create(&self, duration: u64, callback: TimerCallback) -> Box<dyn Ticker>;
}

/// Cloneable control handle for a [`Timer`].
///
/// Lets code that does not own the timer request a stop, including code
/// running inside the timer's own callback (where it is rejected).
#[derive(Clone)]
pub struct TimerHandle {
    stop_tx: Sender<()>,
    thread: Arc<OnceLock<ThreadId>>,
}

impl TimerHandle {
    /// Request termination with [`NotifyReason::Interrupt`].
    ///
    /// A no-op once the timer has terminated.
    pub fn stop(&self) -> Result<()> {
        self.guard("stop")?;
        // Capacity is one; a stop that is already pending is enough.
        let _ = self.stop_tx.try_send(());
        Ok(())
    }

    fn on_timer_thread(&self) -> bool {
        self.thread
            .get()
            .is_some_and(|id| *id == thread::current().id())
    }

    fn guard(&self, operation: &'static str) -> Result<()> {
        if self.on_timer_thread() {
            return Err(UsageError::SelfCall {
                component: COMPONENT,
                operation,
            }
            .into());
        }
        Ok(())
    }
}

/// Cancellable interval ticker running on its own thread.
pub struct Timer {
    duration: u64,
    interval: u64,
    unit: Duration,
    elapsed: Arc<AtomicU64>,
    callback: Option<TimerCallback>,
    stop_rx: Option<Receiver<()>>,
    handle: TimerHandle,
    worker: Option<JoinHandle<()>>,
}

impl Timer {
    /// Create a timer of `duration` units ticking every unit of one second.
    pub fn new(duration: u64, callback: TimerCallback) -> Self {
        let (stop_tx, stop_rx) = channel::bounded(1);
        Self {
            duration,
            interval: 1,
            unit: Duration::from_secs(1),
            elapsed: Arc::new(AtomicU64::new(1)),
            callback: Some(callback),
            stop_rx: Some(stop_rx),
            handle: TimerHandle {
                stop_tx,
                thread: Arc::new(OnceLock::new()),
            },
            worker: None,
        }
    }

    /// Units added per tick. Zero is clamped to one.
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self.elapsed.store(self.interval, Ordering::Release);
        self
    }

    /// Wall-clock length of one unit.
    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn handle(&self) -> TimerHandle {
        self.handle.clone()
    }

    /// Spawn the timer thread.
    pub fn start(&mut self) -> Result<()> {
        self.handle.guard("start")?;
        let (Some(callback), Some(stop_rx)) = (self.callback.take(), self.stop_rx.take()) else {
            return Err(UsageError::AlreadyStarted {
                component: COMPONENT,
            }
            .into());
        };

        let tick = Tick {
            duration: self.duration,
            interval: self.interval,
            wait: self.unit.saturating_mul(self.interval.min(u32::MAX as u64) as u32),
            elapsed: Arc::clone(&self.elapsed),
        };
        let thread_slot = Arc::clone(&self.handle.thread);
        let worker = thread::Builder::new()
            .name("pomito-timer".into())
            .spawn(move || {
                let _ = thread_slot.set(thread::current().id());
                tick.run(stop_rx, callback);
            })?;
        let _ = self.handle.thread.set(worker.thread().id());
        self.worker = Some(worker);
        Ok(())
    }

    /// Request termination with [`NotifyReason::Interrupt`].
    pub fn stop(&self) -> Result<()> {
        self.handle.stop()
    }

    pub fn join(&mut self) -> Result<()> {
        self.handle.guard("join")?;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("timer thread panicked inside its callback");
            }
        }
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed.load(Ordering::Acquire)
    }
}

impl Ticker for Timer {
    fn start(&mut self) -> Result<()> {
        Timer::start(self)
    }

    fn stop(&self) -> Result<()> {
        Timer::stop(self)
    }

    fn join(&mut self) -> Result<()> {
        Timer::join(self)
    }

    fn is_alive(&self) -> bool {
        Timer::is_alive(self)
    }

    fn elapsed(&self) -> u64 {
        Timer::elapsed(self)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if self.worker.is_some() && !self.handle.on_timer_thread() {
            let _ = self.handle.stop();
            let _ = self.join();
        }
    }
}

/// State moved onto the timer thread.
struct Tick {
    duration: u64,
    interval: u64,
    wait: Duration,
    elapsed: Arc<AtomicU64>,
}

impl Tick {
    /// The thread alone decides how the timer ends, so exactly one terminal
    /// callback is delivered and it is always the last one.
    fn run(self, stop_rx: Receiver<()>, mut callback: TimerCallback) {
        loop {
            match stop_rx.recv_timeout(self.wait) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    callback(NotifyReason::Interrupt, self.elapsed.load(Ordering::Acquire));
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            let current = self.elapsed.load(Ordering::Acquire);
            callback(NotifyReason::Increment, current);
            if self.duration != 0 && current >= self.duration {
                callback(NotifyReason::Complete, current);
                return;
            }
            self.elapsed
                .store(current.saturating_add(self.interval), Ordering::Release);
        }
    }
}

/// Builds real [`Timer`]s.
#[derive(Debug, Clone, Copy)]
pub struct ThreadTimerFactory {
    interval: u64,
    unit: Duration,
}

impl ThreadTimerFactory {
    pub fn new(interval: u64, unit: Duration) -> Self {
        Self {
            interval: interval.max(1),
            unit,
        }
    }

    /// One-unit ticks of the given wall-clock length.
    pub fn with_unit(unit: Duration) -> Self {
        Self::new(1, unit)
    }
}

impl Default for ThreadTimerFactory {
    fn default() -> Self {
        Self::new(1, Duration::from_secs(1))
    }
}

impl TimerFactory for ThreadTimerFactory {
    fn create(&self, duration: u64, callback: TimerCallback) -> Box<dyn Ticker> {
        Box::new(
            Timer::new(duration, callback)
                .with_interval(self.interval)
                .with_unit(self.unit),
        )
    }
}
