//! Deterministic timer driven by hand.
//!
//! No thread is involved: callbacks run synchronously on whichever thread
//! calls [`ManualTimerHandle::advance`], [`ManualTimerHandle::fire`] or
//! [`Ticker::stop`]. Used to test code built on [`TimerFactory`] without
//! waiting on wall-clock time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::engine::{Ticker, TimerCallback, TimerFactory};
use super::kind::NotifyReason;
use crate::error::{Result, UsageError};

struct ManualState {
    duration: u64,
    interval: u64,
    elapsed: u64,
    started: bool,
    finished: bool,
    callback: Option<TimerCallback>,
}

/// Test handle sharing state with a [`ManualTimer`].
#[derive(Clone)]
pub struct ManualTimerHandle {
    state: Arc<Mutex<ManualState>>,
}

impl ManualTimerHandle {
    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn duration(&self) -> u64 {
        self.lock().duration
    }

    pub fn elapsed(&self) -> u64 {
        self.lock().elapsed
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// Deliver one tick the way the threaded timer would, completing the
    /// timer when its duration is reached.
    pub fn advance(&self) {
        let (elapsed, completes) = {
            let state = self.lock();
            if !state.started || state.finished {
                return;
            }
            (
                state.elapsed,
                state.duration != 0 && state.elapsed >= state.duration,
            )
        };
        self.invoke(NotifyReason::Increment, elapsed);
        if completes {
            self.fire(NotifyReason::Complete);
        } else {
            let mut state = self.lock();
            state.elapsed = state.elapsed.saturating_add(state.interval);
        }
    }

    /// Invoke the callback with an arbitrary reason. Terminal reasons finish
    /// the timer; firing on a finished timer does nothing.
    pub fn fire(&self, reason: NotifyReason) {
        let elapsed = {
            let mut state = self.lock();
            if state.finished {
                return;
            }
            if reason.is_terminal() {
                state.finished = true;
            }
            state.elapsed
        };
        self.invoke(reason, elapsed);
    }

    // The callback is taken out of the lock so it may query this handle.
    fn invoke(&self, reason: NotifyReason, elapsed: u64) {
        let callback = self.lock().callback.take();
        if let Some(mut callback) = callback {
            callback(reason, elapsed);
            self.lock().callback = Some(callback);
        }
    }
}

/// A [`Ticker`] whose ticks are triggered explicitly.
pub struct ManualTimer {
    handle: ManualTimerHandle,
}

impl ManualTimer {
    pub fn new(duration: u64, interval: u64, callback: TimerCallback) -> Self {
        let interval = interval.max(1);
        Self {
            handle: ManualTimerHandle {
                state: Arc::new(Mutex::new(ManualState {
                    duration,
                    interval,
                    elapsed: interval,
                    started: false,
                    finished: false,
                    callback: Some(callback),
                })),
            },
        }
    }

    pub fn handle(&self) -> ManualTimerHandle {
        self.handle.clone()
    }
}

impl Ticker for ManualTimer {
    fn start(&mut self) -> Result<()> {
        let mut state = self.handle.lock();
        if state.started {
            return Err(UsageError::AlreadyStarted {
                component: "timer",
            }
            .into());
        }
        state.started = true;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if self.handle.is_started() {
            self.handle.fire(NotifyReason::Interrupt);
        }
        Ok(())
    }

    fn join(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_alive(&self) -> bool {
        let state = self.handle.lock();
        state.started && !state.finished
    }

    fn elapsed(&self) -> u64 {
        self.handle.elapsed()
    }
}

/// Creates [`ManualTimer`]s and remembers every one it made.
pub struct ManualTimerFactory {
    interval: u64,
    created: Mutex<Vec<ManualTimerHandle>>,
}

impl ManualTimerFactory {
    pub fn new() -> Self {
        Self::with_interval(1)
    }

    pub fn with_interval(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Handle to the most recently created timer.
    pub fn last(&self) -> Option<ManualTimerHandle> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for ManualTimerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerFactory for ManualTimerFactory {
    fn create(&self, duration: u64, callback: TimerCallback) -> Box<dyn Ticker> {
        let timer = ManualTimer::new(duration, self.interval, callback);
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(timer.handle());
        Box::new(timer)
    }
}
