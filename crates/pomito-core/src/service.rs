//! Pomodoro service: the session, break and interruption state machine.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> SessionActive      -> Idle
//! Idle -> BreakActive        -> Idle
//! Idle -> InterruptionActive -> Idle
//! ```
//!
//! Exactly one timer drives the active state. Every `start_*` call stops and
//! joins the previous timer before creating the next one, so callbacks of two
//! timer generations never overlap. Timer callbacks run on the timer thread;
//! they only translate the tick into an [`Event`] and hand it to the
//! [`MessageQueue`].
//!
//! ## Usage
//!
//! ```ignore
//! let mut service = PomodoroService::new(config.session_settings(), signals, dispatcher);
//! service.start_session(Some(task))?;
//! // ... session_stopped arrives on the dispatcher thread
//! service.start_break()?;
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bus::Signals;
use crate::dispatcher::{Message, MessageQueue};
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::task::{NullTaskSource, Task, TaskSource};
use crate::timer::{NotifyReason, ThreadTimerFactory, Ticker, TimerCallback, TimerFactory, TimerKind};

/// Durations in timer units (seconds with the default timer factory).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub session_duration: u64,
    pub short_break_duration: u64,
    pub long_break_duration: u64,
    /// The session count at which the next break is a long one.
    pub long_break_frequency: u32,
}

impl SessionSettings {
    /// Break kind and duration after `session_count` completed sessions.
    ///
    /// A long break is chosen only when the count *equals* the frequency.
    /// This is a threshold, not "every Nth session": with a frequency of 4,
    /// session counts 4 gets a long break while 8 gets a short one.
    pub fn break_for(&self, session_count: u32) -> (TimerKind, u64) {
        if session_count == self.long_break_frequency {
            (TimerKind::LongBreak, self.long_break_duration)
        } else {
            (TimerKind::ShortBreak, self.short_break_duration)
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_duration: 25 * 60,
            short_break_duration: 5 * 60,
            long_break_duration: 15 * 60,
            long_break_frequency: 4,
        }
    }
}

/// State shared with the timer callback.
#[derive(Debug)]
struct SessionState {
    session_count: u32,
    timer_kind: TimerKind,
    current_task: Option<Arc<Task>>,
}

#[derive(Clone)]
struct Publisher {
    signals: Signals,
    queue: Arc<dyn MessageQueue>,
}

impl Publisher {
    fn publish(&self, event: Event) -> Result<()> {
        let signal = self.signals.for_event(&event).clone();
        self.queue.queue_message(Message::new(signal, event))
    }
}

/// Session control exposed to frontends.
pub struct PomodoroService {
    settings: SessionSettings,
    state: Arc<Mutex<SessionState>>,
    publisher: Publisher,
    timers: Arc<dyn TimerFactory>,
    timer: Option<Box<dyn Ticker>>,
    tasks: Arc<dyn TaskSource>,
}

impl PomodoroService {
    /// Create an idle service publishing on `signals` through `queue`.
    ///
    /// Uses one-second thread timers and an empty task source until told
    /// otherwise.
    pub fn new(settings: SessionSettings, signals: Signals, queue: Arc<dyn MessageQueue>) -> Self {
        Self {
            settings,
            state: Arc::new(Mutex::new(SessionState {
                session_count: 0,
                timer_kind: TimerKind::Session,
                current_task: None,
            })),
            publisher: Publisher { signals, queue },
            timers: Arc::new(ThreadTimerFactory::default()),
            timer: None,
            tasks: Arc::new(NullTaskSource),
        }
    }

    pub fn with_timer_factory(mut self, timers: Arc<dyn TimerFactory>) -> Self {
        self.timers = timers;
        self
    }

    pub fn with_task_source(mut self, tasks: Arc<dyn TaskSource>) -> Self {
        self.set_task_source(tasks);
        self
    }

    pub fn set_task_source(&mut self, tasks: Arc<dyn TaskSource>) {
        self.tasks = tasks;
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn signals(&self) -> &Signals {
        &self.publisher.signals
    }

    pub fn session_count(&self) -> u32 {
        self.lock().session_count
    }

    /// Role of the current (or last) timer.
    pub fn timer_kind(&self) -> TimerKind {
        self.lock().timer_kind
    }

    pub fn current_task(&self) -> Option<Arc<Task>> {
        self.lock().current_task.clone()
    }

    /// Whether a session, break or interruption timer is running.
    pub fn is_running(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| t.is_alive())
    }

    /// Elapsed units of the current timer, if any.
    pub fn elapsed(&self) -> Option<u64> {
        self.timer.as_ref().map(|t| t.elapsed())
    }

    pub fn task_source(&self) -> &Arc<dyn TaskSource> {
        &self.tasks
    }

    pub fn get_tasks(&self) -> Vec<Arc<Task>> {
        self.tasks.get_tasks()
    }

    pub fn get_tasks_by_filter(&self, filter: Option<&str>) -> Vec<Arc<Task>> {
        self.tasks.get_tasks_by_filter(filter)
    }

    pub fn get_task_by_id(&self, prefix: &str) -> Result<Option<Arc<Task>>> {
        self.tasks.get_task_by_id(prefix)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a pomodoro session on `task`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingTask`] without touching any state when
    /// `task` is `None`.
    pub fn start_session(&mut self, task: Option<Arc<Task>>) -> Result<()> {
        let task = task.ok_or(CoreError::MissingTask)?;
        self.stop_timer()?;

        let session_duration = bounded(TimerKind::Session, self.settings.session_duration);
        let (previous, session_count) = {
            let mut state = self.lock();
            let previous = state.timer_kind;
            state.timer_kind = TimerKind::Session;
            state.current_task = Some(Arc::clone(&task));
            (previous, state.session_count)
        };
        tracing::debug!(session_count, task = %task.uid, "starting session");
        self.publisher.publish(Event::SessionStarted {
            session_count,
            session_duration,
            task,
        })?;
        self.start_timer(TimerKind::Session, session_duration, previous)
    }

    /// Stop the running session. `session_stopped` with reason `interrupt`
    /// has been queued by the time this returns.
    pub fn stop_session(&mut self) -> Result<()> {
        self.stop_timer()?;
        self.lock().current_task = None;
        Ok(())
    }

    /// Start a short or long break, see [`SessionSettings::break_for`].
    pub fn start_break(&mut self) -> Result<()> {
        self.stop_timer()?;

        let (previous, break_type, break_duration) = {
            let mut state = self.lock();
            let previous = state.timer_kind;
            let (kind, duration) = self.settings.break_for(state.session_count);
            state.timer_kind = kind;
            (previous, kind, bounded(kind, duration))
        };
        tracing::debug!(%break_type, break_duration, "starting break");
        self.publisher.publish(Event::BreakStarted {
            break_type,
            break_duration,
        })?;
        self.start_timer(break_type, break_duration, previous)
    }

    pub fn stop_break(&mut self) -> Result<()> {
        self.stop_timer()
    }

    /// Start tracking an interruption. Any running timer is stopped first.
    ///
    /// `add_unplanned_task` is forwarded in the event; no task is created.
    pub fn start_interruption(
        &mut self,
        reason: impl Into<String>,
        is_external: bool,
        add_unplanned_task: bool,
    ) -> Result<()> {
        if self.is_running() {
            tracing::debug!("another timer is alive, stopping it first");
        }
        self.stop_timer()?;

        let previous = std::mem::replace(&mut self.lock().timer_kind, TimerKind::Interruption);
        self.publisher.publish(Event::InterruptionStarted {
            reason: reason.into(),
            external: is_external,
            add_unplanned_task,
        })?;
        self.start_timer(TimerKind::Interruption, 0, previous)
    }

    pub fn stop_interruption(&mut self) -> Result<()> {
        self.stop_timer()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop and join the current timer. Its terminal callback has run when
    /// this returns. A no-op when there is no timer.
    fn stop_timer(&mut self) -> Result<()> {
        if let Some(mut timer) = self.timer.take() {
            timer.stop()?;
            timer.join()?;
        }
        Ok(())
    }

    /// Create and start the timer for `kind`. When the timer cannot be
    /// started, the matching stopped event is published so listeners see a
    /// closed pair, and the state goes back to idle with `previous` kind.
    fn start_timer(&mut self, kind: TimerKind, duration: u64, previous: TimerKind) -> Result<()> {
        let state = Arc::clone(&self.state);
        let publisher = self.publisher.clone();
        // The kind is fixed per timer, so a callback can never be routed by
        // the kind of a later timer.
        let callback: TimerCallback = Box::new(move |reason, elapsed| {
            let Some(event) = timer_event(&state, kind, reason, elapsed) else {
                return;
            };
            if let Err(e) = publisher.publish(event) {
                tracing::error!(error = %e, "failed to queue timer event");
            }
        });

        let mut timer = self.timers.create(duration, callback);
        if let Err(e) = timer.start() {
            tracing::error!(error = %e, %kind, "failed to start timer");
            if let Some(event) = timer_event(&self.state, kind, NotifyReason::Interrupt, 0) {
                self.publisher.publish(event)?;
            }
            let mut state = self.lock();
            state.timer_kind = previous;
            state.current_task = None;
            return Err(e);
        }
        self.timer = Some(timer);
        Ok(())
    }
}

/// Sessions and breaks must end on their own; a zero duration would never
/// complete, so it is raised to one unit.
fn bounded(kind: TimerKind, duration: u64) -> u64 {
    if duration == 0 {
        tracing::warn!(%kind, "zero duration configured, using one unit");
        1
    } else {
        duration
    }
}

/// Translate a timer callback into the event to publish. Runs on the timer
/// thread.
fn timer_event(
    state: &Mutex<SessionState>,
    kind: TimerKind,
    reason: NotifyReason,
    elapsed: u64,
) -> Option<Event> {
    match reason {
        NotifyReason::Increment => Some(Event::TimerTick { elapsed }),
        NotifyReason::Complete => match kind {
            TimerKind::Session => {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.session_count += 1;
                Some(Event::SessionStopped {
                    session_count: state.session_count,
                    task: state.current_task.clone(),
                    reason,
                })
            }
            TimerKind::ShortBreak | TimerKind::LongBreak => Some(Event::BreakStopped {
                break_type: kind,
                reason,
            }),
            TimerKind::Interruption => {
                tracing::error!("interruption timer reported completion; ignoring");
                None
            }
        },
        NotifyReason::Interrupt => match kind {
            TimerKind::Session => {
                let state = state.lock().unwrap_or_else(PoisonError::into_inner);
                Some(Event::SessionStopped {
                    session_count: state.session_count,
                    task: state.current_task.clone(),
                    reason,
                })
            }
            TimerKind::ShortBreak | TimerKind::LongBreak => Some(Event::BreakStopped {
                break_type: kind,
                reason,
            }),
            TimerKind::Interruption => Some(Event::InterruptionStopped { duration: elapsed }),
        },
    }
}
