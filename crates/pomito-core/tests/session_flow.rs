//! Session flows with real timer threads and the threaded dispatcher.
//!
//! Timers tick every millisecond so the flows finish quickly.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use pomito_core::{
    Config, Event, Frontend, MessageBus, MessageDispatcher, NotifyReason, Pomito, PomodoroService,
    Result, SessionSettings, Signals, Task, ThreadTimerFactory, TimerKind,
};

const WAIT: Duration = Duration::from_secs(10);

// ============================================================================
// Test Helpers
// ============================================================================

struct Fixture {
    service: PomodoroService,
    dispatcher: Arc<MessageDispatcher>,
    events: Receiver<Event>,
}

impl Fixture {
    fn new(settings: SessionSettings) -> Self {
        let bus = MessageBus::new();
        let signals = Signals::new(&bus);
        let (tx, events) = channel::unbounded();
        for signal in signals.all() {
            let tx = tx.clone();
            signal.connect(move |e: &Event| {
                let _ = tx.send(e.clone());
            });
        }
        let dispatcher = Arc::new(MessageDispatcher::new());
        dispatcher.start().unwrap();
        let service = PomodoroService::new(settings, signals, dispatcher.clone())
            .with_timer_factory(Arc::new(millisecond_timers()));
        Self {
            service,
            dispatcher,
            events,
        }
    }

    /// Collect events up to and including the first one on `signal`.
    fn until(&self, signal: &str) -> Vec<Event> {
        wait_for(&self.events, signal)
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = self.dispatcher.stop();
        let _ = self.dispatcher.join();
    }
}

fn millisecond_timers() -> ThreadTimerFactory {
    ThreadTimerFactory::with_unit(Duration::from_millis(1))
}

fn wait_for(events: &Receiver<Event>, signal: &str) -> Vec<Event> {
    let mut seen = Vec::new();
    loop {
        let event = events
            .recv_timeout(WAIT)
            .unwrap_or_else(|_| panic!("no {signal} event; saw {seen:?}"));
        let done = event.signal_name() == signal;
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn short_settings() -> SessionSettings {
    SessionSettings {
        session_duration: 10,
        short_break_duration: 2,
        long_break_duration: 5,
        long_break_frequency: 2,
    }
}

fn task() -> Arc<Task> {
    Arc::new(Task::new(None, "integration task", 1, 0, vec!["test".into()]))
}

// ============================================================================
// Service flows
// ============================================================================

#[test]
fn session_then_break_end_to_end() {
    let mut f = Fixture::new(short_settings());

    f.service.start_session(Some(task())).unwrap();
    let events = f.until("session_stopped");
    assert_eq!(
        events.first(),
        Some(&Event::SessionStarted {
            session_count: 0,
            session_duration: 10,
            task: task(),
        })
    );
    let ticks: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            Event::TimerTick { elapsed } => Some(*elapsed),
            _ => None,
        })
        .collect();
    assert_eq!(ticks, (1..=10).collect::<Vec<_>>());
    assert_eq!(
        events.last(),
        Some(&Event::SessionStopped {
            session_count: 1,
            task: Some(task()),
            reason: NotifyReason::Complete,
        })
    );
    assert_eq!(f.service.session_count(), 1);

    f.service.start_break().unwrap();
    let events = f.until("break_stopped");
    assert_eq!(
        events.first(),
        Some(&Event::BreakStarted {
            break_type: TimerKind::ShortBreak,
            break_duration: 2,
        })
    );
    assert_eq!(
        events.last(),
        Some(&Event::BreakStopped {
            break_type: TimerKind::ShortBreak,
            reason: NotifyReason::Complete,
        })
    );
}

#[test]
fn stopping_immediately_yields_one_interrupted_session() {
    let mut f = Fixture::new(SessionSettings {
        session_duration: 60_000,
        ..short_settings()
    });

    f.service.start_session(Some(task())).unwrap();
    f.service.stop_session().unwrap();
    assert!(!f.service.is_running());

    let events = f.until("session_stopped");
    assert_eq!(
        events.last(),
        Some(&Event::SessionStopped {
            session_count: 0,
            task: Some(task()),
            reason: NotifyReason::Interrupt,
        })
    );
    assert!(f.events.recv_timeout(Duration::from_millis(50)).is_err());
    assert_eq!(f.service.session_count(), 0);
}

#[test]
fn interruption_reports_elapsed_duration() {
    let mut f = Fixture::new(short_settings());

    f.service.start_interruption("phone", true, false).unwrap();
    std::thread::sleep(Duration::from_millis(30));
    f.service.stop_interruption().unwrap();

    let events = f.until("interruption_stopped");
    assert_eq!(
        events.first(),
        Some(&Event::InterruptionStarted {
            reason: "phone".into(),
            external: true,
            add_unplanned_task: false,
        })
    );
    match events.last() {
        Some(Event::InterruptionStopped { duration }) => assert!(*duration >= 1),
        other => panic!("unexpected last event {other:?}"),
    }
}

#[test]
fn missing_task_is_rejected_synchronously() {
    let mut f = Fixture::new(short_settings());
    assert!(f.service.start_session(None).is_err());
    assert!(!f.service.is_running());
    assert!(f.events.recv_timeout(Duration::from_millis(50)).is_err());
}

// ============================================================================
// Application runtime
// ============================================================================

/// Runs one session to completion, like the console frontend.
struct OneSession {
    events: Option<Receiver<Event>>,
    stopped: Option<Event>,
}

impl Frontend for OneSession {
    fn name(&self) -> &str {
        "one-session"
    }

    fn initialize(&mut self, signals: &Signals) -> Result<()> {
        let (tx, rx) = channel::unbounded();
        signals.session_stopped.connect(move |e: &Event| {
            let _ = tx.send(e.clone());
        });
        self.events = Some(rx);
        Ok(())
    }

    fn run(&mut self, service: &mut PomodoroService) -> Result<()> {
        service.start_session(Some(task()))?;
        if let Some(events) = &self.events {
            self.stopped = events.recv_timeout(WAIT).ok();
        }
        Ok(())
    }
}

#[test]
fn app_runs_frontend_and_logs_activity() {
    let config = Config::from_toml_str(
        r#"
        [pomito]
        session_duration = 0.1
        "#,
    )
    .unwrap();
    let mut app = Pomito::new(config).with_timer_factory(Arc::new(millisecond_timers()));
    let mut frontend = OneSession {
        events: None,
        stopped: None,
    };

    app.run(&mut frontend).unwrap();

    assert!(matches!(
        frontend.stopped,
        Some(Event::SessionStopped {
            session_count: 1,
            reason: NotifyReason::Complete,
            ..
        })
    ));
    assert!(!app.dispatcher().is_alive());
    let sessions = app.activity().by_category("session");
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].data.contains("reason=complete"));
}
