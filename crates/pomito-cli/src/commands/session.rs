//! Console frontend: runs a single session or break and streams its events.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use crossbeam::channel::{self, Receiver};
use pomito_core::events::names;
use pomito_core::{
    Event, Frontend, Pomito, PomodoroService, Signals, Task, ThreadTimerFactory,
};

use super::load_config;

#[derive(Args)]
pub struct SessionArgs {
    /// Task description, or the id prefix of a task from the task plugin
    #[arg(long)]
    task: String,
    /// Session length in minutes (overrides the configuration)
    #[arg(long)]
    minutes: Option<f64>,
    /// Wall-clock length of one timer unit, in milliseconds
    #[arg(long, default_value_t = 1000, hide = true)]
    tick_ms: u64,
}

#[derive(Args)]
pub struct BreakArgs {
    /// Break length in minutes (overrides the configuration)
    #[arg(long)]
    minutes: Option<f64>,
    /// Wall-clock length of one timer unit, in milliseconds
    #[arg(long, default_value_t = 1000, hide = true)]
    tick_ms: u64,
}

enum Activity {
    Session(String),
    Break,
}

/// Prints every service event to stdout as one JSON object per line.
pub struct ConsoleFrontend {
    activity: Activity,
    events: Option<Receiver<Event>>,
}

impl ConsoleFrontend {
    fn new(activity: Activity) -> Self {
        Self {
            activity,
            events: None,
        }
    }

    fn resolve_task(service: &PomodoroService, task: &str) -> pomito_core::Result<Arc<Task>> {
        if let Some(found) = service.get_task_by_id(task)? {
            return Ok(found);
        }
        Ok(Arc::new(Task::new(None, task, 1, 0, Vec::new())))
    }
}

impl Frontend for ConsoleFrontend {
    fn name(&self) -> &str {
        "console"
    }

    fn initialize(&mut self, signals: &Signals) -> pomito_core::Result<()> {
        let (tx, rx) = channel::unbounded();
        for signal in signals.all() {
            let tx = tx.clone();
            signal.connect(move |event: &Event| {
                let _ = tx.send(event.clone());
            });
        }
        self.events = Some(rx);
        Ok(())
    }

    fn run(&mut self, service: &mut PomodoroService) -> pomito_core::Result<()> {
        let done = match &self.activity {
            Activity::Session(task) => {
                let task = Self::resolve_task(service, task)?;
                service.start_session(Some(task))?;
                names::SESSION_STOPPED
            }
            Activity::Break => {
                service.start_break()?;
                names::BREAK_STOPPED
            }
        };

        let Some(events) = &self.events else {
            return Ok(());
        };
        // Every signal has a listener holding a sender, so this only ends
        // when the stop event arrives.
        while let Ok(event) = events.recv() {
            println!("{}", serde_json::to_string(&event)?);
            if event.signal_name() == done {
                break;
            }
        }
        Ok(())
    }
}

pub fn run_session(path: Option<&Path>, args: SessionArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(path)?;
    if let Some(minutes) = args.minutes {
        config.pomito.session_duration = check_minutes(minutes)?;
    }
    run_frontend(
        Pomito::new(config),
        ConsoleFrontend::new(Activity::Session(args.task)),
        args.tick_ms,
    )
}

pub fn run_break(path: Option<&Path>, args: BreakArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(path)?;
    if let Some(minutes) = args.minutes {
        let minutes = check_minutes(minutes)?;
        config.pomito.short_break_duration = minutes;
        config.pomito.long_break_duration = minutes;
    }
    run_frontend(
        Pomito::new(config),
        ConsoleFrontend::new(Activity::Break),
        args.tick_ms,
    )
}

fn run_frontend(
    app: Pomito,
    mut frontend: ConsoleFrontend,
    tick_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let timers = ThreadTimerFactory::with_unit(Duration::from_millis(tick_ms.max(1)));
    let mut app = app.with_timer_factory(Arc::new(timers));
    app.run(&mut frontend)?;
    Ok(())
}

// A zero-length timer never completes, so at least one whole second is
// required.
fn check_minutes(minutes: f64) -> Result<f64, String> {
    if minutes.is_finite() && minutes * 60.0 >= 1.0 {
        Ok(minutes)
    } else {
        Err(format!("--minutes must be at least one second, got {minutes}"))
    }
}
