//! Application lifetime.
//!
//! [`Pomito`] wires the configuration, message bus, dispatcher, pomodoro
//! service, plugins and hooks together, then hands control to a
//! [`Frontend`]:
//!
//! ```ignore
//! let mut app = Pomito::new(Config::load()?);
//! app.run(&mut ConsoleFrontend::new())?;
//! ```

use std::sync::Arc;

use crate::bus::{MessageBus, Signals};
use crate::dispatcher::MessageDispatcher;
use crate::error::{CoreError, Result};
use crate::hooks::{ActivityHook, ActivityLog, Hook};
use crate::registry::PluginRegistry;
use crate::service::PomodoroService;
use crate::storage::Config;
use crate::timer::TimerFactory;

/// A user interface driving the pomodoro service.
pub trait Frontend {
    /// Unique identifier used in configuration (e.g. "console").
    fn name(&self) -> &str;

    /// Connect to the signals the frontend wants to observe.
    fn initialize(&mut self, signals: &Signals) -> Result<()>;

    /// Run until the user is done. The dispatcher is running meanwhile.
    fn run(&mut self, service: &mut PomodoroService) -> Result<()>;
}

pub struct Pomito {
    config: Config,
    bus: MessageBus,
    dispatcher: Arc<MessageDispatcher>,
    service: PomodoroService,
    registry: PluginRegistry,
    hooks: Vec<Box<dyn Hook>>,
    activity: ActivityLog,
}

impl Pomito {
    /// Build the application with the default plugins and the activity hook.
    pub fn new(config: Config) -> Self {
        let bus = MessageBus::new();
        let dispatcher = Arc::new(MessageDispatcher::new());
        let service = PomodoroService::new(
            config.session_settings(),
            Signals::new(&bus),
            dispatcher.clone(),
        );
        let activity = ActivityHook::new();
        let log = activity.log();
        Self {
            config,
            bus,
            dispatcher,
            service,
            registry: PluginRegistry::with_defaults(),
            hooks: vec![Box::new(activity)],
            activity: log,
        }
    }

    /// Load the configuration from its default location and build the
    /// application.
    pub fn load() -> Result<Self> {
        Ok(Self::new(Config::load()?))
    }

    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_timer_factory(mut self, timers: Arc<dyn TimerFactory>) -> Self {
        self.service = self.service.with_timer_factory(timers);
        self
    }

    pub fn add_hook(&mut self, hook: Box<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn signals(&self) -> &Signals {
        self.service.signals()
    }

    pub fn service(&self) -> &PomodoroService {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut PomodoroService {
        &mut self.service
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &MessageDispatcher {
        &self.dispatcher
    }

    /// Records collected by the built-in activity hook.
    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Value of `key` in the `[plugin]` section of the configuration.
    pub fn get_config(&self, plugin: &str, key: &str) -> Option<String> {
        self.config
            .get_setting(plugin)
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Resolve and initialize the configured task source, then the hooks.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownPlugin`] when the configured task source
    /// is not registered.
    pub fn initialize(&mut self) -> Result<()> {
        let tasks = self.registry.task_source(&self.config.plugins.task)?;
        tasks.initialize()?;
        self.service.set_task_source(tasks);

        let signals = self.service.signals().clone();
        for hook in &mut self.hooks {
            tracing::debug!(hook = hook.name(), "initializing hook");
            hook.initialize(&signals)?;
        }
        Ok(())
    }

    /// Initialize everything, start the dispatcher and block in
    /// [`Frontend::run`]. Cleans up through [`Pomito::exit`] afterwards, even
    /// when the frontend fails.
    pub fn run(&mut self, frontend: &mut dyn Frontend) -> Result<()> {
        self.validate_state()?;
        if frontend.name() != self.config.plugins.ui {
            tracing::debug!(
                configured = %self.config.plugins.ui,
                actual = frontend.name(),
                "running a frontend other than the configured one"
            );
        }

        frontend.initialize(self.service.signals())?;
        self.initialize()?;
        self.dispatcher.start()?;

        let result = frontend.run(&mut self.service);
        if let Err(e) = &result {
            tracing::error!(error = %e, frontend = frontend.name(), "frontend failed");
        }
        self.exit()?;
        result
    }

    /// Stop the running timer and the dispatcher, then close the hooks.
    /// Calling it again is harmless.
    pub fn exit(&mut self) -> Result<()> {
        if self.service.is_running() {
            self.service.stop_session()?;
        }
        if self.dispatcher.is_alive() {
            self.dispatcher.stop()?;
            self.dispatcher.join()?;
        }
        let signals = self.service.signals().clone();
        for hook in &mut self.hooks {
            hook.close(&signals)?;
        }
        Ok(())
    }

    fn validate_state(&self) -> Result<()> {
        let task = &self.config.plugins.task;
        if !self.registry.contains_task_source(task) {
            tracing::error!(plugin = %task, "invalid state: task plugin is not registered");
            return Err(CoreError::UnknownPlugin(task.clone()));
        }
        Ok(())
    }
}
