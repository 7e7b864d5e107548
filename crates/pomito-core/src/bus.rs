//! Named-signal publish/subscribe.
//!
//! A [`MessageBus`] hands out [`Signal`]s by name; each signal keeps an
//! ordered list of listeners and calls them synchronously on `send`. Listeners
//! are held strongly until [`Signal::disconnect`] is called.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::events::{names, Event};

/// A subscriber callback. Runs on the thread that sends the signal.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Token returned by [`Signal::connect`], used to disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct SignalInner {
    name: String,
    receivers: RwLock<Vec<(ListenerId, Listener)>>,
    next_id: Arc<AtomicU64>,
}

/// Handle to one named signal. Cloning shares the listener list.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

impl Signal {
    fn new(name: &str, next_id: Arc<AtomicU64>) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                name: name.to_string(),
                receivers: RwLock::new(Vec::new()),
                next_id,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Register a listener. Listeners are called in connection order.
    pub fn connect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not connected.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut receivers = self
            .inner
            .receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = receivers.len();
        receivers.retain(|(rid, _)| *rid != id);
        receivers.len() != before
    }

    pub fn receiver_count(&self) -> usize {
        self.inner
            .receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn has_receivers(&self) -> bool {
        self.receiver_count() > 0
    }

    /// Call every listener connected right now. Returns how many were called.
    ///
    /// The listener list is snapshotted first, so listeners may connect or
    /// disconnect from inside their callback.
    pub fn send(&self, event: &Event) -> usize {
        let receivers: Vec<Listener> = self
            .inner
            .receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &receivers {
            listener(event);
        }
        receivers.len()
    }

    /// Whether both handles refer to the same signal.
    pub fn same_as(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.inner.name)
            .field("receivers", &self.receiver_count())
            .finish()
    }
}

/// Registry of named signals.
#[derive(Default)]
pub struct MessageBus {
    signals: Mutex<HashMap<String, Signal>>,
    next_id: Arc<AtomicU64>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The signal called `name`, created on first use.
    pub fn signal(&self, name: &str) -> Signal {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        signals
            .entry(name.to_string())
            .or_insert_with(|| Signal::new(name, Arc::clone(&self.next_id)))
            .clone()
    }

    pub fn connect<F>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.signal(name).connect(listener)
    }

    pub fn disconnect(&self, name: &str, id: ListenerId) -> bool {
        self.signal(name).disconnect(id)
    }

    pub fn receiver_count(&self, name: &str) -> usize {
        self.signal(name).receiver_count()
    }

    /// Send `event` on the signal it belongs to.
    pub fn send(&self, event: &Event) -> usize {
        self.signal(event.signal_name()).send(event)
    }
}

/// The signals published by the pomodoro service.
#[derive(Debug, Clone)]
pub struct Signals {
    pub timer_tick: Signal,
    pub session_started: Signal,
    pub session_stopped: Signal,
    pub break_started: Signal,
    pub break_stopped: Signal,
    pub interruption_started: Signal,
    pub interruption_stopped: Signal,
}

impl Signals {
    pub fn new(bus: &MessageBus) -> Self {
        Self {
            timer_tick: bus.signal(names::TIMER_TICK),
            session_started: bus.signal(names::SESSION_STARTED),
            session_stopped: bus.signal(names::SESSION_STOPPED),
            break_started: bus.signal(names::BREAK_STARTED),
            break_stopped: bus.signal(names::BREAK_STOPPED),
            interruption_started: bus.signal(names::INTERRUPTION_STARTED),
            interruption_stopped: bus.signal(names::INTERRUPTION_STOPPED),
        }
    }

    /// The signal an event is published on.
    pub fn for_event(&self, event: &Event) -> &Signal {
        match event {
            Event::TimerTick { .. } => &self.timer_tick,
            Event::SessionStarted { .. } => &self.session_started,
            Event::SessionStopped { .. } => &self.session_stopped,
            Event::BreakStarted { .. } => &self.break_started,
            Event::BreakStopped { .. } => &self.break_stopped,
            Event::InterruptionStarted { .. } => &self.interruption_started,
            Event::InterruptionStopped { .. } => &self.interruption_stopped,
        }
    }

    pub fn all(&self) -> [&Signal; 7] {
        [
            &self.timer_tick,
            &self.session_started,
            &self.session_stopped,
            &self.break_started,
            &self.break_stopped,
            &self.interruption_started,
            &self.interruption_stopped,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(elapsed: u64) -> Event {
        Event::TimerTick { elapsed }
    }

    #[test]
    fn send_without_receivers_is_a_no_op() {
        let bus = MessageBus::new();
        assert_eq!(bus.receiver_count(names::TIMER_TICK), 0);
        assert_eq!(bus.send(&tick(1)), 0);
    }

    #[test]
    fn listeners_run_in_connection_order() {
        let bus = MessageBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.connect(names::TIMER_TICK, move |_| seen.lock().unwrap().push(label));
        }
        assert_eq!(bus.send(&tick(1)), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn disconnect_removes_only_that_listener() {
        let bus = MessageBus::new();
        let signal = bus.signal(names::SESSION_STOPPED);
        let a = signal.connect(|_| {});
        let _b = signal.connect(|_| {});
        assert_eq!(signal.receiver_count(), 2);
        assert!(signal.disconnect(a));
        assert!(!signal.disconnect(a));
        assert_eq!(signal.receiver_count(), 1);
    }

    #[test]
    fn signal_handles_are_shared_by_name() {
        let bus = MessageBus::new();
        let a = bus.signal("custom");
        let b = bus.signal("custom");
        assert!(a.same_as(&b));
        a.connect(|_| {});
        assert_eq!(b.receiver_count(), 1);
        assert!(!a.same_as(&bus.signal("other")));
    }

    #[test]
    fn listener_receives_payload() {
        let bus = MessageBus::new();
        let got = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&got);
        bus.connect(names::TIMER_TICK, move |event| {
            *sink.lock().unwrap() = Some(event.clone());
        });
        bus.send(&tick(7));
        assert_eq!(*got.lock().unwrap(), Some(tick(7)));
    }

    #[test]
    fn listener_may_disconnect_itself_while_sending() {
        let bus = MessageBus::new();
        let signal = bus.signal(names::TIMER_TICK);
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));
        let (sig, own, count) = (signal.clone(), Arc::clone(&slot), Arc::clone(&calls));
        let id = signal.connect(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *own.lock().unwrap() {
                sig.disconnect(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        signal.send(&tick(1));
        signal.send(&tick(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(signal.receiver_count(), 0);
    }

    #[test]
    fn service_signals_route_events_by_name() {
        let bus = MessageBus::new();
        let signals = Signals::new(&bus);
        let event = Event::InterruptionStopped { duration: 3 };
        assert_eq!(signals.for_event(&event).name(), "interruption_stopped");
        let listed: Vec<_> = signals.all().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(listed, names::ALL.to_vec());
    }
}
