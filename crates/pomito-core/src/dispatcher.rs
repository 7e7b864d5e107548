//! Queue based message dispatcher.
//!
//! Producers (the timer thread) enqueue [`Message`]s; a dedicated worker
//! thread drains the queue and sends each message on its signal, so
//! listeners never run on the producing thread.
//!
//! Messages for signals that have no receivers at enqueue time are dropped
//! instead of queued. Stopping the dispatcher abandons whatever is still
//! queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use crate::bus::Signal;
use crate::error::{Result, UsageError};
use crate::events::Event;

const COMPONENT: &str = "dispatcher";

/// Default sleep between two drains of the queue.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A signal paired with the event to send on it.
#[derive(Debug, Clone)]
pub struct Message {
    signal: Signal,
    event: Event,
}

impl Message {
    pub fn new(signal: Signal, event: Event) -> Self {
        Self { signal, event }
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Deliver to the listeners connected right now.
    pub fn send(self) -> usize {
        self.signal.send(&self.event)
    }

    fn validate(&self) -> Result<()> {
        if self.signal.name() != self.event.signal_name() {
            return Err(UsageError::SignalMismatch {
                signal: self.signal.name().to_string(),
                payload: self.event.signal_name(),
            }
            .into());
        }
        Ok(())
    }
}

/// Where the pomodoro service puts the events it produces.
pub trait MessageQueue: Send + Sync {
    /// # Errors
    ///
    /// Returns [`UsageError::SignalMismatch`] when the event does not belong
    /// to the message's signal.
    fn queue_message(&self, message: Message) -> Result<()>;
}

/// Delivers every message inline, on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDispatcher;

impl MessageQueue for ImmediateDispatcher {
    fn queue_message(&self, message: Message) -> Result<()> {
        message.validate()?;
        message.send();
        Ok(())
    }
}

/// Background worker delivering queued messages in FIFO order.
pub struct MessageDispatcher {
    queue_tx: Sender<Message>,
    queue_rx: Receiver<Message>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: Arc<Mutex<Option<ThreadId>>>,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        let (queue_tx, queue_rx) = channel::unbounded();
        Self {
            queue_tx,
            queue_rx,
            stop: Arc::new(AtomicBool::new(false)),
            poll_interval,
            worker: Mutex::new(None),
            worker_id: Arc::new(Mutex::new(None)),
        }
    }

    /// Number of messages waiting for delivery.
    pub fn queue_size(&self) -> usize {
        self.queue_rx.len()
    }

    /// Spawn the delivery thread. A dispatcher that was stopped and joined
    /// may be started again; messages queued meanwhile are delivered.
    pub fn start(&self) -> Result<()> {
        self.guard("start")?;
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Err(UsageError::AlreadyStarted {
                component: COMPONENT,
            }
            .into());
        }

        self.stop.store(false, Ordering::Release);
        let queue_rx = self.queue_rx.clone();
        let stop = Arc::clone(&self.stop);
        let poll_interval = self.poll_interval;
        let id_slot = Arc::clone(&self.worker_id);
        let handle = thread::Builder::new()
            .name("pomito-dispatcher".into())
            .spawn(move || {
                *id_slot.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(thread::current().id());
                deliver_loop(&queue_rx, &stop, poll_interval);
            })?;
        *self.worker_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle.thread().id());
        *worker = Some(handle);
        tracing::debug!("MessageDispatcher: started");
        Ok(())
    }

    /// Ask the delivery thread to exit. Queued messages may be discarded.
    pub fn stop(&self) -> Result<()> {
        self.guard("stop")?;
        self.stop.store(true, Ordering::Release);
        Ok(())
    }

    /// Wait for the delivery thread to exit.
    pub fn join(&self) -> Result<()> {
        self.guard("join")?;
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("MessageDispatcher: a listener panicked on the dispatcher thread");
            }
        }
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| !w.is_finished())
    }

    /// Whether [`MessageDispatcher::stop`] has been requested.
    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn guard(&self, operation: &'static str) -> Result<()> {
        let worker = *self.worker_id.lock().unwrap_or_else(PoisonError::into_inner);
        let on_worker = worker == Some(thread::current().id());
        if on_worker {
            return Err(UsageError::SelfCall {
                component: COMPONENT,
                operation,
            }
            .into());
        }
        Ok(())
    }
}

impl Default for MessageDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue for MessageDispatcher {
    fn queue_message(&self, message: Message) -> Result<()> {
        message.validate()?;
        let signal = message.signal().name().to_string();
        if !message.signal().has_receivers() {
            tracing::info!(signal = %signal, event = ?message.event(), "MessageDispatcher: skipped message");
            return Ok(());
        }
        tracing::info!(signal = %signal, event = ?message.event(), "MessageDispatcher: added message");
        tracing::debug!(receivers = message.signal().receiver_count(), "MessageDispatcher: receivers");
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.queue_tx.send(message);
        Ok(())
    }
}

impl Drop for MessageDispatcher {
    fn drop(&mut self) {
        if self.guard("drop").is_ok() {
            self.stop.store(true, Ordering::Release);
            let _ = self.join();
        }
    }
}

fn deliver_loop(queue_rx: &Receiver<Message>, stop: &AtomicBool, poll_interval: Duration) {
    while !stop.load(Ordering::Acquire) {
        while let Ok(message) = queue_rx.try_recv() {
            // Listeners connected since enqueue are included; the live list
            // is read at delivery time.
            let signal = message.signal().name().to_string();
            let delivered = message.send();
            tracing::debug!(signal = %signal, delivered, "MessageDispatcher: message dispatched");
        }
        thread::sleep(poll_interval);
    }
    tracing::debug!(abandoned = queue_rx.len(), "MessageDispatcher: stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MessageBus;
    use crate::error::CoreError;
    use crate::events::names;
    use std::sync::atomic::AtomicUsize;

    fn tick_message(bus: &MessageBus) -> Message {
        Message::new(bus.signal(names::TIMER_TICK), Event::TimerTick { elapsed: 3 })
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..500 {
            if done() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn message_send_calls_signal_with_event() {
        let bus = MessageBus::new();
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&got);
        bus.connect(names::TIMER_TICK, move |e| sink.lock().unwrap().push(e.clone()));

        assert_eq!(tick_message(&bus).send(), 1);
        assert_eq!(*got.lock().unwrap(), vec![Event::TimerTick { elapsed: 3 }]);
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        let bus = MessageBus::new();
        bus.connect(names::SESSION_STARTED, |_| {});
        let dispatcher = MessageDispatcher::new();
        let message = Message::new(
            bus.signal(names::SESSION_STARTED),
            Event::TimerTick { elapsed: 1 },
        );
        let err = dispatcher.queue_message(message).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Usage(UsageError::SignalMismatch { .. })
        ));
        assert_eq!(dispatcher.queue_size(), 0);
    }

    #[test]
    fn message_without_receivers_is_not_queued() {
        let bus = MessageBus::new();
        let dispatcher = MessageDispatcher::new();
        dispatcher.queue_message(tick_message(&bus)).unwrap();
        assert_eq!(dispatcher.queue_size(), 0);
    }

    #[test]
    fn message_with_receivers_is_queued() {
        let bus = MessageBus::new();
        bus.connect(names::TIMER_TICK, |_| {});
        let dispatcher = MessageDispatcher::new();
        dispatcher.queue_message(tick_message(&bus)).unwrap();
        assert_eq!(dispatcher.queue_size(), 1);
    }

    #[test]
    fn started_dispatcher_delivers_exactly_once() {
        let bus = MessageBus::new();
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&got);
        bus.connect(names::TIMER_TICK, move |e| sink.lock().unwrap().push(e.clone()));

        let dispatcher = MessageDispatcher::new();
        dispatcher.queue_message(tick_message(&bus)).unwrap();
        assert_eq!(dispatcher.queue_size(), 1);

        dispatcher.start().unwrap();
        assert!(dispatcher.is_alive());
        wait_until(|| dispatcher.queue_size() == 0 && !got.lock().unwrap().is_empty());
        thread::sleep(Duration::from_millis(30));

        assert_eq!(*got.lock().unwrap(), vec![Event::TimerTick { elapsed: 3 }]);
        dispatcher.stop().unwrap();
        dispatcher.join().unwrap();
        assert!(!dispatcher.is_alive());
    }

    #[test]
    fn delivery_is_fifo() {
        let bus = MessageBus::new();
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&got);
        bus.connect(names::TIMER_TICK, move |e| {
            if let Event::TimerTick { elapsed } = e {
                sink.lock().unwrap().push(*elapsed);
            }
        });
        let dispatcher = MessageDispatcher::new();
        for elapsed in 1..=20 {
            let msg = Message::new(bus.signal(names::TIMER_TICK), Event::TimerTick { elapsed });
            dispatcher.queue_message(msg).unwrap();
        }
        dispatcher.start().unwrap();
        wait_until(|| got.lock().unwrap().len() == 20);
        assert_eq!(*got.lock().unwrap(), (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn second_start_is_rejected() {
        let dispatcher = MessageDispatcher::new();
        dispatcher.start().unwrap();
        assert!(matches!(
            dispatcher.start(),
            Err(CoreError::Usage(UsageError::AlreadyStarted { .. }))
        ));
    }

    #[test]
    fn stopped_dispatcher_does_not_deliver() {
        let bus = MessageBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        bus.connect(names::TIMER_TICK, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let dispatcher = MessageDispatcher::new();
        dispatcher.start().unwrap();
        dispatcher.stop().unwrap();
        dispatcher.join().unwrap();

        dispatcher.queue_message(tick_message(&bus)).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.queue_size(), 1);
    }

    #[test]
    fn restarted_dispatcher_delivers_again() {
        let bus = MessageBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        bus.connect(names::TIMER_TICK, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let dispatcher = MessageDispatcher::new();
        dispatcher.start().unwrap();
        dispatcher.stop().unwrap();
        dispatcher.join().unwrap();

        dispatcher.queue_message(tick_message(&bus)).unwrap();
        dispatcher.start().unwrap();
        assert!(!dispatcher.is_stopping());
        wait_until(|| calls.load(Ordering::SeqCst) == 1);
        assert!(dispatcher.is_alive());
        assert_eq!(dispatcher.queue_size(), 0);

        dispatcher.stop().unwrap();
        dispatcher.join().unwrap();
    }

    #[test]
    fn stop_from_listener_is_a_usage_error() {
        let bus = MessageBus::new();
        let dispatcher = Arc::new(MessageDispatcher::new());
        let (tx, rx) = channel::bounded(1);
        let inner = Arc::downgrade(&dispatcher);
        bus.connect(names::TIMER_TICK, move |_| {
            if let Some(d) = inner.upgrade() {
                let _ = tx.try_send(d.stop().map_err(|e| e.to_string()));
            }
        });
        dispatcher.start().unwrap();
        dispatcher.queue_message(tick_message(&bus)).unwrap();

        let result = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(result.unwrap_err().contains("cannot call stop on the dispatcher thread"));
        assert!(!dispatcher.is_stopping());
    }

    #[test]
    fn immediate_dispatcher_delivers_inline() {
        let bus = MessageBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        bus.connect(names::TIMER_TICK, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        ImmediateDispatcher.queue_message(tick_message(&bus)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
