mod engine;
mod kind;
mod manual;

pub use engine::{ThreadTimerFactory, Ticker, Timer, TimerCallback, TimerFactory, TimerHandle};
pub use kind::{NotifyReason, TimerKind};
pub use manual::{ManualTimer, ManualTimerFactory, ManualTimerHandle};
