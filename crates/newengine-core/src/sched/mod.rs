//! Frame-driven callback scheduling.
//!
//! - [`Timer`]: one scheduled callback and its timing state machine.
//! - [`Scheduler`]: owns the timers and advances them once per frame.
//! - [`Binding`]: what a timer calls (target selector, target update, script handler).

mod binding;
mod scheduler;
mod timer;

pub use binding::{
    Binding, ScheduleTarget, ScriptBridge, ScriptHandler, Selector, TargetKey, TargetRef, TimerQuery,
};
pub use scheduler::{Scheduler, DEFAULT_CAPACITY};
pub use timer::{Fire, Repeat, Timer, TimerId, UNSTARTED};
