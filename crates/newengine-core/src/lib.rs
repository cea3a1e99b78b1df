pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod module;
pub mod sched;
pub mod sync;

pub use config::{EngineConfig, LogConfig, SchedulerConfig, CONFIG_PATH_ENV};
pub use engine::Engine;
pub use error::{EngineError, EngineResult, ModuleStage};
pub use frame::Frame;
pub use module::{Module, ModuleCtx};
pub use sched::{
    Binding, Repeat, ScheduleTarget, Scheduler, ScriptBridge, ScriptHandler, Selector, TargetRef, Timer,
    TimerId, TimerQuery,
};
pub use sync::ShutdownToken;
