use std::error::Error;
use std::fmt;

/// Engine-wide error.
///
/// Keep this small and stable. Modules may define their own error types and map them into `EngineError`.
#[derive(Debug)]
pub enum EngineError {
    /// Graceful shutdown was requested.
    ExitRequested,

    /// `Scheduler::tick` was called while a tick was already running on the same scheduler.
    NestedTick,

    /// Error produced by a module during a known lifecycle stage.
    Module {
        module_id: &'static str,
        stage: ModuleStage,
        cause: Box<EngineError>,
    },

    /// Generic error (fallback).
    Other(String),
}

/// Module lifecycle stage used for error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStage {
    Init,
    Start,
    FixedUpdate,
    Update,
    Shutdown,
}

impl EngineError {
    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Attributes `err` to a module stage. Exit requests pass through untouched.
    #[inline]
    pub fn with_module_stage(module_id: &'static str, stage: ModuleStage, err: EngineError) -> Self {
        match err {
            EngineError::ExitRequested => EngineError::ExitRequested,
            other => EngineError::Module {
                module_id,
                stage,
                cause: Box::new(other),
            },
        }
    }

    #[inline]
    pub fn is_exit_requested(&self) -> bool {
        matches!(self, EngineError::ExitRequested)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ExitRequested => write!(f, "exit requested"),
            EngineError::NestedTick => write!(f, "scheduler tick re-entered from a timer callback"),
            EngineError::Other(s) => write!(f, "{s}"),
            EngineError::Module {
                module_id,
                stage,
                cause,
            } => write!(f, "module '{module_id}' stage {stage:?}: {cause}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineError::Module { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<&str> for EngineError {
    #[inline]
    fn from(value: &str) -> Self {
        EngineError::Other(value.to_string())
    }
}

impl From<String> for EngineError {
    #[inline]
    fn from(value: String) -> Self {
        EngineError::Other(value)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_stage_wraps_cause() {
        let err = EngineError::with_module_stage("audio", ModuleStage::Update, "device lost".into());
        assert_eq!(err.to_string(), "module 'audio' stage Update: device lost");
        assert!(err.source().is_some());
    }

    #[test]
    fn exit_request_is_not_wrapped() {
        let err = EngineError::with_module_stage("audio", ModuleStage::Init, EngineError::ExitRequested);
        assert!(err.is_exit_requested());
    }
}
