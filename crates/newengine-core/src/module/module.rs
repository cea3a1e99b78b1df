use super::ctx::ModuleCtx;
use crate::error::EngineResult;

/// A single engine module.
///
/// Modules are client code of the engine: they receive lifecycle and frame
/// calls, and register their callbacks on the scheduler through the context.
pub trait Module {
    fn id(&self) -> &'static str {
        "module"
    }

    /// Ids of modules that must be initialised before this one.
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    fn init(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        Ok(())
    }

    fn start(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        Ok(())
    }

    fn fixed_update(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        Ok(())
    }

    fn update(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        Ok(())
    }
}
