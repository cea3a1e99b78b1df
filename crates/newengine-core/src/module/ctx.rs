use crate::config::EngineConfig;
use crate::frame::Frame;
use crate::sched::Scheduler;

/// Context passed to modules.
///
/// This prevents modules from taking `&mut Engine` (god object problem).
pub struct ModuleCtx<'a> {
    config: &'a EngineConfig,
    scheduler: &'a mut Scheduler,
    exit: &'a mut bool,

    /// Frame snapshot for the current stage (stored by value).
    frame: Option<Frame>,
}

impl<'a> ModuleCtx<'a> {
    #[inline]
    pub(crate) fn new(config: &'a EngineConfig, scheduler: &'a mut Scheduler, exit: &'a mut bool) -> Self {
        Self {
            config,
            scheduler,
            exit,
            frame: None,
        }
    }

    /// Attaches a frame snapshot to the context.
    #[inline]
    pub fn set_frame(&mut self, frame: &Frame) {
        self.frame = Some(*frame);
    }

    /// Returns the current frame snapshot, if attached.
    #[inline]
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    /// The engine's scheduler. Timers registered here start ticking after this frame's modules ran.
    #[inline]
    pub fn scheduler(&mut self) -> &mut Scheduler {
        self.scheduler
    }

    #[inline]
    pub fn request_exit(&mut self) {
        *self.exit = true;
    }

    #[inline]
    pub fn is_exit_requested(&self) -> bool {
        *self.exit
    }
}
