use std::fmt;
use std::rc::Rc;

use super::Scheduler;

/// Named method key on a scheduled target.
///
/// Targets dispatch on the name in [`ScheduleTarget::invoke`]. Two selectors are
/// equal when their names are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(&'static str);

impl Selector {
    #[inline]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Opaque id of a callback owned by the scripting runtime. Id `0` means "no handler".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptHandler(pub i32);

impl ScriptHandler {
    /// Whether the id refers to a real callback.
    #[inline]
    pub const fn is_set(self) -> bool {
        self.0 != 0
    }
}

/// Object that can be bound to a timer.
///
/// Callbacks receive the scheduler that fired them, so they may schedule,
/// unschedule or pause timers (including their own) while a tick is running.
/// Targets are shared through `Rc`; state they mutate lives behind `Cell`/`RefCell`.
pub trait ScheduleTarget {
    /// Per-frame update, used by update bindings.
    fn update(&self, _sched: &mut Scheduler, _dt: f64) {}

    /// Named method call, used by selector bindings.
    fn invoke(&self, _selector: Selector, _sched: &mut Scheduler, _dt: f64) {}
}

pub type TargetRef = Rc<dyn ScheduleTarget>;

/// Resolves script handler ids to callbacks in the scripting runtime.
pub trait ScriptBridge {
    fn invoke(&mut self, handler: ScriptHandler, sched: &mut Scheduler, dt: f64);
}

/// Identity of a target allocation. Only compared, never dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetKey(*const ());

impl TargetKey {
    #[inline]
    pub fn of<T: ?Sized>(target: &Rc<T>) -> Self {
        Self(Rc::as_ptr(target) as *const ())
    }
}

/// What a timer calls when it fires.
#[derive(Clone)]
pub enum Binding {
    Selector { target: TargetRef, selector: Selector },
    Update { target: TargetRef },
    Script { handler: ScriptHandler },
}

impl Binding {
    #[inline]
    pub fn target(&self) -> Option<&TargetRef> {
        match self {
            Binding::Selector { target, .. } | Binding::Update { target } => Some(target),
            Binding::Script { .. } => None,
        }
    }

    #[inline]
    pub fn selector(&self) -> Option<Selector> {
        match self {
            Binding::Selector { selector, .. } => Some(*selector),
            _ => None,
        }
    }

    #[inline]
    pub fn script_handler(&self) -> Option<ScriptHandler> {
        match self {
            Binding::Script { handler } => Some(*handler),
            _ => None,
        }
    }

    #[inline]
    fn target_key(&self) -> Option<TargetKey> {
        self.target().map(TargetKey::of)
    }

    pub fn matches(&self, query: &TimerQuery) -> bool {
        match *query {
            TimerQuery::Selector { target, selector } => {
                self.selector() == Some(selector) && self.target_key() == Some(target)
            }
            // Target queries cover every timer on the target, selector timers included.
            TimerQuery::Target(target) => self.target_key() == Some(target),
            TimerQuery::Script(handler) => self.script_handler() == Some(handler),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Selector { target, selector } => f
                .debug_struct("Selector")
                .field("target", &TargetKey::of(target))
                .field("selector", selector)
                .finish(),
            Binding::Update { target } => f
                .debug_struct("Update")
                .field("target", &TargetKey::of(target))
                .finish(),
            Binding::Script { handler } => f.debug_struct("Script").field("handler", handler).finish(),
        }
    }
}

/// Lookup key for the unschedule/pause/resume family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerQuery {
    Selector { target: TargetKey, selector: Selector },
    Target(TargetKey),
    Script(ScriptHandler),
}

impl TimerQuery {
    #[inline]
    pub fn selector<T: ?Sized>(selector: Selector, target: &Rc<T>) -> Self {
        TimerQuery::Selector {
            target: TargetKey::of(target),
            selector,
        }
    }

    #[inline]
    pub fn target<T: ?Sized>(target: &Rc<T>) -> Self {
        TimerQuery::Target(TargetKey::of(target))
    }

    #[inline]
    pub fn script(handler: ScriptHandler) -> Self {
        TimerQuery::Script(handler)
    }
}
