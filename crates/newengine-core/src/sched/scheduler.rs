use std::rc::Rc;

use log::{debug, trace, warn};

use super::binding::{Binding, ScriptBridge, ScriptHandler, Selector, TargetRef, TimerQuery};
use super::timer::{Fire, Repeat, Timer, TimerId};
use crate::error::{EngineError, EngineResult};

/// Default capacity of the timer list.
pub const DEFAULT_CAPACITY: usize = 10;

/// Frame-driven callback scheduler.
///
/// There are two kinds of callbacks:
///
/// - update: the target's `update` is called every frame;
/// - selector / script handler: called every `interval` seconds, after an
///   optional `delay`, either forever or a bounded number of times.
///
/// `tick` advances every timer that existed when the tick started, newest first,
/// then evicts everything flagged removed. Callbacks get `&mut Scheduler` and may
/// freely schedule or cancel timers: new timers wait for the next tick, and
/// cancelled ones are only flagged until the sweep.
///
/// The scheduler is engine-thread local. Targets are held through `Rc`, so it is
/// neither `Send` nor `Sync`.
pub struct Scheduler {
    timers: Vec<Timer>,
    next_id: u64,
    ticking: bool,
    bridge: Option<Box<dyn ScriptBridge>>,
    bridge_epoch: u64,
}

impl Scheduler {
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            timers: Vec::with_capacity(capacity),
            next_id: 1,
            ticking: false,
            bridge: None,
            bridge_epoch: 0,
        }
    }

    /// Installs the bridge that resolves script handlers. Returns the previous one.
    ///
    /// Called from inside the bridge's own `invoke`, the new bridge replaces the
    /// running one once the call returns.
    #[inline]
    pub fn set_script_bridge(&mut self, bridge: Box<dyn ScriptBridge>) -> Option<Box<dyn ScriptBridge>> {
        self.bridge_epoch = self.bridge_epoch.wrapping_add(1);
        self.bridge.replace(bridge)
    }

    /// Removes the installed bridge.
    ///
    /// Called from inside the bridge's own `invoke` this returns `None`, and the
    /// running bridge is dropped once the call returns.
    #[inline]
    pub fn take_script_bridge(&mut self) -> Option<Box<dyn ScriptBridge>> {
        self.bridge_epoch = self.bridge_epoch.wrapping_add(1);
        self.bridge.take()
    }

    #[inline]
    pub fn has_script_bridge(&self) -> bool {
        self.bridge.is_some()
    }

    /* ============================
       Registration
       ============================ */

    /// Appends a new timer. Existing timers with the same binding are kept.
    pub fn schedule(
        &mut self,
        binding: Binding,
        interval: f64,
        repeat: Repeat,
        delay: f64,
        paused: bool,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        debug!(
            target: "sched",
            "schedule {id:?}: {binding:?} interval={interval} repeat={repeat:?} delay={delay} paused={paused}"
        );

        self.timers
            .push(Timer::new(id, binding, interval, repeat, delay, paused));
        id
    }

    /// Calls `selector` on `target` every `interval` seconds.
    ///
    /// An interval of zero fires every frame; prefer [`Scheduler::schedule_update`] for that.
    #[inline]
    pub fn schedule_selector(
        &mut self,
        selector: Selector,
        target: TargetRef,
        interval: f64,
        repeat: Repeat,
        delay: f64,
        paused: bool,
    ) -> TimerId {
        self.schedule(
            Binding::Selector { target, selector },
            interval,
            repeat,
            delay,
            paused,
        )
    }

    /// Calls the target's `update` every frame.
    #[inline]
    pub fn schedule_update(&mut self, target: TargetRef, paused: bool) -> TimerId {
        self.schedule(Binding::Update { target }, 0.0, Repeat::Forever, 0.0, paused)
    }

    /// Calls the script `handler` through the installed bridge every `interval` seconds.
    #[inline]
    pub fn schedule_script_handler(
        &mut self,
        handler: ScriptHandler,
        interval: f64,
        repeat: Repeat,
        delay: f64,
        paused: bool,
    ) -> TimerId {
        self.schedule(Binding::Script { handler }, interval, repeat, delay, paused)
    }

    /* ============================
       Query-based control
       ============================ */

    /// Flags every matching timer for removal.
    #[inline]
    pub fn unschedule(&mut self, query: TimerQuery) {
        self.for_each_match(query, Timer::mark_removed);
    }

    #[inline]
    pub fn pause(&mut self, query: TimerQuery) {
        self.for_each_match(query, |t| t.set_paused(true));
    }

    #[inline]
    pub fn resume(&mut self, query: TimerQuery) {
        self.for_each_match(query, |t| t.set_paused(false));
    }

    /// Paused flag of the most recently scheduled match, `false` when nothing matches.
    #[inline]
    pub fn is_paused(&self, query: TimerQuery) -> bool {
        self.timers
            .iter()
            .rev()
            .find(|t| t.binding().matches(&query))
            .is_some_and(Timer::is_paused)
    }

    #[inline]
    pub fn unschedule_selector<T: ?Sized>(&mut self, selector: Selector, target: &Rc<T>) {
        self.unschedule(TimerQuery::selector(selector, target));
    }

    #[inline]
    pub fn pause_selector<T: ?Sized>(&mut self, selector: Selector, target: &Rc<T>) {
        self.pause(TimerQuery::selector(selector, target));
    }

    #[inline]
    pub fn resume_selector<T: ?Sized>(&mut self, selector: Selector, target: &Rc<T>) {
        self.resume(TimerQuery::selector(selector, target));
    }

    #[inline]
    pub fn is_selector_paused<T: ?Sized>(&self, selector: Selector, target: &Rc<T>) -> bool {
        self.is_paused(TimerQuery::selector(selector, target))
    }

    /// Unschedules everything bound to `target`, selectors included.
    #[inline]
    pub fn unschedule_update<T: ?Sized>(&mut self, target: &Rc<T>) {
        self.unschedule(TimerQuery::target(target));
    }

    /// Pauses everything bound to `target`, selectors included.
    #[inline]
    pub fn pause_update<T: ?Sized>(&mut self, target: &Rc<T>) {
        self.pause(TimerQuery::target(target));
    }

    #[inline]
    pub fn resume_update<T: ?Sized>(&mut self, target: &Rc<T>) {
        self.resume(TimerQuery::target(target));
    }

    #[inline]
    pub fn is_update_paused<T: ?Sized>(&self, target: &Rc<T>) -> bool {
        self.is_paused(TimerQuery::target(target))
    }

    #[inline]
    pub fn unschedule_script_handler(&mut self, handler: ScriptHandler) {
        self.unschedule(TimerQuery::script(handler));
    }

    #[inline]
    pub fn pause_script_handler(&mut self, handler: ScriptHandler) {
        self.pause(TimerQuery::script(handler));
    }

    #[inline]
    pub fn resume_script_handler(&mut self, handler: ScriptHandler) {
        self.resume(TimerQuery::script(handler));
    }

    #[inline]
    pub fn is_script_handler_paused(&self, handler: ScriptHandler) -> bool {
        self.is_paused(TimerQuery::script(handler))
    }

    /// Flags a single timer for removal. Returns `false` for unknown ids.
    pub fn unschedule_timer(&mut self, id: TimerId) -> bool {
        match self.timers.iter_mut().find(|t| t.id() == id) {
            Some(timer) => {
                timer.mark_removed();
                true
            }
            None => false,
        }
    }

    /* ============================
       Bulk control
       ============================ */

    pub fn unschedule_all(&mut self) {
        debug!(target: "sched", "unschedule all ({} timers)", self.timers.len());
        self.timers.iter_mut().for_each(Timer::mark_removed);
    }

    pub fn pause_all(&mut self) {
        self.timers.iter_mut().for_each(|t| t.set_paused(true));
    }

    pub fn resume_all(&mut self) {
        self.timers.iter_mut().for_each(|t| t.set_paused(false));
    }

    /* ============================
       Inspection
       ============================ */

    /// Number of timers held, including ones flagged removed but not yet swept.
    #[inline]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    #[inline]
    pub fn timer(&self, id: TimerId) -> Option<&Timer> {
        self.timers.iter().find(|t| t.id() == id)
    }

    /// Timers in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Timer> {
        self.timers.iter()
    }

    #[inline]
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    /* ============================
       Frame entry point
       ============================ */

    /// Advances all timers by `dt` seconds, fires the due ones, then sweeps.
    ///
    /// Calling `tick` from inside a timer callback is rejected with
    /// [`EngineError::NestedTick`] and changes nothing.
    pub fn tick(&mut self, dt: f64) -> EngineResult<()> {
        if self.ticking {
            warn!(target: "sched", "nested tick rejected (dt={dt})");
            return Err(EngineError::NestedTick);
        }

        self.ticking = true;
        let mut guard = TickGuard(&mut *self);
        guard.0.advance_all(dt);
        drop(guard);

        self.sweep();
        Ok(())
    }

    fn advance_all(&mut self, dt: f64) {
        // Timers appended by callbacks land past `count` and wait for the next tick.
        let count = self.timers.len();
        for i in (0..count).rev() {
            let Some(timer) = self.timers.get_mut(i) else {
                continue;
            };
            if let Some(fire) = timer.advance(dt) {
                trace!(target: "sched", "fire {:?} elapsed={}", timer.id(), fire.elapsed);
                self.dispatch(fire);
            }
        }
    }

    fn dispatch(&mut self, fire: Fire) {
        let Fire { binding, elapsed } = fire;
        match binding {
            Binding::Selector { target, selector } => target.invoke(selector, self, elapsed),
            Binding::Update { target } => target.update(self, elapsed),
            // Handler 0 still counts toward its repeat, it just has nothing to call.
            Binding::Script { handler } if !handler.is_set() => {}
            Binding::Script { handler } => {
                let Some(bridge) = self.bridge.take() else {
                    warn!(target: "sched", "script handler {handler:?} fired without a script bridge");
                    return;
                };
                let mut lent = LentBridge {
                    epoch: self.bridge_epoch,
                    bridge: Some(bridge),
                    sched: self,
                };
                lent.invoke(handler, elapsed);
            }
        }
    }

    fn sweep(&mut self) {
        let before = self.timers.len();
        self.timers.retain(|t| !t.is_removed());
        let evicted = before - self.timers.len();
        if evicted > 0 {
            trace!(target: "sched", "swept {evicted} timers");
        }
    }

    #[inline]
    fn for_each_match(&mut self, query: TimerQuery, f: impl FnMut(&mut Timer)) {
        self.timers
            .iter_mut()
            .rev()
            .filter(|t| t.binding().matches(&query))
            .for_each(f);
    }
}

/// Clears the ticking flag even when a callback unwinds.
struct TickGuard<'a>(&'a mut Scheduler);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.ticking = false;
    }
}

/// The bridge is lent out for the call so it can reach the scheduler.
///
/// It goes back into its slot afterwards (unwinding included) unless the call
/// installed or took a bridge itself.
struct LentBridge<'a> {
    sched: &'a mut Scheduler,
    bridge: Option<Box<dyn ScriptBridge>>,
    epoch: u64,
}

impl LentBridge<'_> {
    fn invoke(&mut self, handler: ScriptHandler, dt: f64) {
        if let Some(bridge) = self.bridge.as_mut() {
            bridge.invoke(handler, self.sched, dt);
        }
    }
}

impl Drop for LentBridge<'_> {
    fn drop(&mut self) {
        if self.sched.bridge_epoch == self.epoch {
            self.sched.bridge = self.bridge.take();
        }
    }
}

impl Default for Scheduler {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
