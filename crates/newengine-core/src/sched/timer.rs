use super::binding::{Binding, ScriptHandler, Selector, TargetRef};

/// `elapsed` value of a timer that has never been advanced.
pub const UNSTARTED: f64 = -1.0;

/// How many times a timer fires before it removes itself.
///
/// `Times(n)` removes the timer once it has executed `n` times, with a floor of
/// one execution, so `Times(0)` and `Times(1)` both fire exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Forever,
    Times(u32),
}

impl Default for Repeat {
    #[inline]
    fn default() -> Self {
        Repeat::Forever
    }
}

/// Stable handle of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

impl TimerId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A due timer: the binding to call and the accumulated time to pass it.
#[derive(Debug, Clone)]
pub struct Fire {
    pub binding: Binding,
    pub elapsed: f64,
}

/// Light-weight timer.
///
/// `advance` is a pure state transition: it never calls the binding itself but
/// reports a [`Fire`] that the scheduler dispatches once the timer's own
/// bookkeeping is complete.
#[derive(Debug)]
pub struct Timer {
    id: TimerId,
    binding: Binding,
    interval: f64,
    repeat: Repeat,
    delay: f64,
    elapsed: f64,
    times_executed: u32,
    paused: bool,
    removed: bool,
}

impl Timer {
    pub(crate) fn new(
        id: TimerId,
        binding: Binding,
        interval: f64,
        repeat: Repeat,
        delay: f64,
        paused: bool,
    ) -> Self {
        Self {
            id,
            binding,
            // NaN and negatives collapse to zero.
            interval: interval.max(0.0),
            repeat,
            delay: delay.max(0.0),
            elapsed: UNSTARTED,
            times_executed: 0,
            paused,
            removed: false,
        }
    }

    #[inline]
    pub fn id(&self) -> TimerId {
        self.id
    }

    #[inline]
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    #[inline]
    pub fn target(&self) -> Option<&TargetRef> {
        self.binding.target()
    }

    #[inline]
    pub fn selector(&self) -> Option<Selector> {
        self.binding.selector()
    }

    #[inline]
    pub fn script_handler(&self) -> Option<ScriptHandler> {
        self.binding.script_handler()
    }

    #[inline]
    pub fn interval(&self) -> f64 {
        self.interval
    }

    #[inline]
    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// Remaining initial delay. Zero or negative once consumed.
    #[inline]
    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Accumulated time, or `None` before the first advance.
    #[inline]
    pub fn elapsed(&self) -> Option<f64> {
        (!self.is_unstarted()).then_some(self.elapsed)
    }

    #[inline]
    pub fn times_executed(&self) -> u32 {
        self.times_executed
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Flags the timer for eviction. There is no way back.
    #[inline]
    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    #[inline]
    fn is_unstarted(&self) -> bool {
        self.elapsed == UNSTARTED
    }

    /// Advances the timer by `dt` seconds.
    ///
    /// Returns the firing to dispatch, if the timer became due. The first advance
    /// after construction only primes the timer, and the advance that exhausts
    /// the delay only carries the overshoot into `elapsed`.
    pub fn advance(&mut self, dt: f64) -> Option<Fire> {
        if self.paused || self.removed {
            return None;
        }

        if self.is_unstarted() {
            self.elapsed = 0.0;
            return None;
        }

        if self.delay > 0.0 {
            self.delay -= dt;
            if self.delay <= 0.0 {
                self.elapsed = self.delay.abs();
            }
            return None;
        }

        self.elapsed += dt;
        if self.elapsed < self.interval {
            return None;
        }

        let fire = Fire {
            binding: self.binding.clone(),
            elapsed: self.elapsed,
        };

        self.elapsed -= self.interval;

        if let Repeat::Times(repeat) = self.repeat {
            self.times_executed = self.times_executed.saturating_add(1);
            if self.times_executed >= repeat {
                self.removed = true;
            }
        }

        Some(fire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_timer(interval: f64, repeat: Repeat, delay: f64) -> Timer {
        Timer::new(
            TimerId(1),
            Binding::Script {
                handler: ScriptHandler(1),
            },
            interval,
            repeat,
            delay,
            false,
        )
    }

    #[test]
    fn first_advance_only_primes() {
        let mut t = script_timer(0.0, Repeat::Forever, 0.0);
        assert_eq!(t.elapsed(), None);
        assert!(t.advance(10.0).is_none());
        assert_eq!(t.elapsed(), Some(0.0));
        assert!(t.advance(0.25).is_some());
    }

    #[test]
    fn fire_carries_accumulated_elapsed_and_keeps_remainder() {
        let mut t = script_timer(1.0, Repeat::Forever, 0.0);
        t.advance(0.0);

        assert!(t.advance(0.75).is_none());
        let fire = t.advance(0.75).expect("due");
        assert_eq!(fire.elapsed, 1.5);
        assert_eq!(t.elapsed(), Some(0.5));

        let fire = t.advance(0.5).expect("due again");
        assert_eq!(fire.elapsed, 1.0);
        assert_eq!(t.elapsed(), Some(0.0));
    }

    #[test]
    fn delay_overshoot_becomes_starting_elapsed() {
        let mut t = script_timer(1.0, Repeat::Forever, 0.5);
        t.advance(0.0);

        assert!(t.advance(0.25).is_none());
        assert_eq!(t.delay(), 0.25);

        // Exhausts the delay with 0.5s to spare, but never fires on that advance.
        assert!(t.advance(0.75).is_none());
        assert_eq!(t.elapsed(), Some(0.5));

        let fire = t.advance(0.5).expect("due");
        assert_eq!(fire.elapsed, 1.0);
    }

    #[test]
    fn paused_timer_does_not_move() {
        let mut t = script_timer(1.0, Repeat::Forever, 0.5);
        t.advance(0.0);
        t.set_paused(true);

        for _ in 0..10 {
            assert!(t.advance(1.0).is_none());
        }
        assert_eq!(t.delay(), 0.5);
        assert_eq!(t.elapsed(), Some(0.0));

        t.set_paused(false);
        assert!(t.advance(0.25).is_none());
        assert_eq!(t.delay(), 0.25);
    }

    #[test]
    fn paused_timer_is_not_primed() {
        let mut t = script_timer(0.0, Repeat::Forever, 0.0);
        t.set_paused(true);
        t.advance(0.1);
        assert_eq!(t.elapsed(), None);
    }

    #[test]
    fn repeat_count_removes_after_executions() {
        let mut t = script_timer(0.0, Repeat::Times(3), 0.0);
        t.advance(0.0);

        assert!(t.advance(0.1).is_some());
        assert!(t.advance(0.1).is_some());
        assert!(!t.is_removed());
        assert!(t.advance(0.1).is_some());
        assert!(t.is_removed());
        assert_eq!(t.times_executed(), 3);

        assert!(t.advance(0.1).is_none());
    }

    // Known quirk: the termination check is `times_executed >= repeat`, so
    // `Times(1)` fires once rather than the "repeat + 1" times older docs promise.
    #[test]
    fn repeat_one_fires_once() {
        let mut t = script_timer(0.0, Repeat::Times(1), 0.0);
        t.advance(0.0);
        assert!(t.advance(0.1).is_some());
        assert!(t.is_removed());
        assert!(t.advance(0.1).is_none());
    }

    #[test]
    fn repeat_zero_fires_once() {
        let mut t = script_timer(0.0, Repeat::Times(0), 0.0);
        t.advance(0.0);
        assert!(t.advance(0.1).is_some());
        assert!(t.is_removed());
    }

    #[test]
    fn forever_never_counts() {
        let mut t = script_timer(0.0, Repeat::Forever, 0.0);
        t.advance(0.0);
        for _ in 0..100 {
            assert!(t.advance(0.01).is_some());
        }
        assert_eq!(t.times_executed(), 0);
        assert!(!t.is_removed());
    }

    #[test]
    fn zero_interval_elapsed_keeps_accumulating() {
        let mut t = script_timer(0.0, Repeat::Forever, 0.0);
        t.advance(0.0);
        assert_eq!(t.advance(0.25).map(|f| f.elapsed), Some(0.25));
        assert_eq!(t.advance(0.25).map(|f| f.elapsed), Some(0.5));
        assert_eq!(t.advance(0.5).map(|f| f.elapsed), Some(1.0));
    }

    #[test]
    fn removed_timer_is_inert() {
        let mut t = script_timer(0.0, Repeat::Forever, 0.0);
        t.advance(0.0);
        t.mark_removed();
        t.set_paused(false);
        assert!(t.advance(1.0).is_none());
        assert!(t.is_removed());
    }

    #[test]
    fn negative_interval_and_delay_are_clamped() {
        let t = script_timer(-2.0, Repeat::Forever, f64::NAN);
        assert_eq!(t.interval(), 0.0);
        assert_eq!(t.delay(), 0.0);
    }
}
