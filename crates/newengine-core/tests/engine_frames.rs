//! Engine frame loop driving modules and the scheduler.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use newengine_core::{
    Engine, EngineConfig, EngineError, EngineResult, Module, ModuleCtx, Repeat, ScheduleTarget, Scheduler,
    Selector, ShutdownToken,
};

const BLINK: Selector = Selector::new("blink");

#[derive(Default)]
struct Counter {
    updates: Cell<u32>,
    blinks: Cell<u32>,
    last_dt: Cell<f64>,
}

impl ScheduleTarget for Counter {
    fn update(&self, _sched: &mut Scheduler, dt: f64) {
        self.updates.set(self.updates.get() + 1);
        self.last_dt.set(dt);
    }

    fn invoke(&self, selector: Selector, _sched: &mut Scheduler, _dt: f64) {
        if selector == BLINK {
            self.blinks.set(self.blinks.get() + 1);
        }
    }
}

/// Schedules an update and a blink selector on start.
struct TimerModule {
    target: Rc<Counter>,
}

impl Module for TimerModule {
    fn id(&self) -> &'static str {
        "timers"
    }

    fn start(&mut self, ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        let sched = ctx.scheduler();
        sched.schedule_update(self.target.clone(), false);
        sched.schedule_selector(BLINK, self.target.clone(), 0.05, Repeat::Times(3), 0.0, false);
        Ok(())
    }
}

/// Logs its lifecycle calls into a shared journal.
struct Journal {
    id: &'static str,
    deps: &'static [&'static str],
    log: Rc<RefCell<Vec<String>>>,
    exit_on_update: bool,
}

impl Module for Journal {
    fn id(&self) -> &'static str {
        self.id
    }

    fn dependencies(&self) -> &'static [&'static str] {
        self.deps
    }

    fn init(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        self.log.borrow_mut().push(format!("init:{}", self.id));
        Ok(())
    }

    fn fixed_update(&mut self, ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        let frame = ctx.frame().expect("frame attached");
        assert!(frame.is_fixed());
        self.log.borrow_mut().push(format!("fixed:{}", self.id));
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        self.log.borrow_mut().push(format!("update:{}", self.id));
        if self.exit_on_update {
            ctx.request_exit();
        }
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        self.log.borrow_mut().push(format!("shutdown:{}", self.id));
        Ok(())
    }
}

fn journal(id: &'static str, deps: &'static [&'static str], log: &Rc<RefCell<Vec<String>>>) -> Box<Journal> {
    Box::new(Journal {
        id,
        deps,
        log: log.clone(),
        exit_on_update: false,
    })
}

fn engine() -> Engine {
    Engine::new(EngineConfig::default(), ShutdownToken::new()).expect("engine")
}

#[test]
fn modules_schedule_timers_that_tick_each_frame() {
    let target = Rc::new(Counter::default());
    let mut engine = engine();
    engine
        .register_module(Box::new(TimerModule { target: target.clone() }))
        .expect("register");

    // Frame 0 starts the engine and primes both timers.
    engine.step_with_dt(0.025).expect("frame");
    assert_eq!(target.updates.get(), 0);
    assert_eq!(engine.scheduler().len(), 2);

    engine.step_with_dt(0.025).expect("frame");
    assert_eq!(target.updates.get(), 1);
    assert_eq!(target.last_dt.get(), f64::from(0.025f32));

    for _ in 0..10 {
        engine.step_with_dt(0.025).expect("frame");
    }
    assert_eq!(target.updates.get(), 11);
    assert_eq!(target.blinks.get(), 3, "blink stops after its repeat count");
    assert_eq!(engine.scheduler().len(), 1);
}

#[test]
fn frame_dt_is_clamped() {
    let mut engine = engine();
    let frame = engine.step_with_dt(5.0).expect("frame");
    assert_eq!(frame.dt, 0.25);

    let frame = engine.step_with_dt(f32::NAN).expect("frame");
    assert_eq!(frame.dt, 0.0);
    assert_eq!(frame.frame_index, 1);
}

#[test]
fn fixed_steps_follow_the_accumulator() {
    let config = EngineConfig {
        fixed_dt_ms: 10,
        ..EngineConfig::default()
    };
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::new(config, ShutdownToken::new()).expect("engine");
    engine.register_module(journal("physics", &[], &log)).expect("register");

    let frame = engine.step_with_dt(0.025).expect("frame");
    assert_eq!(frame.fixed_step_count, 2);
    assert!(!frame.is_fixed());

    let fixed = log.borrow().iter().filter(|e| e.starts_with("fixed:")).count();
    assert_eq!(fixed, 2);
}

#[test]
fn init_runs_in_dependency_order_and_shutdown_in_reverse() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut engine = engine();
    engine.register_module(journal("render", &["assets"], &log)).expect("register");
    engine.register_module(journal("assets", &["io"], &log)).expect("register");
    engine.register_module(journal("io", &[], &log)).expect("register");

    engine.start().expect("start");
    engine.shutdown().expect("shutdown");

    assert_eq!(
        *log.borrow(),
        vec![
            "init:io",
            "init:assets",
            "init:render",
            "shutdown:render",
            "shutdown:assets",
            "shutdown:io",
        ]
    );
}

#[test]
fn duplicate_and_missing_modules_are_rejected() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut engine = engine();
    engine.register_module(journal("io", &[], &log)).expect("register");
    assert!(engine.register_module(journal("io", &[], &log)).is_err());

    engine.register_module(journal("net", &["tls"], &log)).expect("register");
    let err = engine.start().expect_err("missing dependency");
    assert!(err.to_string().contains("net -> tls"));
}

#[test]
fn failed_start_never_runs_frames() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut engine = engine();
    engine.register_module(journal("net", &["tls"], &log)).expect("register");

    let first = engine.step_with_dt(0.016).expect_err("missing dependency");
    assert!(first.to_string().contains("net -> tls"));

    let second = engine.step_with_dt(0.016).expect_err("start stays failed");
    assert!(second.to_string().contains("start failed"));

    assert!(log.borrow().is_empty(), "no init and no update: {:?}", log.borrow());
    assert_eq!(engine.frame_index(), 0);
}

#[test]
fn exit_request_from_module_stops_the_loop() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let token = ShutdownToken::new();
    let mut engine = Engine::new(EngineConfig::default(), token.clone()).expect("engine");
    engine
        .register_module(Box::new(Journal {
            id: "quitter",
            deps: &[],
            log,
            exit_on_update: true,
        }))
        .expect("register");

    let err = engine.step_with_dt(0.016).expect_err("exit");
    assert!(matches!(err, EngineError::ExitRequested));
    assert!(token.is_requested());
    assert!(engine.exit_requested());
    assert!(engine.step_with_dt(0.016).is_err());
}

#[test]
fn shutdown_releases_scheduled_targets() {
    let target = Rc::new(Counter::default());
    let mut engine = engine();
    engine
        .register_module(Box::new(TimerModule { target: target.clone() }))
        .expect("register");

    engine.step_with_dt(0.016).expect("frame");
    assert_eq!(Rc::strong_count(&target), 4);

    engine.shutdown().expect("shutdown");
    assert!(engine.scheduler().is_empty());
    assert_eq!(Rc::strong_count(&target), 2, "only the test and the module keep it");
}
