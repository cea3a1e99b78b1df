use log::{info, warn};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use newengine_core::{
    Engine, EngineConfig, EngineError, EngineResult, Module, ModuleCtx, Repeat, ScheduleTarget, Scheduler,
    ScriptBridge, ScriptHandler, Selector, ShutdownToken, CONFIG_PATH_ENV,
};
use newengine_modules_logging::ConsoleLoggerModule;

const FRAME_DT: f32 = 1.0 / 60.0;
const FRAMES: u32 = 180;

const PULSE: Selector = Selector::new("pulse");
const ANNOUNCE: Selector = Selector::new("announce");
const HEARTBEAT: ScriptHandler = ScriptHandler(1);

fn main() -> EngineResult<()> {
    let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    let config = EngineConfig::load(path.as_deref())?;

    let shutdown = ShutdownToken::new();
    let mut engine = Engine::new(config, shutdown)?;

    engine.register_module(Box::new(ConsoleLoggerModule::from_engine_config()))?;
    engine.register_module(Box::new(DemoModule::new()))?;
    engine.start()?;

    if let Ok(json) = serde_json::to_string(engine.config()) {
        info!("effective config: {json}");
    }

    for _ in 0..FRAMES {
        match engine.step_with_dt(FRAME_DT) {
            Ok(_) => {}
            Err(EngineError::ExitRequested) => break,
            Err(e) => return Err(e),
        }
    }

    info!(
        "ran {} frames, {} timers left",
        engine.frame_index(),
        engine.scheduler().len()
    );
    engine.shutdown()
}

/// Spins every frame until a beacon cancels it.
#[derive(Default)]
struct Spinner {
    turns: Cell<u32>,
}

impl ScheduleTarget for Spinner {
    fn update(&self, _sched: &mut Scheduler, _dt: f64) {
        self.turns.set(self.turns.get() + 1);
    }
}

/// Pulses periodically and stops the spinner on its third pulse.
struct Beacon {
    spinner: Rc<Spinner>,
    pulses: Cell<u32>,
}

impl ScheduleTarget for Beacon {
    fn invoke(&self, selector: Selector, sched: &mut Scheduler, dt: f64) {
        match selector {
            PULSE => {
                let n = self.pulses.get() + 1;
                self.pulses.set(n);
                info!("pulse #{n} after {dt:.3}s (spinner turns: {})", self.spinner.turns.get());
                if n == 3 {
                    sched.unschedule_update(&self.spinner);
                }
            }
            ANNOUNCE => info!("beacon online"),
            other => warn!("beacon has no method '{other}'"),
        }
    }
}

/// Stands in for a scripting runtime.
struct LogBridge;

impl ScriptBridge for LogBridge {
    fn invoke(&mut self, handler: ScriptHandler, _sched: &mut Scheduler, dt: f64) {
        info!("script handler {} called ({dt:.3}s)", handler.0);
    }
}

struct DemoModule {
    spinner: Rc<Spinner>,
}

impl DemoModule {
    #[inline]
    fn new() -> Self {
        Self {
            spinner: Rc::new(Spinner::default()),
        }
    }
}

impl Module for DemoModule {
    fn id(&self) -> &'static str {
        "demo"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["console-logger"]
    }

    fn start(&mut self, ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        let beacon = Rc::new(Beacon {
            spinner: self.spinner.clone(),
            pulses: Cell::new(0),
        });

        let sched = ctx.scheduler();
        sched.set_script_bridge(Box::new(LogBridge));
        sched.schedule_update(self.spinner.clone(), false);
        sched.schedule_selector(PULSE, beacon.clone(), 0.5, Repeat::Forever, 0.0, false);
        sched.schedule_selector(ANNOUNCE, beacon, 0.0, Repeat::Times(1), 1.0, false);
        sched.schedule_script_handler(HEARTBEAT, 1.0, Repeat::Forever, 0.0, false);
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        info!("spinner stopped after {} turns", self.spinner.turns.get());
        Ok(())
    }
}
