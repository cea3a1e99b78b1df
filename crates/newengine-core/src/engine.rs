use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, ModuleStage};
use crate::frame::Frame;
use crate::module::{Module, ModuleCtx};
use crate::sched::Scheduler;
use crate::sync::ShutdownToken;

use log::{debug, error, info};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

/// Engine kernel: owns the modules and the scheduler and drives them frame by frame.
pub struct Engine {
    config: EngineConfig,
    fixed_dt: f32,
    max_frame_dt: f32,
    max_fixed_steps: u32,

    modules: Vec<Box<dyn Module>>,
    module_ids: HashSet<&'static str>,

    scheduler: Scheduler,

    shutdown: ShutdownToken,
    exit_requested: bool,

    frame_index: u64,
    fixed_tick: u64,
    started: bool,
    start_failed: bool,
    last: Instant,
    acc: f32,
}

impl Engine {
    pub fn new(config: EngineConfig, shutdown: ShutdownToken) -> EngineResult<Self> {
        let fixed_dt = config.fixed_dt_sec();
        let max_frame_dt = config.max_frame_dt_sec();
        let max_fixed_steps = config.max_fixed_steps.max(1);
        let scheduler = Scheduler::with_capacity(config.scheduler.initial_capacity);

        Ok(Self {
            config,
            fixed_dt,
            max_frame_dt,
            max_fixed_steps,
            modules: Vec::new(),
            module_ids: HashSet::new(),
            scheduler,
            shutdown,
            exit_requested: false,
            frame_index: 0,
            fixed_tick: 0,
            started: false,
            start_failed: false,
            last: Instant::now(),
            acc: 0.0,
        })
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[inline]
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    pub fn request_exit(&mut self) {
        self.shutdown.request();
        self.exit_requested = true;
    }

    #[inline]
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    pub fn register_module(&mut self, module: Box<dyn Module>) -> EngineResult<()> {
        self.sync_shutdown_state();

        let id = module.id();
        if self.module_ids.contains(id) {
            return Err(EngineError::Other(format!("module already registered: {id}")));
        }

        self.modules.push(module);
        self.module_ids.insert(id);
        Ok(())
    }

    /// Orders modules by their dependencies, then runs `init` and `start` on each.
    ///
    /// A failed start is final: later calls (and every `step`) return an error
    /// instead of running frames on modules that were never initialised.
    pub fn start(&mut self) -> EngineResult<()> {
        if self.start_failed {
            return Err(EngineError::other("engine start failed earlier"));
        }

        self.last = Instant::now();
        self.sync_shutdown_state();

        let order = match self.dependency_order() {
            Ok(order) => order,
            Err(e) => {
                self.start_failed = true;
                return Err(e);
            }
        };

        let mut slots: Vec<Option<Box<dyn Module>>> = std::mem::take(&mut self.modules)
            .into_iter()
            .map(Some)
            .collect();
        let mut sorted: Vec<Box<dyn Module>> = Vec::with_capacity(slots.len());
        for idx in order {
            if let Some(m) = slots[idx].take() {
                sorted.push(m);
            }
        }

        let result = self.run_lifecycle(&mut sorted);
        self.modules = sorted;
        self.module_ids = self.modules.iter().map(|m| m.id()).collect();
        if let Err(e) = result {
            self.start_failed = true;
            return Err(e);
        }
        self.started = true;

        info!(
            "engine started: {} modules, fixed_dt={}s",
            self.modules.len(),
            self.fixed_dt
        );
        Ok(())
    }

    fn run_lifecycle(&mut self, modules: &mut [Box<dyn Module>]) -> EngineResult<()> {
        for stage in [ModuleStage::Init, ModuleStage::Start] {
            for m in modules.iter_mut() {
                self.sync_shutdown_state();

                let mut ctx = ModuleCtx::new(&self.config, &mut self.scheduler, &mut self.exit_requested);
                let r = match stage {
                    ModuleStage::Init => m.init(&mut ctx),
                    _ => m.start(&mut ctx),
                };
                r.map_err(|e| EngineError::with_module_stage(m.id(), stage, e))?;

                self.propagate_shutdown_request();
                if self.is_exit_requested() {
                    return Err(EngineError::ExitRequested);
                }
            }
        }
        Ok(())
    }

    /// Kahn topological sort, stable by registration order.
    fn dependency_order(&self) -> EngineResult<Vec<usize>> {
        let n = self.modules.len();
        let mut id_to_index: HashMap<&'static str, usize> = HashMap::with_capacity(n);
        for (i, m) in self.modules.iter().enumerate() {
            let id = m.id();
            if id_to_index.insert(id, i).is_some() {
                return Err(EngineError::Other(format!("duplicate module id: {id}")));
            }
        }

        // Edge: dep -> module (so indegree[module]++)
        let mut indegree = vec![0usize; n];
        let mut rev_edges: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, m) in self.modules.iter().enumerate() {
            for &dep in m.dependencies() {
                let Some(&dep_i) = id_to_index.get(dep) else {
                    return Err(EngineError::Other(format!(
                        "module dependency missing: {} -> {dep}",
                        m.id()
                    )));
                };
                indegree[i] += 1;
                rev_edges[dep_i].push(i);
            }
        }

        let mut q: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order: Vec<usize> = Vec::with_capacity(n);
        while let Some(i) = q.pop_front() {
            order.push(i);
            for &to in rev_edges[i].iter() {
                indegree[to] = indegree[to].saturating_sub(1);
                if indegree[to] == 0 {
                    q.push_back(to);
                }
            }
        }

        if order.len() != n {
            let cyclic: Vec<&'static str> = indegree
                .iter()
                .enumerate()
                .filter(|(_, deg)| **deg != 0)
                .map(|(i, _)| self.modules[i].id())
                .collect();
            return Err(EngineError::Other(format!(
                "module dependency cycle detected among: {:?}",
                cyclic
            )));
        }

        Ok(order)
    }

    /// Runs one frame using the wall-clock delta since the previous frame.
    pub fn step(&mut self) -> EngineResult<Frame> {
        let now = Instant::now();
        let dt = if self.started {
            (now - self.last).as_secs_f32()
        } else {
            0.0
        };
        self.last = now;
        self.step_with_dt(dt)
    }

    /// Runs one frame with an externally supplied `dt` (seconds).
    ///
    /// Order: fixed steps, `update` on every module, then one scheduler tick with
    /// the clamped `dt`.
    pub fn step_with_dt(&mut self, dt: f32) -> EngineResult<Frame> {
        self.sync_shutdown_state();
        if self.is_exit_requested() {
            return Err(EngineError::ExitRequested);
        }

        if !self.started {
            self.start()?;
        }

        let dt = if dt.is_finite() && dt > 0.0 {
            dt.min(self.max_frame_dt)
        } else {
            0.0
        };

        self.acc = (self.acc + dt).min(self.fixed_dt * self.max_fixed_steps as f32);

        let mut modules: Vec<Box<dyn Module>> = std::mem::take(&mut self.modules);
        let result = self.run_frame(&mut modules, dt);
        self.modules = modules;
        result
    }

    fn run_frame(&mut self, modules: &mut [Box<dyn Module>], dt: f32) -> EngineResult<Frame> {
        let fixed_step_count = (self.acc / self.fixed_dt) as u32;

        for fixed_step_index in 0..fixed_step_count {
            self.acc -= self.fixed_dt;
            self.fixed_tick = self.fixed_tick.wrapping_add(1);

            let fixed_frame = Frame {
                frame_index: self.frame_index,
                dt: self.fixed_dt,
                fixed_dt: self.fixed_dt,
                fixed_alpha: 0.0,
                fixed_step_count,
                fixed_step_index,
                fixed_tick: self.fixed_tick,
                fixed: true,
            };

            self.run_stage(modules, &fixed_frame, ModuleStage::FixedUpdate, |m, ctx| {
                m.fixed_update(ctx)
            })?;
        }

        let frame = Frame {
            frame_index: self.frame_index,
            dt,
            fixed_dt: self.fixed_dt,
            fixed_alpha: (self.acc / self.fixed_dt).clamp(0.0, 0.999_999),
            fixed_step_count,
            fixed_step_index: 0,
            fixed_tick: self.fixed_tick,
            fixed: false,
        };

        self.run_stage(modules, &frame, ModuleStage::Update, |m, ctx| m.update(ctx))?;

        self.scheduler.tick(frame.dt_f64())?;
        self.frame_index = self.frame_index.wrapping_add(1);

        self.propagate_shutdown_request();
        Ok(frame)
    }

    fn run_stage<F>(
        &mut self,
        modules: &mut [Box<dyn Module>],
        frame: &Frame,
        stage: ModuleStage,
        mut call: F,
    ) -> EngineResult<()>
    where
        F: FnMut(&mut dyn Module, &mut ModuleCtx<'_>) -> EngineResult<()>,
    {
        for m in modules.iter_mut() {
            self.sync_shutdown_state();

            {
                let mut ctx = ModuleCtx::new(&self.config, &mut self.scheduler, &mut self.exit_requested);
                ctx.set_frame(frame);

                call(m.as_mut(), &mut ctx).map_err(|e| EngineError::with_module_stage(m.id(), stage, e))?;
            }

            self.propagate_shutdown_request();
            if self.is_exit_requested() {
                return Err(EngineError::ExitRequested);
            }
        }
        Ok(())
    }

    /// Calls `shutdown` on every module in reverse order, then drops all timers.
    pub fn shutdown(&mut self) -> EngineResult<()> {
        self.sync_shutdown_state();

        for m in self.modules.iter_mut().rev() {
            let mut ctx = ModuleCtx::new(&self.config, &mut self.scheduler, &mut self.exit_requested);
            if let Err(e) = m.shutdown(&mut ctx) {
                let e = EngineError::with_module_stage(m.id(), ModuleStage::Shutdown, e);
                error!("{e}");
            }
        }

        // Releases every target reference still held by a timer.
        self.scheduler.unschedule_all();
        self.scheduler.tick(0.0)?;
        debug!("engine shutdown after {} frames", self.frame_index);
        Ok(())
    }

    #[inline]
    pub fn exit_requested(&self) -> bool {
        self.is_exit_requested()
    }

    #[inline]
    fn is_exit_requested(&self) -> bool {
        self.exit_requested || self.shutdown.is_requested()
    }

    #[inline]
    fn sync_shutdown_state(&mut self) {
        if self.shutdown.is_requested() {
            self.exit_requested = true;
        }
    }

    #[inline]
    fn propagate_shutdown_request(&mut self) {
        if self.exit_requested {
            self.shutdown.request();
        }
    }
}
