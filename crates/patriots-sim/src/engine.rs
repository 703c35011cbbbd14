//! Simulation engine: the shared context and the handle that runs it.
//!
//! `SimContext` holds everything tasks share: the grid behind its arbiter,
//! both missile arenas, the attacker admission queue, the interceptor slot
//! pool and the spawn RNG. `Simulation` starts the two launcher tasks on a
//! `PeriodicScheduler` and exposes the operations the input and render
//! sides need.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use patriots_core::config::SimConfig;
use patriots_core::enums::Side;
use patriots_core::error::ConfigError;
use patriots_core::state::SimSnapshot;
use patriots_core::types::Score;

use crate::admission::AdmissionQueue;
use crate::grid::{Grid, GridView, SharedGrid};
use crate::missile::Fleet;
use crate::scheduler::{PeriodicContext, PeriodicScheduler, SchedulerError, TaskHandle, TaskSpec};
use crate::slot_pool::SlotPool;
use crate::systems;
use crate::systems::lifecycle::SlotReturn;

/// State shared by every task of one run.
pub struct SimContext {
    pub config: SimConfig,
    pub grid: SharedGrid,
    pub fleet: Fleet,
    /// Attacker slots, handed out on operator request.
    pub admission: AdmissionQueue,
    /// Interceptor slots.
    pub defender_slots: SlotPool,
    rng: Mutex<ChaCha8Rng>,
    epoch: Instant,
}

impl SimContext {
    /// Build a fresh context. The config is assumed valid.
    pub fn new(config: SimConfig) -> Self {
        Self {
            grid: SharedGrid::new(Grid::new(&config.grid)),
            fleet: Fleet::new(config.attacker.capacity, config.defender.capacity),
            admission: AdmissionQueue::new(config.attacker.capacity),
            defender_slots: SlotPool::new(config.defender.capacity),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(config.seed)),
            epoch: Instant::now(),
            config,
        }
    }

    /// Where slots of `side` go back to.
    pub fn slot_return(&self, side: Side) -> &dyn SlotReturn {
        match side {
            Side::Attacker => &self.admission,
            Side::Defender => &self.defender_slots,
        }
    }

    /// Seconds since the context was created.
    pub fn elapsed_secs(&self) -> f32 {
        self.epoch.elapsed().as_secs_f32()
    }

    pub fn with_rng<R>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    pub fn snapshot(&self) -> SimSnapshot {
        let grid = self.grid.view();
        systems::snapshot::build_snapshot(&grid, &self.fleet, &self.admission, &self.defender_slots)
    }

    pub fn score(&self) -> Score {
        self.grid.view().score()
    }

    /// Unblock every launcher waiting on a slot.
    pub fn close(&self) {
        self.admission.close();
        self.defender_slots.close();
    }
}

/// A running (or ready to run) engagement.
pub struct Simulation {
    ctx: Arc<SimContext>,
    scheduler: Arc<dyn PeriodicScheduler>,
    launchers: Vec<TaskHandle>,
}

impl Simulation {
    /// Validate `config` and build the shared state. Nothing runs yet.
    pub fn new(config: SimConfig, scheduler: Arc<dyn PeriodicScheduler>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ctx: Arc::new(SimContext::new(config)),
            scheduler,
            launchers: Vec::new(),
        })
    }

    /// Start both launcher tasks.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        let config = &self.ctx.config;

        let attacker_spec = TaskSpec::new(
            "attacker-launcher",
            config.attacker.launcher_period(),
            config.attacker.launcher_priority,
        );
        let defender_spec = TaskSpec::new(
            "defender-launcher",
            config.defender.launcher_period(),
            config.defender.launcher_priority,
        );

        let (ctx, scheduler) = (Arc::clone(&self.ctx), Arc::clone(&self.scheduler));
        let attacker = self.scheduler.spawn_periodic(
            attacker_spec,
            Box::new(move |pctx: &PeriodicContext| {
                systems::launchers::run_attacker_launcher(&ctx, scheduler.as_ref(), pctx)
            }),
        )?;
        self.launchers.push(attacker);

        let (ctx, scheduler) = (Arc::clone(&self.ctx), Arc::clone(&self.scheduler));
        let defender = self.scheduler.spawn_periodic(
            defender_spec,
            Box::new(move |pctx: &PeriodicContext| {
                systems::launchers::run_defender_launcher(&ctx, scheduler.as_ref(), pctx)
            }),
        )?;
        self.launchers.push(defender);

        info!(
            attackers = self.ctx.config.attacker.capacity,
            interceptors = self.ctx.config.defender.capacity,
            seed = self.ctx.config.seed,
            "simulation started"
        );
        Ok(())
    }

    pub fn context(&self) -> &Arc<SimContext> {
        &self.ctx
    }

    pub fn config(&self) -> &SimConfig {
        &self.ctx.config
    }

    pub fn launchers(&self) -> &[TaskHandle] {
        &self.launchers
    }

    /// Ask for one attacker. Dropped silently when no launcher is ready or
    /// every attacker slot is in flight.
    pub fn submit_attack_request(&self) -> bool {
        let admitted = self.ctx.admission.submit_request();
        debug!(admitted, "attack requested");
        admitted
    }

    /// Read the grid at the render tier until the view drops.
    pub fn acquire_grid(&self) -> GridView<'_> {
        self.ctx.grid.view()
    }

    pub fn snapshot(&self) -> SimSnapshot {
        self.ctx.snapshot()
    }

    pub fn score(&self) -> Score {
        self.ctx.score()
    }

    /// Stop every task. Missiles in flight clear themselves and return their
    /// slots; the caller joins the scheduler's threads afterwards.
    pub fn stop(&self) {
        self.scheduler.request_stop();
        self.ctx.close();
        let score = self.ctx.score();
        info!(
            attacker_points = score.attacker_points,
            defender_points = score.defender_points,
            "simulation stopping"
        );
    }
}
