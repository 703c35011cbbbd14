//! Launcher task bodies.
//!
//! The attacker launcher turns admitted requests into missiles with random
//! spawn parameters. The defender launcher claims an untracked attacker,
//! samples it, predicts an intercept abscissa and launches straight up.

use std::sync::Arc;
use std::thread;

use glam::Vec2;
use rand::Rng;
use tracing::{debug, info, warn};

use patriots_core::config::{AttackerProfile, GridConfig, SimConfig};
use patriots_core::enums::{Side, Tier};
use patriots_core::types::EntityId;

use crate::engine::SimContext;
use crate::missile::MissileState;
use crate::predictor::{self, InterceptGeometry, TimedSample};
use crate::scheduler::{PeriodicContext, PeriodicScheduler, SchedulerError, TaskHandle, TaskSpec};
use crate::systems::lifecycle::MissileTask;
use crate::systems::tracking;

/// Random spawn: just below the top wall, anywhere across the interior,
/// heading somewhere downward.
pub fn attacker_spawn_state(
    grid: &GridConfig,
    profile: &AttackerProfile,
    rng: &mut impl Rng,
) -> MissileState {
    let x = rng.gen_range(grid.min_interior_x()..=grid.max_interior_x()) as f32;
    let y = (grid.wall_thickness + grid.missile_radius + 1) as f32;
    let speed = if profile.max_speed > 1.0 {
        rng.gen_range(1.0..profile.max_speed)
    } else {
        1.0
    };
    let angle = rng.gen_range(profile.max_angle..180.0 - profile.max_angle);
    MissileState::new(Side::Attacker, Vec2::new(x, y), speed, angle)
}

/// Initialize an attacker in slot `index`.
pub fn launch_attacker(ctx: &SimContext, index: usize) -> EntityId {
    let state = ctx.with_rng(|rng| attacker_spawn_state(&ctx.config.grid, &ctx.config.attacker, rng));
    ctx.fleet.attackers.spawn(index, state)
}

/// Start the periodic task that flies `id`.
pub fn start_missile_task(
    ctx: &Arc<SimContext>,
    scheduler: &dyn PeriodicScheduler,
    id: EntityId,
) -> Result<TaskHandle, SchedulerError> {
    let (period, priority) = missile_timing(&ctx.config, id.side);
    let spec = TaskSpec::new(format!("{}-{}", side_label(id.side), id.index), period, priority);
    let task_ctx = Arc::clone(ctx);
    scheduler.spawn_periodic(
        spec,
        Box::new(move |pctx: &PeriodicContext| {
            MissileTask::new(task_ctx, id, pctx.delta_time()).run(pctx)
        }),
    )
}

fn missile_timing(config: &SimConfig, side: Side) -> (std::time::Duration, u8) {
    match side {
        Side::Attacker => (config.attacker.missile_period(), config.attacker.missile_priority),
        Side::Defender => (config.defender.missile_period(), config.defender.missile_priority),
    }
}

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Attacker => "attacker",
        Side::Defender => "interceptor",
    }
}

/// Undo a spawn whose task never started. The missile never touched the grid.
pub fn abandon(ctx: &SimContext, id: EntityId) {
    ctx.fleet.arena(id.side).vacate(id);
    ctx.slot_return(id.side).return_slot(id.index);
}

/// Attacker launcher body: draw, launch, cool down.
pub fn run_attacker_launcher(
    ctx: &Arc<SimContext>,
    scheduler: &dyn PeriodicScheduler,
    pctx: &PeriodicContext,
) {
    let cooldown = ctx.config.attacker.cooldown();
    while pctx.is_running() {
        let Some(index) = ctx.admission.draw() else {
            break;
        };
        if !pctx.is_running() {
            ctx.admission.release(index);
            break;
        }

        let id = launch_attacker(ctx, index);
        match start_missile_task(ctx, scheduler, id) {
            Ok(handle) => info!(missile = ?id, task = %handle.name, "attacker launched"),
            Err(err) => {
                warn!(missile = ?id, error = %err, "attacker launch aborted");
                abandon(ctx, id);
                break;
            }
        }
        thread::sleep(cooldown);
    }
    debug!("attacker launcher stopped");
}

/// Defender launcher body: one engagement attempt per period.
pub fn run_defender_launcher(
    ctx: &Arc<SimContext>,
    scheduler: &dyn PeriodicScheduler,
    pctx: &PeriodicContext,
) {
    while pctx.is_running() {
        engage_next_target(ctx, scheduler, pctx);
        pctx.wait_for_period();
    }
    debug!("defender launcher stopped");
}

/// Claim an untracked attacker and launch an interceptor at it.
///
/// Blocks for a free interceptor slot. Returns the interceptor's identity if
/// one was launched.
pub fn engage_next_target(
    ctx: &Arc<SimContext>,
    scheduler: &dyn PeriodicScheduler,
    pctx: &PeriodicContext,
) -> Option<EntityId> {
    let defender = &ctx.config.defender;
    let index = ctx.defender_slots.acquire()?;

    // Reserve the interceptor first so the claim names a live entity.
    let interceptor = ctx.fleet.defenders.spawn(
        index,
        MissileState::new(Side::Defender, Vec2::ZERO, 0.0, defender.angle),
    );

    let claim = {
        let mut grid = ctx.grid.acquire(Tier::Low);
        tracking::claim_untracked_target(&mut grid, &ctx.fleet, interceptor)
    };
    let Some(claim) = claim else {
        abandon(ctx, interceptor);
        return None;
    };
    debug!(interceptor = ?interceptor, target = ?claim.target, x = claim.position.x, y = claim.position.y, "target claimed");

    let samples = predictor::sample_target(
        &ctx.config.predictor,
        || {
            ctx.fleet
                .attackers
                .with(claim.target, |m| {
                    (!m.deleted).then(|| TimedSample::new(m.partial.x, m.partial.y, ctx.elapsed_secs()))
                })
                .flatten()
        },
        || {
            pctx.wait_for_period();
            pctx.is_running()
        },
    );
    if !pctx.is_running() {
        abandon(ctx, interceptor);
        return None;
    }

    let geometry = intercept_geometry(&ctx.config);
    let prediction = predictor::predict_intercept(
        &samples,
        claim.position.x as f32,
        &geometry,
        &ctx.config.predictor,
    );
    let x = prediction.x().clamp(geometry.min_x, geometry.max_x);
    debug!(target = ?claim.target, samples = samples.len(), ?prediction, "intercept predicted");

    ctx.fleet.defenders.with_mut(interceptor, |m| {
        m.launch_from(Vec2::new(x, geometry.launch_y), defender.speed, defender.angle)
    });

    match start_missile_task(ctx, scheduler, interceptor) {
        Ok(handle) => {
            info!(interceptor = ?interceptor, target = ?claim.target, x, task = %handle.name, "interceptor launched");
            Some(interceptor)
        }
        Err(err) => {
            warn!(interceptor = ?interceptor, error = %err, "interceptor launch aborted");
            abandon(ctx, interceptor);
            None
        }
    }
}

/// Launch row, interceptor speed and usable abscissas from the config.
pub fn intercept_geometry(config: &SimConfig) -> InterceptGeometry {
    InterceptGeometry {
        launch_y: config.launch_row() as f32,
        interceptor_speed: config.defender.speed,
        min_x: config.grid.min_interior_x() as f32,
        max_x: config.grid.max_interior_x() as f32,
    }
}
