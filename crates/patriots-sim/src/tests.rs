//! Tests for missile lifecycles, target tracking, launchers and full runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use patriots_core::config::SimConfig;
use patriots_core::enums::{MissilePhase, Side, Tier};
use patriots_core::types::{CellPos, EntityId, Score};

use crate::engine::{SimContext, Simulation};
use crate::grid::Cell;
use crate::missile::MissileState;
use crate::scheduler::{
    PeriodicContext, PeriodicScheduler, SchedulerError, TaskBody, TaskHandle, TaskSpec, TaskStats,
    ThreadScheduler,
};
use crate::systems::launchers;
use crate::systems::lifecycle::MissileTask;
use crate::systems::tracking;

const DT: f32 = 0.02;

fn context() -> Arc<SimContext> {
    Arc::new(SimContext::new(SimConfig::default()))
}

/// Take an attacker slot the way the launcher does: a drawer blocks, a
/// request is admitted.
fn draw_attacker_slot(ctx: &SimContext) -> usize {
    thread::scope(|s| {
        let drawer = s.spawn(|| ctx.admission.draw());
        while ctx.admission.waiting_drawers() == 0 {
            thread::yield_now();
        }
        assert!(ctx.admission.submit_request());
        drawer.join().unwrap().unwrap()
    })
}

fn spawn_attacker(ctx: &SimContext, x: f32, y: f32, speed: f32, angle: f32) -> EntityId {
    let index = draw_attacker_slot(ctx);
    ctx.fleet.attackers.spawn(
        index,
        MissileState::new(Side::Attacker, Vec2::new(x, y), speed, angle),
    )
}

fn spawn_defender(ctx: &SimContext, x: f32, y: f32, speed: f32) -> EntityId {
    let index = ctx.defender_slots.try_acquire().unwrap();
    ctx.fleet.defenders.spawn(
        index,
        MissileState::new(Side::Defender, Vec2::new(x, y), speed, 270.0),
    )
}

fn run_until(task: &mut MissileTask, phase: MissilePhase, max_steps: usize) {
    for _ in 0..max_steps {
        if task.step() == phase {
            return;
        }
    }
    panic!("{:?} never reached {phase:?}, stuck in {:?}", task.id(), task.phase());
}

fn assert_all_returned(ctx: &SimContext) {
    assert_eq!(ctx.fleet.live_count(), 0);
    assert_eq!(ctx.admission.free_len(), ctx.config.attacker.capacity);
    assert_eq!(ctx.defender_slots.available(), ctx.config.defender.capacity);
    assert_eq!(ctx.grid.acquire(Tier::High).missile_cells().count(), 0);
}

/// Records what would be started without running anything.
#[derive(Default)]
struct RecordingScheduler {
    started: Mutex<Vec<TaskSpec>>,
    next_id: AtomicU64,
}

impl PeriodicScheduler for RecordingScheduler {
    fn spawn_periodic(&self, spec: TaskSpec, _body: TaskBody) -> Result<TaskHandle, SchedulerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = TaskHandle::new(id, spec.name.clone(), Arc::new(TaskStats::default()));
        self.started.lock().unwrap().push(spec);
        Ok(handle)
    }

    fn request_stop(&self) {}

    fn is_running(&self) -> bool {
        true
    }
}

// ---- Missile lifecycle ----

#[test]
fn test_stationary_pair_scores_one_interception() {
    let ctx = context();
    let defender = spawn_defender(&ctx, 100.0, 101.0, 0.0);
    let attacker = spawn_attacker(&ctx, 100.0, 100.0, 0.0, 90.0);

    let mut defender_task = MissileTask::new(Arc::clone(&ctx), defender, DT);
    let mut attacker_task = MissileTask::new(Arc::clone(&ctx), attacker, DT);

    assert_eq!(defender_task.step(), MissilePhase::Moving);
    assert_eq!(
        ctx.grid.acquire(Tier::High).cell(CellPos::new(100, 101)),
        Some(Cell::missile(defender))
    );

    assert_eq!(attacker_task.step(), MissilePhase::Collided);
    assert_eq!(attacker_task.step(), MissilePhase::Cleared);
    assert_eq!(defender_task.step(), MissilePhase::Cleared);
    // Terminal.
    assert_eq!(defender_task.step(), MissilePhase::Cleared);

    assert_eq!(
        ctx.score(),
        Score {
            attacker_points: 0,
            defender_points: 1
        }
    );
    assert_all_returned(&ctx);
}

#[test]
fn test_free_flight_leaves_one_cell_and_no_score() {
    let ctx = context();
    let attacker = spawn_attacker(&ctx, 100.0, 100.0, 50.0, 90.0);
    let mut task = MissileTask::new(Arc::clone(&ctx), attacker, DT);

    for _ in 0..10 {
        assert_eq!(task.step(), MissilePhase::Moving);
    }

    let grid = ctx.grid.acquire(Tier::High);
    let cells: Vec<_> = grid.missile_cells().collect();
    assert_eq!(cells, vec![(CellPos::new(100, 110), Cell::missile(attacker))]);
    assert_eq!(grid.score(), Score::default());
}

#[test]
fn test_attacker_reaching_goal_scores() {
    let ctx = context();
    let attacker = spawn_attacker(&ctx, 200.0, 370.0, 100.0, 90.0);
    let mut task = MissileTask::new(Arc::clone(&ctx), attacker, DT);

    run_until(&mut task, MissilePhase::Collided, 20);
    assert_eq!(task.step(), MissilePhase::Cleared);
    assert_eq!(ctx.score().attacker_points, 1);
    assert_eq!(ctx.score().defender_points, 0);
    assert_all_returned(&ctx);
}

#[test]
fn test_interceptor_clears_at_top_wall() {
    let ctx = context();
    let defender = spawn_defender(&ctx, 300.0, 40.0, 150.0);
    let mut task = MissileTask::new(Arc::clone(&ctx), defender, DT);

    run_until(&mut task, MissilePhase::Collided, 30);
    assert_eq!(task.step(), MissilePhase::Cleared);
    assert_eq!(ctx.score(), Score::default());
    assert_all_returned(&ctx);
}

#[test]
fn test_friendly_collision_deletes_other_missile() {
    let ctx = context();
    let first = spawn_attacker(&ctx, 150.0, 100.0, 0.0, 90.0);
    let second = spawn_attacker(&ctx, 150.0, 103.0, 0.0, 90.0);
    let mut first_task = MissileTask::new(Arc::clone(&ctx), first, DT);
    let mut second_task = MissileTask::new(Arc::clone(&ctx), second, DT);

    assert_eq!(first_task.step(), MissilePhase::Moving);
    assert_eq!(second_task.step(), MissilePhase::Collided);
    assert!(!ctx.fleet.is_active(first));

    assert_eq!(first_task.step(), MissilePhase::Cleared);
    assert_eq!(second_task.step(), MissilePhase::Cleared);
    assert_eq!(ctx.score(), Score::default());
    assert_all_returned(&ctx);
}

#[test]
fn test_external_delete_clears_cell_and_slot() {
    let ctx = context();
    let attacker = spawn_attacker(&ctx, 250.0, 120.0, 20.0, 90.0);
    let mut task = MissileTask::new(Arc::clone(&ctx), attacker, DT);
    task.step();
    task.step();
    assert_eq!(ctx.grid.acquire(Tier::High).missile_cells().count(), 1);

    assert!(ctx.fleet.mark_deleted(attacker));
    assert_eq!(task.step(), MissilePhase::Cleared);
    assert_all_returned(&ctx);
    assert!(!ctx.fleet.mark_deleted(attacker));
}

#[test]
fn test_reused_slot_gets_new_identity() {
    let ctx = context();
    let first = spawn_attacker(&ctx, 250.0, 120.0, 0.0, 90.0);
    ctx.fleet.mark_deleted(first);
    let mut task = MissileTask::new(Arc::clone(&ctx), first, DT);
    assert_eq!(task.step(), MissilePhase::Cleared);

    let mut second = spawn_attacker(&ctx, 260.0, 120.0, 0.0, 90.0);
    while second.index != first.index {
        // Indices come back in any order; cycle until the same slot recurs.
        ctx.fleet.attackers.vacate(second);
        ctx.admission.release(second.index);
        second = spawn_attacker(&ctx, 260.0, 120.0, 0.0, 90.0);
    }
    assert_ne!(second.generation, first.generation);
    assert!(!ctx.fleet.is_active(first));
    assert!(ctx.fleet.is_active(second));
}

// ---- Tracking ----

#[test]
fn test_claim_marks_target_and_travels_with_it() {
    let ctx = context();
    let attacker = spawn_attacker(&ctx, 200.0, 100.0, 50.0, 90.0);
    let mut task = MissileTask::new(Arc::clone(&ctx), attacker, DT);
    task.step();

    let first = spawn_defender(&ctx, 0.0, 0.0, 0.0);
    let claim = {
        let mut grid = ctx.grid.acquire(Tier::Low);
        tracking::claim_untracked_target(&mut grid, &ctx.fleet, first)
    }
    .unwrap();
    assert_eq!(claim.target, attacker);
    assert_eq!(claim.position, CellPos::new(200, 101));
    assert_eq!(
        ctx.fleet.defenders.with(first, |m| m.assigned_target),
        Some(Some(attacker))
    );

    task.step();
    assert_eq!(
        ctx.grid.acquire(Tier::High).cell(CellPos::new(200, 102)),
        Some(Cell::Attacker {
            occupant: attacker,
            tracked_by: Some(first)
        })
    );
    assert!(ctx.snapshot().missiles[0].tracked);

    // Already claimed.
    let second = spawn_defender(&ctx, 0.0, 0.0, 0.0);
    {
        let mut grid = ctx.grid.acquire(Tier::Low);
        assert_eq!(tracking::claim_untracked_target(&mut grid, &ctx.fleet, second), None);
    }

    // The claim lapses with its interceptor.
    launchers::abandon(&ctx, first);
    let reclaimed = {
        let mut grid = ctx.grid.acquire(Tier::Low);
        tracking::claim_untracked_target(&mut grid, &ctx.fleet, second)
    };
    assert_eq!(reclaimed.map(|c| c.target), Some(attacker));
}

#[test]
fn test_empty_sky_yields_no_claim() {
    let ctx = context();
    let defender = spawn_defender(&ctx, 0.0, 0.0, 0.0);
    let mut grid = ctx.grid.acquire(Tier::Low);
    assert_eq!(tracking::claim_untracked_target(&mut grid, &ctx.fleet, defender), None);
}

// ---- Launchers ----

#[test]
fn test_attacker_spawn_is_seeded_and_in_bounds() {
    let config = SimConfig::default();
    let mut rng_a = ChaCha8Rng::seed_from_u64(7);
    let mut rng_b = ChaCha8Rng::seed_from_u64(7);

    for _ in 0..200 {
        let a = launchers::attacker_spawn_state(&config.grid, &config.attacker, &mut rng_a);
        let b = launchers::attacker_spawn_state(&config.grid, &config.attacker, &mut rng_b);
        assert_eq!(a, b);

        assert!((config.grid.min_interior_x()..=config.grid.max_interior_x()).contains(&a.cell.x));
        assert_eq!(a.cell.y, 8);
        assert!((1.0..100.0).contains(&a.speed));
        assert!((30.0..150.0).contains(&a.angle));
        assert!(a.velocity().y > 0.0);
    }
}

#[test]
fn test_engagement_launches_at_stationary_target() {
    let ctx = context();
    let attacker = spawn_attacker(&ctx, 300.0, 150.0, 0.0, 90.0);
    MissileTask::new(Arc::clone(&ctx), attacker, DT).step();

    let scheduler = RecordingScheduler::default();
    let pctx = PeriodicContext::detached("defender-launcher", Duration::from_millis(2));
    let interceptor = launchers::engage_next_target(&ctx, &scheduler, &pctx).unwrap();

    let state = ctx.fleet.defenders.with(interceptor, MissileState::clone).unwrap();
    assert_eq!(state.cell, CellPos::new(300, ctx.config.launch_row()));
    assert_eq!(state.assigned_target, Some(attacker));
    assert_eq!(state.speed, ctx.config.defender.speed);

    let started = scheduler.started.lock().unwrap();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].name, format!("interceptor-{}", interceptor.index));
    assert_eq!(started[0].period, Duration::from_millis(20));
    assert_eq!(ctx.defender_slots.in_use(), 1);
}

#[test]
fn test_engagement_without_target_returns_slot() {
    let ctx = context();
    let scheduler = RecordingScheduler::default();
    let pctx = PeriodicContext::detached("defender-launcher", Duration::from_millis(2));

    assert_eq!(launchers::engage_next_target(&ctx, &scheduler, &pctx), None);
    assert_all_returned(&ctx);
    assert!(scheduler.started.lock().unwrap().is_empty());
}

#[test]
fn test_refused_launch_releases_claim() {
    let ctx = context();
    let attacker = spawn_attacker(&ctx, 300.0, 150.0, 0.0, 90.0);
    MissileTask::new(Arc::clone(&ctx), attacker, DT).step();

    let stopped = ThreadScheduler::new();
    stopped.request_stop();
    let pctx = PeriodicContext::detached("defender-launcher", Duration::from_millis(2));
    assert_eq!(launchers::engage_next_target(&ctx, &stopped, &pctx), None);

    assert_eq!(ctx.defender_slots.available(), ctx.config.defender.capacity);
    assert!(tracking::is_unclaimed(&ctx.fleet, attacker, None));
}

// ---- Snapshot ----

#[test]
fn test_snapshot_lists_missiles_and_free_slots() {
    let ctx = context();
    let attacker = spawn_attacker(&ctx, 120.0, 60.0, 0.0, 90.0);
    let defender = spawn_defender(&ctx, 400.0, 300.0, 0.0);
    MissileTask::new(Arc::clone(&ctx), attacker, DT).step();
    MissileTask::new(Arc::clone(&ctx), defender, DT).step();

    let snap = ctx.snapshot();
    assert_eq!(snap.count(Side::Attacker), 1);
    assert_eq!(snap.count(Side::Defender), 1);
    assert_eq!(snap.attacker_slots_free, ctx.config.attacker.capacity - 1);
    assert_eq!(snap.defender_slots_free, ctx.config.defender.capacity - 1);
    assert_eq!((snap.missiles[0].x, snap.missiles[0].y), (120, 60));
    assert!(!snap.missiles[0].tracked);

    let json = serde_json::to_string(&snap).unwrap();
    assert!(json.contains("\"attacker_slots_free\""));
}

#[test]
fn test_render_view_reads_grid_and_releases_tier() {
    let scheduler: Arc<dyn PeriodicScheduler> = Arc::new(RecordingScheduler::default());
    let sim = Simulation::new(SimConfig::default(), scheduler).unwrap();
    let grid = &sim.config().grid;
    {
        let view = sim.acquire_grid();
        assert_eq!(view.cells().count(), (grid.width * grid.height) as usize);
        assert_eq!(view.cell(CellPos::new(0, 0)), Some(Cell::Wall));
        assert_eq!(sim.context().grid.arbiter().holders(), 1);
    }
    assert_eq!(sim.context().grid.arbiter().holders(), 0);
}

// ---- Full runs ----

fn quick_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.attacker.cooldown_ms = 10;
    config
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = SimConfig::default();
    config.attacker.capacity = 0;
    let scheduler: Arc<dyn PeriodicScheduler> = Arc::new(ThreadScheduler::new());
    assert!(Simulation::new(config, scheduler).is_err());
}

#[test]
fn test_threaded_run_shuts_down_cleanly() {
    let scheduler = Arc::new(ThreadScheduler::new());
    let mut sim = Simulation::new(
        quick_config(),
        Arc::clone(&scheduler) as Arc<dyn PeriodicScheduler>,
    )
    .unwrap();
    sim.start().unwrap();
    assert_eq!(sim.launchers().len(), 2);

    let started = Instant::now();
    let mut admitted = 0;
    let mut last = Score::default();
    while started.elapsed() < Duration::from_millis(1500) {
        if sim.submit_attack_request() {
            admitted += 1;
        }
        let score = sim.score();
        assert!(score.attacker_points >= last.attacker_points);
        assert!(score.defender_points >= last.defender_points);
        last = score;

        let snap = sim.snapshot();
        assert!(snap.count(Side::Attacker) <= sim.config().attacker.capacity);
        assert!(snap.count(Side::Defender) <= sim.config().defender.capacity);
        thread::sleep(Duration::from_millis(15));
    }
    assert!(admitted > 0);

    sim.stop();
    scheduler.join_all();
    assert_all_returned(sim.context());
    assert!(!sim.submit_attack_request());
}
