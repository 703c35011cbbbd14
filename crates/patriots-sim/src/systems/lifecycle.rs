//! Missile task state machine.
//!
//! One driver serves both sides. What differs is the period it runs at and
//! where its slot index goes back to, both looked up from the missile's side.

use std::sync::Arc;

use tracing::{debug, info};

use patriots_core::enums::{MissilePhase, Side, Tier};
use patriots_core::types::{CellPos, EntityId};

use crate::admission::AdmissionQueue;
use crate::engine::SimContext;
use crate::grid::{Cell, Collision};
use crate::scheduler::PeriodicContext;
use crate::slot_pool::SlotPool;

/// Where a finished missile returns its slot index.
pub trait SlotReturn: Send + Sync {
    fn return_slot(&self, index: usize);
}

impl SlotReturn for SlotPool {
    fn return_slot(&self, index: usize) {
        self.release(index);
    }
}

impl SlotReturn for AdmissionQueue {
    fn return_slot(&self, index: usize) {
        self.release(index);
    }
}

/// Drives one missile from spawn to slot release.
pub struct MissileTask {
    ctx: Arc<SimContext>,
    id: EntityId,
    /// Seconds per period.
    dt: f32,
    phase: MissilePhase,
}

impl MissileTask {
    pub fn new(ctx: Arc<SimContext>, id: EntityId, dt: f32) -> Self {
        Self {
            ctx,
            id,
            dt,
            phase: MissilePhase::Spawned,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn phase(&self) -> MissilePhase {
        self.phase
    }

    /// Task body: step once per period until cleared.
    pub fn run(mut self, pctx: &PeriodicContext) {
        loop {
            if !pctx.is_running() {
                self.ctx.fleet.mark_deleted(self.id);
            }
            if self.step() == MissilePhase::Cleared {
                break;
            }
            pctx.wait_for_period();
        }
    }

    /// One period of work.
    pub fn step(&mut self) -> MissilePhase {
        self.phase = match self.phase {
            MissilePhase::Spawned | MissilePhase::Moving => self.advance(),
            MissilePhase::Collided | MissilePhase::ExternallyDeleted => {
                self.clear_own_cell();
                self.finish()
            }
            MissilePhase::Cleared => MissilePhase::Cleared,
        };
        self.phase
    }

    fn advance(&mut self) -> MissilePhase {
        let ctx = Arc::clone(&self.ctx);
        let arena = ctx.fleet.arena(self.id.side);
        let Some(step) = arena.advance(self.id, self.dt) else {
            return self.stop_on_request();
        };
        let radius = ctx.config.grid.missile_radius;

        let mut grid = ctx.grid.acquire(Tier::Middle);
        let previous = grid.clear_if_owned(step.from, self.id);

        // Destroyed by someone else's move after we checked the flag.
        if !arena.is_active(self.id) {
            drop(grid);
            return self.stop_on_request();
        }

        match grid.resolve_collisions_around(self.id, step.to, radius, &ctx.fleet) {
            None => {
                grid.place(step.to, moved_cell(previous, self.id));
                MissilePhase::Moving
            }
            Some(collision) => {
                drop(grid);
                log_collision(self.id, step.to, collision);
                MissilePhase::Collided
            }
        }
    }

    fn stop_on_request(&mut self) -> MissilePhase {
        self.phase = MissilePhase::ExternallyDeleted;
        debug!(missile = ?self.id, "stop requested");
        self.clear_own_cell();
        self.finish()
    }

    fn clear_own_cell(&self) {
        let Some(pos) = self.position() else {
            return;
        };
        let mut grid = self.ctx.grid.acquire(Tier::Middle);
        grid.clear_if_owned(pos, self.id);
    }

    fn position(&self) -> Option<CellPos> {
        self.ctx.fleet.arena(self.id.side).with(self.id, |m| m.cell)
    }

    /// Vacate the entity, then give the slot index back.
    fn finish(&mut self) -> MissilePhase {
        let state = self.ctx.fleet.arena(self.id.side).vacate(self.id);
        self.ctx.slot_return(self.id.side).return_slot(self.id.index);
        info!(
            missile = ?self.id,
            x = state.cell.x,
            y = state.cell.y,
            via = ?self.phase,
            "missile cleared"
        );
        MissilePhase::Cleared
    }
}

/// The cell a mover leaves behind at its new position. Attackers keep the
/// tracking marker they carried.
fn moved_cell(previous: Option<Cell>, id: EntityId) -> Cell {
    match previous {
        Some(Cell::Attacker { tracked_by, .. }) if id.side == Side::Attacker => Cell::Attacker {
            occupant: id,
            tracked_by,
        },
        _ => Cell::missile(id),
    }
}

fn log_collision(id: EntityId, at: CellPos, collision: Collision) {
    match collision {
        Collision::Intercept(victim) => {
            info!(missile = ?id, victim = ?victim, x = at.x, y = at.y, "interception")
        }
        Collision::Goal => info!(missile = ?id, x = at.x, "attacker reached the goal"),
        Collision::Friendly(victim) => {
            debug!(missile = ?id, victim = ?victim, "friendly collision")
        }
        Collision::Wall | Collision::OffGrid => {
            debug!(missile = ?id, x = at.x, y = at.y, ?collision, "left the field")
        }
    }
}
