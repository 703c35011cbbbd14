//! Snapshot system: reads the grid and builds a `SimSnapshot`.
//!
//! Read-only. Call with the grid held at the high tier.

use patriots_core::state::{MissileView, SimSnapshot};

use crate::admission::AdmissionQueue;
use crate::grid::{Cell, Grid};
use crate::missile::Fleet;
use crate::slot_pool::SlotPool;

/// Build a complete snapshot of the visible state.
pub fn build_snapshot(
    grid: &Grid,
    fleet: &Fleet,
    admission: &AdmissionQueue,
    defender_slots: &SlotPool,
) -> SimSnapshot {
    SimSnapshot {
        score: grid.score(),
        missiles: build_missiles(grid, fleet),
        attacker_slots_free: admission.free_len(),
        defender_slots_free: defender_slots.available(),
    }
}

/// One view per occupied missile cell, in row-major order.
fn build_missiles(grid: &Grid, fleet: &Fleet) -> Vec<MissileView> {
    grid.missile_cells()
        .filter_map(|(pos, cell)| {
            let (occupant, tracked) = match cell {
                Cell::Attacker {
                    occupant,
                    tracked_by,
                } => (occupant, tracked_by.is_some_and(|d| fleet.defenders.is_live(d))),
                Cell::Defender { occupant } => (occupant, false),
                _ => return None,
            };
            Some(MissileView {
                side: occupant.side,
                slot: occupant.index,
                x: pos.x,
                y: pos.y,
                tracked,
            })
        })
        .collect()
}
