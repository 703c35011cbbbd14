//! Target discovery: find an attacker no live interceptor is after yet.

use patriots_core::types::{CellPos, EntityId};

use crate::grid::{Cell, Grid};
use crate::missile::Fleet;

/// An attacker claimed by an interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub target: EntityId,
    /// Where the target was when it was claimed.
    pub position: CellPos,
}

/// Scan the grid row-major and claim the first unclaimed attacker for
/// `interceptor`. Call with the grid held at the low tier.
pub fn claim_untracked_target(grid: &mut Grid, fleet: &Fleet, interceptor: EntityId) -> Option<Claim> {
    let claim = grid.missile_cells().find_map(|(position, cell)| match cell {
        Cell::Attacker {
            occupant,
            tracked_by,
        } if is_unclaimed(fleet, occupant, tracked_by) => Some(Claim {
            target: occupant,
            position,
        }),
        _ => None,
    })?;

    grid.stamp_tracking(claim.position, interceptor);
    fleet
        .defenders
        .with_mut(interceptor, |m| m.assigned_target = Some(claim.target));
    Some(claim)
}

/// Neither the cell marker nor any live interceptor's assignment names a
/// live claimant. Claims lapse when the interceptor is cleared.
pub fn is_unclaimed(fleet: &Fleet, target: EntityId, tracked_by: Option<EntityId>) -> bool {
    if !fleet.attackers.is_active(target) {
        return false;
    }
    if tracked_by.is_some_and(|d| fleet.defenders.is_live(d)) {
        return false;
    }
    !fleet.is_engaged(target)
}
