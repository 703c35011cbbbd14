//! Simulation snapshot — the visible state handed to a renderer or logger.

use serde::{Deserialize, Serialize};

use crate::enums::Side;
use crate::types::Score;

/// Everything a render pass reads from the grid, captured under the high tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub score: Score,
    pub missiles: Vec<MissileView>,
    pub attacker_slots_free: usize,
    pub defender_slots_free: usize,
}

/// One occupied missile cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissileView {
    pub side: Side,
    pub slot: usize,
    pub x: i32,
    pub y: i32,
    /// Attacker cells only: a live defender has claimed this target.
    pub tracked: bool,
}

impl SimSnapshot {
    pub fn count(&self, side: Side) -> usize {
        self.missiles.iter().filter(|m| m.side == side).count()
    }
}
