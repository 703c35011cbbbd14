//! Fundamental identity and score types.

use serde::{Deserialize, Serialize};

use crate::enums::Side;

/// Identity of a missile: arena slot plus the generation it was spawned in.
///
/// The slot index is recycled; the generation is bumped every time the slot
/// is reused, so a stale `EntityId` never aliases a newer missile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub side: Side,
    pub index: usize,
    pub generation: u32,
}

impl EntityId {
    pub fn new(side: Side, index: usize, generation: u32) -> Self {
        Self {
            side,
            index,
            generation,
        }
    }
}

/// Integer grid coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
}

impl CellPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Score counters. Both only ever increase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    /// Attackers that reached the goal band.
    pub attacker_points: u64,
    /// Interceptions.
    pub defender_points: u64,
}
