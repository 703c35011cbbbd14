//! Missile entities and the per-side arenas that hold them.
//!
//! Each arena slot is guarded by its own mutex. Identities carry a generation
//! so a handle kept across a slot's reuse simply stops resolving.

use std::sync::{Mutex, MutexGuard, PoisonError};

use glam::Vec2;

use patriots_core::enums::Side;
use patriots_core::types::{CellPos, EntityId};

/// Kinematic and bookkeeping state of one missile.
#[derive(Debug, Clone, PartialEq)]
pub struct MissileState {
    pub side: Side,
    /// Integer cell the missile occupies.
    pub cell: CellPos,
    /// Sub-cell position accumulator.
    pub partial: Vec2,
    /// Cells per second.
    pub speed: f32,
    /// Heading in degrees; 90 points down the grid.
    pub angle: f32,
    /// Set by another task (or shutdown) to ask this missile to stop.
    pub deleted: bool,
    /// Defenders only: the attacker this interceptor was launched at.
    pub assigned_target: Option<EntityId>,
}

impl MissileState {
    pub fn new(side: Side, origin: Vec2, speed: f32, angle: f32) -> Self {
        Self {
            side,
            cell: to_cell(origin),
            partial: origin,
            speed,
            angle,
            deleted: false,
            assigned_target: None,
        }
    }

    /// Unit heading vector.
    pub fn heading(&self) -> Vec2 {
        Vec2::from_angle(self.angle.to_radians())
    }

    /// Velocity in cells per second.
    pub fn velocity(&self) -> Vec2 {
        self.heading() * self.speed
    }

    /// Advance the accumulator by `dt` seconds and truncate to a cell.
    pub fn integrate(&mut self, dt: f32) {
        self.partial += self.velocity() * dt;
        self.cell = to_cell(self.partial);
    }

    /// Move a reserved interceptor onto its launch point.
    pub fn launch_from(&mut self, origin: Vec2, speed: f32, angle: f32) {
        self.partial = origin;
        self.cell = to_cell(origin);
        self.speed = speed;
        self.angle = angle;
    }
}

fn to_cell(p: Vec2) -> CellPos {
    CellPos::new(p.x as i32, p.y as i32)
}

/// Cell positions before and after one integration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub from: CellPos,
    pub to: CellPos,
}

#[derive(Debug, Default)]
struct ArenaSlot {
    generation: u32,
    missile: Option<MissileState>,
}

/// Fixed-size storage for the missiles of one side.
#[derive(Debug)]
pub struct MissileArena {
    side: Side,
    slots: Vec<Mutex<ArenaSlot>>,
}

impl MissileArena {
    pub fn new(side: Side, capacity: usize) -> Self {
        Self {
            side,
            slots: (0..capacity).map(|_| Mutex::new(ArenaSlot::default())).collect(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, index: usize) -> MutexGuard<'_, ArenaSlot> {
        assert!(
            index < self.slots.len(),
            "{:?} arena index {index} out of range",
            self.side
        );
        self.slots[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the slot behind `id` if it still holds that missile.
    fn resolve(&self, id: EntityId) -> Option<MutexGuard<'_, ArenaSlot>> {
        if id.side != self.side || id.index >= self.slots.len() {
            return None;
        }
        let slot = self.slot(id.index);
        (slot.generation == id.generation && slot.missile.is_some()).then_some(slot)
    }

    /// Install a missile in an empty slot under a fresh generation.
    ///
    /// # Panics
    /// If the slot is occupied or `state.side` belongs to the other arena.
    pub fn spawn(&self, index: usize, state: MissileState) -> EntityId {
        assert_eq!(state.side, self.side, "missile spawned into the wrong arena");
        let mut slot = self.slot(index);
        assert!(
            slot.missile.is_none(),
            "{:?} slot {index} reused before its task finished",
            self.side
        );
        slot.generation = slot.generation.wrapping_add(1);
        slot.missile = Some(state);
        EntityId::new(self.side, index, slot.generation)
    }

    /// Run `f` on the missile under its lock.
    pub fn with<R>(&self, id: EntityId, f: impl FnOnce(&MissileState) -> R) -> Option<R> {
        let slot = self.resolve(id)?;
        slot.missile.as_ref().map(f)
    }

    /// Run `f` on the missile under its lock, mutably.
    pub fn with_mut<R>(&self, id: EntityId, f: impl FnOnce(&mut MissileState) -> R) -> Option<R> {
        let mut slot = self.resolve(id)?;
        slot.missile.as_mut().map(f)
    }

    /// The slot still holds this generation.
    pub fn is_live(&self, id: EntityId) -> bool {
        self.resolve(id).is_some()
    }

    /// Live and not asked to stop.
    pub fn is_active(&self, id: EntityId) -> bool {
        self.with(id, |m| !m.deleted).unwrap_or(false)
    }

    /// Set the deleted flag. Returns `false` for stale identities.
    pub fn mark_deleted(&self, id: EntityId) -> bool {
        self.with_mut(id, |m| m.deleted = true).is_some()
    }

    /// One integration step, unless the missile was asked to stop.
    ///
    /// Returns `None` if the flag is set or the identity is stale.
    pub fn advance(&self, id: EntityId, dt: f32) -> Option<Advance> {
        self.with_mut(id, |m| {
            if m.deleted {
                return None;
            }
            let from = m.cell;
            m.integrate(dt);
            Some(Advance { from, to: m.cell })
        })
        .flatten()
    }

    /// Empty the slot. The generation stays, so `id` no longer resolves.
    ///
    /// # Panics
    /// If `id` does not name the current occupant.
    pub fn vacate(&self, id: EntityId) -> MissileState {
        let mut slot = self.slot(id.index);
        assert_eq!(
            slot.generation, id.generation,
            "vacating {id:?} after its slot was reused"
        );
        match slot.missile.take() {
            Some(state) => state,
            None => panic!("vacating {id:?} twice"),
        }
    }

    /// Identities of every occupied slot.
    pub fn live_ids(&self) -> Vec<EntityId> {
        (0..self.slots.len())
            .filter_map(|index| {
                let slot = self.slot(index);
                slot.missile
                    .as_ref()
                    .map(|_| EntityId::new(self.side, index, slot.generation))
            })
            .collect()
    }
}

/// Both arenas.
#[derive(Debug)]
pub struct Fleet {
    pub attackers: MissileArena,
    pub defenders: MissileArena,
}

impl Fleet {
    pub fn new(attacker_capacity: usize, defender_capacity: usize) -> Self {
        Self {
            attackers: MissileArena::new(Side::Attacker, attacker_capacity),
            defenders: MissileArena::new(Side::Defender, defender_capacity),
        }
    }

    pub fn arena(&self, side: Side) -> &MissileArena {
        match side {
            Side::Attacker => &self.attackers,
            Side::Defender => &self.defenders,
        }
    }

    pub fn mark_deleted(&self, id: EntityId) -> bool {
        self.arena(id.side).mark_deleted(id)
    }

    pub fn is_active(&self, id: EntityId) -> bool {
        self.arena(id.side).is_active(id)
    }

    /// Some live interceptor was launched at `target`.
    pub fn is_engaged(&self, target: EntityId) -> bool {
        self.defenders
            .live_ids()
            .into_iter()
            .any(|d| self.defenders.with(d, |m| m.assigned_target == Some(target)) == Some(true))
    }

    pub fn live_count(&self) -> usize {
        self.attackers.live_ids().len() + self.defenders.live_ids().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate_truncates_to_cells() {
        let mut m = MissileState::new(Side::Attacker, Vec2::new(10.0, 10.0), 100.0, 90.0);
        m.integrate(0.02);
        // Two cells straight down.
        assert_eq!(m.cell, CellPos::new(10, 12));
        assert!((m.partial.x - 10.0).abs() < 1e-3);

        let mut slow = MissileState::new(Side::Attacker, Vec2::new(10.0, 10.0), 10.0, 0.0);
        slow.integrate(0.02);
        assert_eq!(slow.cell, CellPos::new(10, 10));
        slow.integrate(0.1);
        assert_eq!(slow.cell, CellPos::new(11, 10));
    }

    #[test]
    fn test_interceptor_heading_climbs() {
        let m = MissileState::new(Side::Defender, Vec2::new(50.0, 300.0), 150.0, 270.0);
        let v = m.velocity();
        assert!(v.x.abs() < 1e-3);
        assert!((v.y + 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_generation_retires_stale_ids() {
        let arena = MissileArena::new(Side::Attacker, 2);
        let state = MissileState::new(Side::Attacker, Vec2::new(20.0, 20.0), 0.0, 90.0);
        let first = arena.spawn(1, state.clone());
        assert!(arena.is_live(first));

        arena.vacate(first);
        assert!(!arena.is_live(first));
        assert!(!arena.mark_deleted(first));

        let second = arena.spawn(1, state);
        assert_eq!(second.index, first.index);
        assert_ne!(second.generation, first.generation);
        assert!(!arena.is_live(first));
        assert!(arena.is_live(second));
        assert_eq!(arena.live_ids(), vec![second]);
    }

    #[test]
    fn test_advance_stops_once_deleted() {
        let arena = MissileArena::new(Side::Attacker, 1);
        let id = arena.spawn(0, MissileState::new(Side::Attacker, Vec2::new(20.0, 20.0), 50.0, 90.0));
        assert!(arena.advance(id, 0.02).is_some());
        assert!(arena.mark_deleted(id));
        assert_eq!(arena.advance(id, 0.02), None);
        assert!(!arena.is_active(id));
        assert!(arena.is_live(id));
    }

    #[test]
    #[should_panic(expected = "reused before its task finished")]
    fn test_spawn_into_occupied_slot_panics() {
        let arena = MissileArena::new(Side::Defender, 1);
        let state = MissileState::new(Side::Defender, Vec2::ZERO, 0.0, 270.0);
        arena.spawn(0, state.clone());
        arena.spawn(0, state);
    }

    #[test]
    fn test_engaged_follows_live_interceptors() {
        let fleet = Fleet::new(1, 1);
        let target = fleet
            .attackers
            .spawn(0, MissileState::new(Side::Attacker, Vec2::new(30.0, 30.0), 0.0, 90.0));
        let interceptor = fleet
            .defenders
            .spawn(0, MissileState::new(Side::Defender, Vec2::new(30.0, 300.0), 0.0, 270.0));
        assert!(!fleet.is_engaged(target));

        fleet
            .defenders
            .with_mut(interceptor, |m| m.assigned_target = Some(target));
        assert!(fleet.is_engaged(target));

        fleet.defenders.vacate(interceptor);
        assert!(!fleet.is_engaged(target));
    }
}
