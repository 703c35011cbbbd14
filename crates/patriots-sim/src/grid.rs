//! The shared occupancy grid and its collision rules.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use patriots_core::config::GridConfig;
use patriots_core::enums::{Side, Tier};
use patriots_core::types::{CellPos, EntityId, Score};

use crate::grid_lock::PriorityGridLock;
use crate::missile::Fleet;

/// Contents of one grid position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cell {
    #[default]
    Empty,
    Wall,
    Goal,
    Attacker {
        occupant: EntityId,
        /// Interceptor that claimed this target, if any.
        tracked_by: Option<EntityId>,
    },
    Defender {
        occupant: EntityId,
    },
}

impl Cell {
    /// A fresh, unclaimed missile cell for `id`.
    pub fn missile(id: EntityId) -> Cell {
        match id.side {
            Side::Attacker => Cell::Attacker {
                occupant: id,
                tracked_by: None,
            },
            Side::Defender => Cell::Defender { occupant: id },
        }
    }

    pub fn occupant(&self) -> Option<EntityId> {
        match *self {
            Cell::Attacker { occupant, .. } | Cell::Defender { occupant } => Some(occupant),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

/// Why a move ended in a collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    /// The mover left the grid.
    OffGrid,
    Wall,
    /// An attacker reached the goal band.
    Goal,
    /// The mover destroyed a missile of the other side.
    Intercept(EntityId),
    /// The mover ran into a missile of its own side.
    Friendly(EntityId),
}

/// Receives "stop" requests for missiles destroyed by someone else's move.
pub trait DeletionSink {
    fn mark_deleted(&self, id: EntityId) -> bool;
}

impl DeletionSink for Fleet {
    fn mark_deleted(&self, id: EntityId) -> bool {
        Fleet::mark_deleted(self, id)
    }
}

/// Dense cell array plus the score counters.
#[derive(Debug, Clone)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    score: Score,
}

impl Grid {
    /// Build an empty field with the wall band and goal band painted in.
    pub fn new(config: &GridConfig) -> Self {
        let (width, height, wall) = (config.width, config.height, config.wall_thickness);
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let cell = if x < wall || y < wall || x >= width - wall || y >= height - wall {
                    Cell::Wall
                } else if y > config.goal_start_y {
                    Cell::Goal
                } else {
                    Cell::Empty
                };
                cells.push(cell);
            }
        }
        Self {
            width,
            height,
            cells,
            score: Score::default(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn in_bounds(&self, pos: CellPos) -> bool {
        (0..self.width).contains(&pos.x) && (0..self.height).contains(&pos.y)
    }

    fn offset(&self, pos: CellPos) -> usize {
        (pos.y * self.width + pos.x) as usize
    }

    pub fn cell(&self, pos: CellPos) -> Option<Cell> {
        self.in_bounds(pos).then(|| self.cells[self.offset(pos)])
    }

    /// Row-major iteration over every position.
    pub fn cells(&self) -> impl Iterator<Item = (CellPos, Cell)> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (CellPos::new(i as i32 % width, i as i32 / width), *cell))
    }

    /// Unconditional write.
    ///
    /// # Panics
    /// If `pos` is off the grid.
    pub fn place(&mut self, pos: CellPos, cell: Cell) {
        assert!(self.in_bounds(pos), "placing {cell:?} off the grid at {pos:?}");
        let offset = self.offset(pos);
        self.cells[offset] = cell;
    }

    /// Empty `pos` if `id` still occupies it, returning what was there.
    pub fn clear_if_owned(&mut self, pos: CellPos, id: EntityId) -> Option<Cell> {
        if !self.in_bounds(pos) {
            return None;
        }
        let offset = self.offset(pos);
        let cell = self.cells[offset];
        if cell.occupant() != Some(id) {
            return None;
        }
        self.cells[offset] = Cell::Empty;
        Some(cell)
    }

    /// Mark an attacker cell as claimed by `interceptor`.
    pub(crate) fn stamp_tracking(&mut self, pos: CellPos, interceptor: EntityId) {
        let offset = self.offset(pos);
        if let Cell::Attacker { tracked_by, .. } = &mut self.cells[offset] {
            *tracked_by = Some(interceptor);
        }
    }

    /// Check the square of half-width `radius` around `pos` for the first
    /// thing `mover` collides with, applying its side effects.
    ///
    /// Cells owned by `mover` itself are ignored. The scan is row-major and
    /// stops at the first hit.
    pub fn resolve_collisions_around(
        &mut self,
        mover: EntityId,
        pos: CellPos,
        radius: i32,
        sink: &impl DeletionSink,
    ) -> Option<Collision> {
        if !self.in_bounds(pos) {
            return Some(Collision::OffGrid);
        }

        let (x0, x1) = ((pos.x - radius).max(0), (pos.x + radius).min(self.width - 1));
        let (y0, y1) = ((pos.y - radius).max(0), (pos.y + radius).min(self.height - 1));

        for y in y0..=y1 {
            for x in x0..=x1 {
                let offset = self.offset(CellPos::new(x, y));
                let cell = self.cells[offset];
                match cell {
                    Cell::Empty => {}
                    Cell::Wall => return Some(Collision::Wall),
                    Cell::Goal => {
                        if mover.side == Side::Attacker {
                            self.score.attacker_points += 1;
                            return Some(Collision::Goal);
                        }
                    }
                    Cell::Attacker { occupant, .. } | Cell::Defender { occupant } => {
                        if occupant == mover {
                            continue;
                        }
                        sink.mark_deleted(occupant);
                        self.cells[offset] = Cell::Empty;
                        if occupant.side == mover.side.opponent() {
                            self.score.defender_points += 1;
                            return Some(Collision::Intercept(occupant));
                        }
                        return Some(Collision::Friendly(occupant));
                    }
                }
            }
        }
        None
    }

    /// Cells currently holding a missile.
    pub fn missile_cells(&self) -> impl Iterator<Item = (CellPos, Cell)> + '_ {
        self.cells().filter(|(_, cell)| cell.occupant().is_some())
    }
}

/// The grid behind its three-tier arbiter.
#[derive(Debug)]
pub struct SharedGrid {
    arbiter: PriorityGridLock,
    grid: Mutex<Grid>,
}

impl SharedGrid {
    pub fn new(grid: Grid) -> Self {
        Self {
            arbiter: PriorityGridLock::new(),
            grid: Mutex::new(grid),
        }
    }

    /// Block until the caller owns the grid at `tier`.
    pub(crate) fn acquire(&self, tier: Tier) -> GridGuard<'_> {
        self.arbiter.acquire(tier);
        let grid = self.grid.lock().unwrap_or_else(PoisonError::into_inner);
        GridGuard {
            grid,
            tier,
            arbiter: &self.arbiter,
        }
    }

    /// Read-only access at the render tier.
    pub fn view(&self) -> GridView<'_> {
        GridView(self.acquire(Tier::High))
    }

    pub fn arbiter(&self) -> &PriorityGridLock {
        &self.arbiter
    }
}

/// Exclusive access to the grid. Dropping it releases the tier.
pub(crate) struct GridGuard<'a> {
    grid: MutexGuard<'a, Grid>,
    tier: Tier,
    arbiter: &'a PriorityGridLock,
}

impl Deref for GridGuard<'_> {
    type Target = Grid;

    fn deref(&self) -> &Grid {
        &self.grid
    }
}

impl DerefMut for GridGuard<'_> {
    fn deref_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }
}

impl Drop for GridGuard<'_> {
    fn drop(&mut self) {
        self.arbiter.release(self.tier);
    }
}

/// Shared read access to the grid, held at `Tier::High`.
pub struct GridView<'a>(GridGuard<'a>);

impl Deref for GridView<'_> {
    type Target = Grid;

    fn deref(&self) -> &Grid {
        &self.0
    }
}
