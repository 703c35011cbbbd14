//! Concurrent engagement engine for PATRIOTS.
//!
//! Every missile and both launchers run as periodic tasks against one shared
//! grid. Slots bound how many missiles each side has in flight; a three-tier
//! arbiter orders access to the grid between rendering, movement and
//! target scans.

pub mod admission;
pub mod engine;
pub mod grid;
pub mod grid_lock;
pub mod missile;
pub mod predictor;
pub mod scheduler;
pub mod slot_pool;
pub mod systems;

pub use engine::{SimContext, Simulation};
pub use patriots_core as core;

#[cfg(test)]
mod tests;
