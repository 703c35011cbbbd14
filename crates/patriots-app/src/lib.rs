//! PATRIOTS headless runner.
//!
//! Wires the simulation engine to a line-oriented input source and a
//! periodic display task that logs snapshots instead of drawing them.

pub mod game_loop;
pub mod state;

pub use patriots_core as core;
