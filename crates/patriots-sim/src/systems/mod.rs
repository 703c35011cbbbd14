//! Task bodies and scans that run against the shared `SimContext`.
//!
//! Everything here is a free function or a small driver struct. State lives
//! in the context: the grid, the arenas and the slot pools.

pub mod launchers;
pub mod lifecycle;
pub mod snapshot;
pub mod tracking;
