//! Core types and definitions for the PATRIOTS engagement simulation.
//!
//! This crate defines the vocabulary shared by the simulation engine and the
//! headless runner: identities, enums, configuration, errors, snapshots and
//! operator commands. It has no threading or runtime dependency.

pub mod commands;
pub mod config;
pub mod constants;
pub mod enums;
pub mod error;
pub mod state;
pub mod types;
