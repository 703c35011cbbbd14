//! Enumeration types used throughout the simulation.

use serde::{Deserialize, Serialize};

/// Which side of the engagement a missile belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    /// The side this one collides with for scoring purposes.
    pub fn opponent(self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }
}

/// Access tier of the grid lock. Lower index = higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Render-class readers.
    High,
    /// Missile movement writers.
    Middle,
    /// Full-grid scans for targeting.
    Low,
}

impl Tier {
    pub const COUNT: usize = 3;

    pub const ALL: [Tier; Tier::COUNT] = [Tier::High, Tier::Middle, Tier::Low];

    pub fn index(self) -> usize {
        match self {
            Tier::High => 0,
            Tier::Middle => 1,
            Tier::Low => 2,
        }
    }

    pub fn from_index(index: usize) -> Tier {
        Tier::ALL[index % Tier::COUNT]
    }
}

/// Missile task lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissilePhase {
    /// Entity initialized, task not yet stepped.
    #[default]
    Spawned,
    /// Advancing once per period.
    Moving,
    /// Hit something during its own move; one clear pass remains.
    Collided,
    /// Another task (or shutdown) set the `deleted` flag.
    ExternallyDeleted,
    /// Slot returned, entity vacated. Terminal.
    Cleared,
}

/// When a periodic task performs its first activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Activate immediately on creation.
    #[default]
    Now,
    /// Activate after one full period has elapsed.
    Deferred,
}
