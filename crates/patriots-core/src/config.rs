//! Run configuration.
//!
//! `SimConfig::default()` reproduces the stock constants. A JSON document may
//! override any subset of fields; missing fields fall back to the defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

/// Top-level configuration for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// RNG seed for attacker spawn parameters.
    pub seed: u64,
    pub grid: GridConfig,
    pub attacker: AttackerProfile,
    pub defender: DefenderProfile,
    pub predictor: PredictorConfig,
    /// Period of the render/diagnostic task (ms).
    pub display_period_ms: u64,
    /// Priority of the render/diagnostic task.
    pub display_priority: u8,
}

/// Geometry of the shared grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: i32,
    pub height: i32,
    pub wall_thickness: i32,
    /// Cells with `y > goal_start_y` belong to the goal band.
    pub goal_start_y: i32,
    /// Half-width of the collision scan square.
    pub missile_radius: i32,
}

/// Attacker spawn strategy and task timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackerProfile {
    pub capacity: usize,
    pub missile_period_ms: u64,
    pub missile_priority: u8,
    pub launcher_period_ms: u64,
    pub launcher_priority: u8,
    /// Pause after each launch (ms).
    pub cooldown_ms: u64,
    /// Speed is drawn from `[1, max_speed)`.
    pub max_speed: f32,
    /// Heading is drawn from `[max_angle, 180 - max_angle)` degrees.
    pub max_angle: f32,
}

/// Interceptor trajectory strategy and task timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefenderProfile {
    pub capacity: usize,
    pub missile_period_ms: u64,
    pub missile_priority: u8,
    pub launcher_period_ms: u64,
    pub launcher_priority: u8,
    /// Interceptor speed (cells/s).
    pub speed: f32,
    /// Interceptor heading (degrees).
    pub angle: f32,
    /// Row interceptors are launched from. Unset derives it from the grid
    /// (see `GridConfig::default_launch_row`).
    pub launch_y: Option<i32>,
}

/// Sampling and search limits of the interception predictor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub min_samples: usize,
    pub max_samples: usize,
    pub speed_tolerance: f32,
    pub search_tolerance: f32,
    pub max_iterations: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            grid: GridConfig::default(),
            attacker: AttackerProfile::default(),
            defender: DefenderProfile::default(),
            predictor: PredictorConfig::default(),
            display_period_ms: DISPLAY_PERIOD_MS,
            display_priority: DISPLAY_PRIORITY,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: GRID_WIDTH,
            height: GRID_HEIGHT,
            wall_thickness: WALL_THICKNESS,
            goal_start_y: (GRID_HEIGHT as f32 * GOAL_START_FRACTION) as i32,
            missile_radius: MISSILE_RADIUS,
        }
    }
}

impl Default for AttackerProfile {
    fn default() -> Self {
        Self {
            capacity: SLOT_CAPACITY,
            missile_period_ms: ATK_MISSILE_PERIOD_MS,
            missile_priority: ATK_MISSILE_PRIORITY,
            launcher_period_ms: ATK_LAUNCHER_PERIOD_MS,
            launcher_priority: ATK_LAUNCHER_PRIORITY,
            cooldown_ms: ATK_COOLDOWN_MS,
            max_speed: ATK_MAX_SPEED,
            max_angle: ATK_MAX_ANGLE,
        }
    }
}

impl Default for DefenderProfile {
    fn default() -> Self {
        Self {
            capacity: SLOT_CAPACITY,
            missile_period_ms: DEF_MISSILE_PERIOD_MS,
            missile_priority: DEF_MISSILE_PRIORITY,
            launcher_period_ms: DEF_LAUNCHER_PERIOD_MS,
            launcher_priority: DEF_LAUNCHER_PRIORITY,
            speed: DEF_SPEED,
            angle: DEF_ANGLE,
            launch_y: None,
        }
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            min_samples: PREDICTOR_MIN_SAMPLES,
            max_samples: PREDICTOR_MAX_SAMPLES,
            speed_tolerance: PREDICTOR_SPEED_TOLERANCE,
            search_tolerance: PREDICTOR_SEARCH_TOLERANCE,
            max_iterations: PREDICTOR_MAX_ITERATIONS,
        }
    }
}

impl GridConfig {
    /// First row clear of the goal band by more than one collision radius.
    pub fn default_launch_row(&self) -> i32 {
        self.goal_start_y - 2 * self.missile_radius - 1
    }

    /// Smallest x a missile can occupy without touching the wall band.
    pub fn min_interior_x(&self) -> i32 {
        self.wall_thickness + self.missile_radius + 1
    }

    /// Largest x a missile can occupy without touching the wall band.
    pub fn max_interior_x(&self) -> i32 {
        self.width - self.wall_thickness - self.missile_radius - 2
    }
}

impl AttackerProfile {
    pub fn missile_period(&self) -> Duration {
        Duration::from_millis(self.missile_period_ms)
    }

    pub fn launcher_period(&self) -> Duration {
        Duration::from_millis(self.launcher_period_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl DefenderProfile {
    pub fn missile_period(&self) -> Duration {
        Duration::from_millis(self.missile_period_ms)
    }

    pub fn launcher_period(&self) -> Duration {
        Duration::from_millis(self.launcher_period_ms)
    }
}

impl SimConfig {
    /// Parse a JSON document; absent fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Row interceptors are launched from, after grid overrides.
    pub fn launch_row(&self) -> i32 {
        self.defender
            .launch_y
            .unwrap_or_else(|| self.grid.default_launch_row())
    }

    pub fn display_period(&self) -> Duration {
        Duration::from_millis(self.display_period_ms)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.grid;
        if g.wall_thickness < 1 {
            return Err(ConfigError::invalid("grid.wall_thickness", "must be at least 1"));
        }
        if g.missile_radius < 1 {
            return Err(ConfigError::invalid("grid.missile_radius", "must be at least 1"));
        }
        let margin = 2 * (g.wall_thickness + g.missile_radius + 1);
        if g.width <= margin || g.height <= margin {
            return Err(ConfigError::invalid(
                "grid",
                format!("{}x{} leaves no interior for radius {}", g.width, g.height, g.missile_radius),
            ));
        }
        if g.goal_start_y <= g.wall_thickness || g.goal_start_y >= g.height {
            return Err(ConfigError::invalid(
                "grid.goal_start_y",
                format!("{} is outside the grid", g.goal_start_y),
            ));
        }

        if self.attacker.capacity == 0 {
            return Err(ConfigError::invalid("attacker.capacity", "must be non-zero"));
        }
        if self.attacker.max_speed < 1.0 {
            return Err(ConfigError::invalid("attacker.max_speed", "must be at least 1"));
        }
        if !(0.0..90.0).contains(&self.attacker.max_angle) {
            return Err(ConfigError::invalid("attacker.max_angle", "must be in [0, 90)"));
        }

        if self.defender.capacity == 0 {
            return Err(ConfigError::invalid("defender.capacity", "must be non-zero"));
        }
        if self.defender.speed <= 0.0 {
            return Err(ConfigError::invalid("defender.speed", "must be positive"));
        }
        let launch_y = self.launch_row();
        if launch_y <= g.wall_thickness + g.missile_radius || launch_y + g.missile_radius >= g.goal_start_y {
            return Err(ConfigError::invalid(
                "defender.launch_y",
                format!("{launch_y} must sit between the top wall and the goal band"),
            ));
        }

        for (field, ms) in [
            ("attacker.missile_period_ms", self.attacker.missile_period_ms),
            ("attacker.launcher_period_ms", self.attacker.launcher_period_ms),
            ("defender.missile_period_ms", self.defender.missile_period_ms),
            ("defender.launcher_period_ms", self.defender.launcher_period_ms),
            ("display_period_ms", self.display_period_ms),
        ] {
            if ms == 0 {
                return Err(ConfigError::invalid(field, "period must be non-zero"));
            }
        }

        let p = &self.predictor;
        if p.min_samples < 2 {
            return Err(ConfigError::invalid("predictor.min_samples", "need at least 2"));
        }
        if p.max_samples < p.min_samples {
            return Err(ConfigError::invalid(
                "predictor.max_samples",
                "must not be below min_samples",
            ));
        }
        if p.search_tolerance <= 0.0 || p.speed_tolerance <= 0.0 {
            return Err(ConfigError::invalid("predictor", "tolerances must be positive"));
        }

        Ok(())
    }
}
