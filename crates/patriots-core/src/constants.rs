//! Simulation constants and tuning parameters.
//!
//! These are the defaults behind `SimConfig::default()`. Code that runs inside
//! the engine reads the config, not these constants, so tests can shrink the
//! grid and shorten periods.

/// Divides a period expressed in milliseconds into seconds of delta-time.
pub const DELTA_FACTOR: f32 = 1000.0;

// --- Grid ---

/// Grid width in cells.
pub const GRID_WIDTH: i32 = 640;

/// Grid height in cells.
pub const GRID_HEIGHT: i32 = 480;

/// Thickness of the wall band along the grid border.
pub const WALL_THICKNESS: i32 = 2;

/// Fraction of the grid height below which every cell belongs to the goal band.
pub const GOAL_START_FRACTION: f32 = 0.8;

/// Half-width of the square scanned around a missile for collisions.
pub const MISSILE_RADIUS: i32 = 5;

// --- Slots ---

/// Maximum number of concurrently live missiles per side.
pub const SLOT_CAPACITY: usize = 4;

// --- Attacker side ---

/// Attacker missile task period (ms).
pub const ATK_MISSILE_PERIOD_MS: u64 = 20;

/// Attacker missile task priority.
pub const ATK_MISSILE_PRIORITY: u8 = 4;

/// Attacker launcher task period (ms).
pub const ATK_LAUNCHER_PERIOD_MS: u64 = 40;

/// Attacker launcher task priority.
pub const ATK_LAUNCHER_PRIORITY: u8 = 4;

/// Pause taken by the attacker launcher after each launch (ms).
pub const ATK_COOLDOWN_MS: u64 = 500;

/// Upper bound of the random attacker speed (cells/s).
pub const ATK_MAX_SPEED: f32 = 100.0;

/// Attacker headings are drawn from `[ATK_MAX_ANGLE, 180 - ATK_MAX_ANGLE)` degrees.
pub const ATK_MAX_ANGLE: f32 = 30.0;

// --- Defender side ---

/// Defender missile task period (ms).
pub const DEF_MISSILE_PERIOD_MS: u64 = 20;

/// Defender missile task priority.
pub const DEF_MISSILE_PRIORITY: u8 = 4;

/// Defender launcher task period (ms).
pub const DEF_LAUNCHER_PERIOD_MS: u64 = 40;

/// Defender launcher task priority.
pub const DEF_LAUNCHER_PRIORITY: u8 = 3;

/// Interceptor speed (cells/s).
pub const DEF_SPEED: f32 = 150.0;

/// Interceptor heading in degrees. y grows toward the goal, so 270° climbs
/// straight away from it.
pub const DEF_ANGLE: f32 = 270.0;

// --- Interception predictor ---

/// Samples required before speed convergence is accepted.
pub const PREDICTOR_MIN_SAMPLES: usize = 3;

/// Hard ceiling on samples taken against one target.
pub const PREDICTOR_MAX_SAMPLES: usize = 20;

/// Two consecutive speed estimates agree when within this many cells/s.
pub const PREDICTOR_SPEED_TOLERANCE: f32 = 2.0;

/// Bisection stops once the distance gap is within this many cells.
pub const PREDICTOR_SEARCH_TOLERANCE: f32 = 0.5;

/// Bisection iteration ceiling.
pub const PREDICTOR_MAX_ITERATIONS: u32 = 32;

// --- Display ---

/// Render/diagnostic task period (ms).
pub const DISPLAY_PERIOD_MS: u64 = 10;

/// Render/diagnostic task priority.
pub const DISPLAY_PRIORITY: u8 = 5;
