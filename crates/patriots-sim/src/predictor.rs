//! Interception prediction.
//!
//! Two phases. Sampling reads the target once per scheduler period until
//! its speed settles. The search then fits a line through the two latest
//! samples and bisects for the abscissa where a vertically climbing
//! interceptor and the target arrive at the same moment.

use patriots_core::config::PredictorConfig;

/// A target position stamped with the time it was read (seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedSample {
    pub x: f32,
    pub y: f32,
    pub t: f32,
}

impl TimedSample {
    pub fn new(x: f32, y: f32, t: f32) -> Self {
        Self { x, y, t }
    }
}

/// Speed between two samples, or `None` if no time passed between them.
pub fn speed_between(a: &TimedSample, b: &TimedSample) -> Option<f32> {
    let dt = b.t - a.t;
    if dt <= 0.0 {
        return None;
    }
    Some((b.x - a.x).hypot(b.y - a.y) / dt)
}

/// Collect target samples until the speed settles.
///
/// `read` returns the target's current position, or `None` once it is gone.
/// `wait` blocks for one period and returns `false` if sampling should stop.
/// Stops when two consecutive speeds agree within the tolerance and at
/// least `min_samples` were taken, at `max_samples` reads, or when either
/// callback gives up.
pub fn sample_target(
    config: &PredictorConfig,
    mut read: impl FnMut() -> Option<TimedSample>,
    mut wait: impl FnMut() -> bool,
) -> Vec<TimedSample> {
    let mut samples: Vec<TimedSample> = Vec::with_capacity(config.max_samples);
    let mut last_speed: Option<f32> = None;

    for _ in 0..config.max_samples {
        let Some(sample) = read() else {
            break;
        };

        match samples.last() {
            None => samples.push(sample),
            Some(prev) => {
                // Same timestamp twice: nothing to learn from this read.
                if let Some(speed) = speed_between(prev, &sample) {
                    samples.push(sample);
                    let settled = last_speed
                        .map(|v| (speed - v).abs() <= config.speed_tolerance)
                        .unwrap_or(false);
                    if settled && samples.len() >= config.min_samples {
                        break;
                    }
                    last_speed = Some(speed);
                }
            }
        }

        if !wait() {
            break;
        }
    }
    samples
}

/// Line through two samples plus the target's speed along it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory {
    pub slope: f32,
    pub intercept: f32,
    pub speed: f32,
}

impl Trajectory {
    /// `None` for vertical lines and zero elapsed time.
    pub fn through(a: &TimedSample, b: &TimedSample) -> Option<Self> {
        let dx = b.x - a.x;
        if dx == 0.0 {
            return None;
        }
        let speed = speed_between(a, b)?;
        let slope = (b.y - a.y) / dx;
        Some(Self {
            slope,
            intercept: b.y - slope * b.x,
            speed,
        })
    }

    pub fn y_at(&self, x: f32) -> f32 {
        self.slope * x + self.intercept
    }

    /// Where the line crosses row `y`.
    pub fn x_at(&self, y: f32) -> f32 {
        (y - self.intercept) / self.slope
    }
}

/// Fixed parts of an interception.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterceptGeometry {
    /// Row interceptors launch from.
    pub launch_y: f32,
    pub interceptor_speed: f32,
    /// Usable launch abscissas.
    pub min_x: f32,
    pub max_x: f32,
}

/// Outcome of the search phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prediction {
    /// Bisection converged (or hit the iteration ceiling).
    Solved { x: f32, iterations: u32 },
    /// The target moves straight along a row or column.
    Direct { x: f32 },
    /// The target leaves the field before an interceptor could meet it.
    OutOfReach { x: f32 },
    /// Not enough usable data; aim at where the target was last seen.
    LastKnown { x: f32 },
}

impl Prediction {
    pub fn x(&self) -> f32 {
        match *self {
            Prediction::Solved { x, .. }
            | Prediction::Direct { x }
            | Prediction::OutOfReach { x }
            | Prediction::LastKnown { x } => x,
        }
    }
}

/// Pick the launch abscissa for an interceptor against the sampled target.
///
/// `fallback_x` is used when no samples were collected at all.
pub fn predict_intercept(
    samples: &[TimedSample],
    fallback_x: f32,
    geometry: &InterceptGeometry,
    config: &PredictorConfig,
) -> Prediction {
    let (a, b) = match samples {
        [] => return Prediction::LastKnown { x: fallback_x },
        [only] => return Prediction::LastKnown { x: only.x },
        [.., a, b] => (a, b),
    };

    if b.t - a.t <= 0.0 {
        return Prediction::LastKnown { x: b.x };
    }
    if b.x == a.x || b.y == a.y {
        return Prediction::Direct { x: b.x };
    }
    let Some(line) = Trajectory::through(a, b) else {
        return Prediction::LastKnown { x: b.x };
    };

    // A target climbing away from the launch row never comes down to meet us.
    let descending = (geometry.launch_y - b.y).signum() == (b.y - a.y).signum();
    if !descending || line.speed <= 0.0 {
        return Prediction::LastKnown { x: b.x };
    }

    let ratio = line.speed / geometry.interceptor_speed;
    // Negative while the interceptor would arrive late, positive once the
    // target would arrive late.
    let gap = |x: f32| {
        let y = line.y_at(x);
        let target_path = (x - b.x).hypot(y - b.y);
        let climb = (geometry.launch_y - y).abs();
        target_path - climb * ratio
    };

    let heading_right = b.x > a.x;
    let edge = if heading_right { geometry.max_x } else { geometry.min_x };
    let landing = line.x_at(geometry.launch_y);
    let far = if heading_right { edge.min(landing) } else { edge.max(landing) };

    if gap(far) < 0.0 {
        return Prediction::OutOfReach { x: far };
    }

    let (mut lo, mut hi) = (b.x, far);
    let mut mid = hi;
    for iteration in 1..=config.max_iterations {
        mid = 0.5 * (lo + hi);
        let g = gap(mid);
        if g.abs() <= config.search_tolerance {
            return Prediction::Solved { x: mid, iterations: iteration };
        }
        if g < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Prediction::Solved {
        x: mid,
        iterations: config.max_iterations,
    }
}
