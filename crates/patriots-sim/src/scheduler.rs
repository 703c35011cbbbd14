//! Periodic task scheduling.
//!
//! The engine only needs a way to start a body that runs at a fixed period
//! and a way for that body to sleep until its next activation. Those two
//! needs are the `PeriodicScheduler` trait and `PeriodicContext`.
//! `ThreadScheduler` backs each task with a named OS thread.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use patriots_core::constants::DELTA_FACTOR;
use patriots_core::enums::Activation;

/// Scheduling parameters for one periodic task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: String,
    pub period: Duration,
    /// Advisory; the thread scheduler records it but cannot enforce it.
    pub priority: u8,
    pub activation: Activation,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, period: Duration, priority: u8) -> Self {
        Self {
            name: name.into(),
            period,
            priority,
            activation: Activation::Now,
        }
    }

    pub fn deferred(mut self) -> Self {
        self.activation = Activation::Deferred;
        self
    }
}

/// Body of a periodic task. It owns its loop and calls
/// `PeriodicContext::wait_for_period` between activations.
pub type TaskBody = Box<dyn FnOnce(&PeriodicContext) + Send + 'static>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is stopped; refusing to start {0}")]
    Stopped(String),
    #[error("failed to start task {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that can run periodic task bodies.
pub trait PeriodicScheduler: Send + Sync {
    fn spawn_periodic(&self, spec: TaskSpec, body: TaskBody) -> Result<TaskHandle, SchedulerError>;

    /// Ask every task to wind down; `PeriodicContext::is_running` turns false.
    fn request_stop(&self);

    fn is_running(&self) -> bool;
}

/// Activation and overrun counters of one task.
#[derive(Debug, Default)]
pub struct TaskStats {
    activations: AtomicU64,
    overruns: AtomicU64,
}

impl TaskStats {
    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

/// Handle to a started task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub id: u64,
    pub name: String,
    stats: Arc<TaskStats>,
}

impl TaskHandle {
    /// For scheduler implementations: a handle reporting through `stats`.
    pub fn new(id: u64, name: impl Into<String>, stats: Arc<TaskStats>) -> Self {
        Self {
            id,
            name: name.into(),
            stats,
        }
    }

    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }
}

/// What a task body sees of its scheduler.
#[derive(Debug)]
pub struct PeriodicContext {
    name: String,
    period: Duration,
    next_release: Cell<Instant>,
    running: Arc<AtomicBool>,
    stats: Arc<TaskStats>,
}

impl PeriodicContext {
    fn new(name: String, period: Duration, running: Arc<AtomicBool>, stats: Arc<TaskStats>) -> Self {
        Self {
            name,
            period,
            next_release: Cell::new(Instant::now() + period),
            running,
            stats,
        }
    }

    /// A context not attached to any scheduler. Useful for driving task
    /// bodies by hand.
    pub fn detached(name: impl Into<String>, period: Duration) -> Self {
        Self::new(
            name.into(),
            period,
            Arc::new(AtomicBool::new(true)),
            Arc::new(TaskStats::default()),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// The period in seconds, as used for integration.
    pub fn delta_time(&self) -> f32 {
        self.period.as_millis() as f32 / DELTA_FACTOR
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }

    /// Sleep until the next activation.
    ///
    /// If the deadline already passed, counts an overrun and re-bases the
    /// schedule on the current instant instead of bursting to catch up.
    pub fn wait_for_period(&self) {
        let now = Instant::now();
        let deadline = self.next_release.get();
        if now > deadline {
            let late = now - deadline;
            let total = self.stats.overruns.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                task = %self.name,
                late_ms = late.as_secs_f64() * 1000.0,
                overruns = total,
                "deadline overrun"
            );
            self.next_release.set(now + self.period);
        } else {
            thread::sleep(deadline - now);
            self.next_release.set(deadline + self.period);
        }
        self.stats.activations.fetch_add(1, Ordering::Relaxed);
    }

    /// Clear the running flag. A scheduler shares this flag across all of
    /// its tasks.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// One OS thread per task.
#[derive(Debug)]
pub struct ThreadScheduler {
    running: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            handles: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Join every task, including ones started while joining.
    ///
    /// Must not be called from inside a task.
    pub fn join_all(&self) {
        loop {
            let batch: Vec<JoinHandle<()>> = {
                let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *handles)
            };
            if batch.is_empty() {
                break;
            }
            for handle in batch {
                let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
                if handle.join().is_err() {
                    warn!(task = %name, "task panicked");
                }
            }
        }
    }

    /// Threads started and not yet joined.
    pub fn pending(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PeriodicScheduler for ThreadScheduler {
    fn spawn_periodic(&self, spec: TaskSpec, body: TaskBody) -> Result<TaskHandle, SchedulerError> {
        if !self.is_running() {
            return Err(SchedulerError::Stopped(spec.name));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let stats = Arc::new(TaskStats::default());
        let ctx = PeriodicContext::new(
            spec.name.clone(),
            spec.period,
            Arc::clone(&self.running),
            Arc::clone(&stats),
        );
        let activation = spec.activation;

        let handle = thread::Builder::new()
            .name(spec.name.clone())
            .spawn(move || {
                if activation == Activation::Deferred {
                    ctx.wait_for_period();
                }
                body(&ctx);
            })
            .map_err(|source| SchedulerError::Spawn {
                name: spec.name.clone(),
                source,
            })?;

        debug!(task = %spec.name, id, period_ms = spec.period.as_millis() as u64, priority = spec.priority, "task started");
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);

        Ok(TaskHandle::new(id, spec.name, stats))
    }

    fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
