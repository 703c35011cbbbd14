//! Game loop — runs one engagement and feeds it operator input.
//!
//! Input lines arrive over an `mpsc` channel from a reader thread. A display
//! task on the same scheduler takes a high-tier snapshot every display
//! period and keeps the latest one for polling.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info};

use patriots_core::commands::OperatorCommand;
use patriots_core::config::SimConfig;
use patriots_core::enums::Side;
use patriots_core::state::SimSnapshot;
use patriots_sim::scheduler::{
    PeriodicContext, PeriodicScheduler, SchedulerError, TaskHandle, TaskSpec, ThreadScheduler,
};
use patriots_sim::Simulation;

use crate::state::{LoopCommand, RunSummary};

/// How long the loop waits for input before re-checking the deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Display activations between two periodic status lines.
const STATUS_EVERY: u64 = 100;

/// Spawns a thread that turns input lines into loop commands.
pub fn spawn_input_reader<R>(input: R, tx: mpsc::Sender<LoopCommand>) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("patriots-input".into())
        .spawn(move || read_commands(input, &tx))
}

fn read_commands(input: impl BufRead, tx: &mpsc::Sender<LoopCommand>) {
    for line in input.lines() {
        let Ok(line) = line else {
            break;
        };
        match OperatorCommand::parse_key(&line) {
            Some(command) => {
                if tx.send(LoopCommand::Operator(command)).is_err() {
                    return;
                }
            }
            None => debug!(input = %line, "ignored input"),
        }
    }
    let _ = tx.send(LoopCommand::InputClosed);
}

/// Start the periodic display task.
pub fn start_display(
    sim: &Simulation,
    scheduler: &dyn PeriodicScheduler,
    latest: Arc<Mutex<Option<SimSnapshot>>>,
) -> Result<TaskHandle, SchedulerError> {
    let ctx = Arc::clone(sim.context());
    let spec = TaskSpec::new(
        "display",
        ctx.config.display_period(),
        ctx.config.display_priority,
    );
    scheduler.spawn_periodic(
        spec,
        Box::new(move |pctx: &PeriodicContext| {
            let mut last_score = None;
            let mut activations = 0_u64;
            while pctx.is_running() {
                let snapshot = ctx.snapshot();
                if last_score != Some(snapshot.score) {
                    info!(
                        attacker_points = snapshot.score.attacker_points,
                        defender_points = snapshot.score.defender_points,
                        "score"
                    );
                    last_score = Some(snapshot.score);
                }
                if activations % STATUS_EVERY == 0 {
                    debug!(
                        attackers = snapshot.count(Side::Attacker),
                        interceptors = snapshot.count(Side::Defender),
                        attacker_slots_free = snapshot.attacker_slots_free,
                        defender_slots_free = snapshot.defender_slots_free,
                        "status"
                    );
                }
                if let Ok(mut lock) = latest.lock() {
                    *lock = Some(snapshot);
                }
                activations += 1;
                pctx.wait_for_period();
            }
        }),
    )
}

/// Run one engagement until quit, input end (untimed runs) or `run_for`.
pub fn run_game_loop(
    config: SimConfig,
    cmd_rx: mpsc::Receiver<LoopCommand>,
    run_for: Option<Duration>,
) -> Result<RunSummary> {
    let scheduler = Arc::new(ThreadScheduler::new());
    let mut sim = Simulation::new(config, Arc::clone(&scheduler) as Arc<dyn PeriodicScheduler>)?;
    sim.start()?;

    let latest = Arc::new(Mutex::new(None));
    start_display(&sim, scheduler.as_ref(), Arc::clone(&latest))?;

    let started = Instant::now();
    let deadline = run_for.map(|d| started + d);
    let mut requests = 0_u64;
    let mut admitted = 0_u64;

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            info!("run time elapsed");
            break;
        }

        match cmd_rx.recv_timeout(POLL_INTERVAL) {
            Ok(LoopCommand::Operator(OperatorCommand::LaunchAttack)) => {
                requests += 1;
                if sim.submit_attack_request() {
                    admitted += 1;
                }
            }
            Ok(LoopCommand::Operator(OperatorCommand::Quit)) => {
                info!("quit requested");
                break;
            }
            Ok(LoopCommand::InputClosed) | Err(RecvTimeoutError::Disconnected) => {
                if deadline.is_none() {
                    info!("input closed");
                    break;
                }
                // Timed run: keep going without input.
                thread::sleep(POLL_INTERVAL);
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    sim.stop();
    scheduler.join_all();

    Ok(RunSummary {
        requests,
        admitted,
        elapsed_ms: started.elapsed().as_millis() as u64,
        final_snapshot: sim.snapshot(),
    })
}
