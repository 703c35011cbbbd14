//! Run options and the messages exchanged with the game loop.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use patriots_core::commands::OperatorCommand;
use patriots_core::config::SimConfig;
use patriots_core::state::SimSnapshot;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "PATRIOTS_CONFIG";
/// Environment variable bounding the run length in seconds.
pub const RUN_SECS_ENV: &str = "PATRIOTS_RUN_SECS";

/// Messages sent to the game loop thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    /// An operator action read from input.
    Operator(OperatorCommand),
    /// The input source reached end of file.
    InputClosed,
}

/// How to run: where the config comes from and for how long.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    /// `None` runs until the operator quits or input closes.
    pub run_for: Option<Duration>,
}

impl RunOptions {
    /// Parse command-line arguments, falling back to the environment.
    ///
    /// `[CONFIG.json] [--seconds N]`
    pub fn parse(
        args: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut args = args.into_iter();
        let mut config_path: Option<PathBuf> = None;
        let mut run_for: Option<Duration> = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--seconds" | "-s" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--seconds requires a number"))?;
                    run_for = Some(parse_seconds(&value)?);
                }
                "-h" | "--help" => {
                    println!(
                        "Usage: patriots [CONFIG.json] [--seconds <n>]\n\
                         Input: `a`, space or an empty line launches an attacker; `q` quits.\n\
                         Env: {CONFIG_ENV}, {RUN_SECS_ENV}, RUST_LOG"
                    );
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    return Err(anyhow!("unknown argument: {other}. Use --help for usage."))
                }
                path => {
                    if config_path.is_some() {
                        return Err(anyhow!("more than one config path given: {path}"));
                    }
                    config_path = Some(PathBuf::from(path));
                }
            }
        }

        if config_path.is_none() {
            config_path = env(CONFIG_ENV).map(PathBuf::from);
        }
        if run_for.is_none() {
            if let Some(value) = env(RUN_SECS_ENV) {
                run_for = Some(
                    parse_seconds(&value).with_context(|| format!("invalid {RUN_SECS_ENV}"))?,
                );
            }
        }

        Ok(Self {
            config_path,
            run_for,
        })
    }

    /// Load the configured file, or the stock defaults if none was named.
    pub fn load_config(&self) -> Result<SimConfig> {
        match &self.config_path {
            Some(path) => SimConfig::load(path)
                .with_context(|| format!("failed to load config: {}", path.display())),
            None => Ok(SimConfig::default()),
        }
    }
}

fn parse_seconds(value: &str) -> Result<Duration> {
    let secs = value
        .parse::<f64>()
        .with_context(|| format!("invalid seconds value: {value}"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(anyhow!("run length must be positive, got {value}"));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// What a finished run reports.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub requests: u64,
    pub admitted: u64,
    pub elapsed_ms: u64,
    pub final_snapshot: SimSnapshot,
}
