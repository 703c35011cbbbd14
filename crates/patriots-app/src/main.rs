use std::io::{self, BufReader};
use std::sync::mpsc;

use anyhow::{Context, Result};

use patriots_app::game_loop;
use patriots_app::state::RunOptions;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let options = RunOptions::parse(std::env::args().skip(1), |key| std::env::var(key).ok())?;
    let config = options.load_config()?;
    tracing::info!(
        config = ?options.config_path,
        run_for = ?options.run_for,
        "starting"
    );

    let (cmd_tx, cmd_rx) = mpsc::channel();
    game_loop::spawn_input_reader(BufReader::new(io::stdin()), cmd_tx)
        .context("failed to spawn input thread")?;

    let summary = game_loop::run_game_loop(config, cmd_rx, options.run_for)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
