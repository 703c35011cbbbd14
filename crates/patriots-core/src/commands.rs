//! Operator commands sent from an input source to the simulation.

use serde::{Deserialize, Serialize};

/// All possible operator actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperatorCommand {
    /// Ask for one more attacker. Dropped if the attacker side is saturated.
    LaunchAttack,
    /// Stop every task and end the run.
    Quit,
}

impl OperatorCommand {
    /// Map one line of keyboard-style input to a command.
    ///
    /// An empty line, `a` or a space launches; `q`/`esc` quits.
    pub fn parse_key(line: &str) -> Option<Self> {
        match line.trim_end_matches(['\r', '\n']) {
            "" | " " | "a" | "space" => Some(OperatorCommand::LaunchAttack),
            "q" | "esc" | "quit" => Some(OperatorCommand::Quit),
            _ => None,
        }
    }
}
