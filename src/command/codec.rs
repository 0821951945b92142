//! Replay file codec
//!
//! A replay file is one JSON document laid out one command per line:
//!
//! ```text
//! {"version":2,"network_file":"net.toml","train_file":"trains.toml","seed":42,"round_trip":false,"config":{"tick_seconds":1.0,...},"commands":[
//! {"type":"DEPARTURE","t":0.0,"train":"IC1"},
//! {"type":"STATE_CHANGE","t":1.0,"train":"IC1","from":"Accelerating","to":"Cruising"}
//! ]}
//! ```
//!
//! The header carries the effective configuration of the recorded run, so a
//! replay integrates physics with the same tick and thresholds.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::log::Command;
use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};

pub const REPLAY_VERSION: u32 = 2;

/// Everything needed to re-run a recorded simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFile {
    pub version: u32,
    pub network_file: String,
    pub train_file: String,
    pub seed: u64,
    #[serde(default)]
    pub round_trip: bool,
    /// Configuration the run was recorded with
    pub config: SimulationConfig,
    pub commands: Vec<Command>,
}

#[derive(Serialize)]
struct Header<'a> {
    version: u32,
    network_file: &'a str,
    train_file: &'a str,
    seed: u64,
    round_trip: bool,
    config: &'a SimulationConfig,
}

impl ReplayFile {
    /// Seed and round-trip flag are taken from `config`
    pub fn new(
        network_file: impl Into<String>,
        train_file: impl Into<String>,
        config: SimulationConfig,
        commands: Vec<Command>,
    ) -> Self {
        Self {
            version: REPLAY_VERSION,
            network_file: network_file.into(),
            train_file: train_file.into(),
            seed: config.seed,
            round_trip: config.round_trip,
            config,
            commands,
        }
    }

    /// The configuration to replay with
    ///
    /// The header's seed and round-trip flag win over the embedded copy.
    pub fn effective_config(&self) -> SimulationConfig {
        SimulationConfig {
            seed: self.seed,
            round_trip: self.round_trip,
            ..self.config.clone()
        }
    }

    /// Serialize with one command per line
    pub fn encode(&self) -> Result<String> {
        let header = serde_json::to_string(&Header {
            version: self.version,
            network_file: &self.network_file,
            train_file: &self.train_file,
            seed: self.seed,
            round_trip: self.round_trip,
            config: &self.config,
        })?;
        // Reopen the header object to append the command array
        let mut out = String::with_capacity(header.len() + self.commands.len() * 96);
        out.push_str(header.strip_suffix('}').unwrap_or(&header));
        out.push_str(",\"commands\":[\n");
        for (i, command) in self.commands.iter().enumerate() {
            out.push_str(&command_to_line(command)?);
            if i + 1 < self.commands.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str("]}\n");
        Ok(out)
    }

    /// Parse and validate a replay document
    pub fn decode(text: &str) -> Result<Self> {
        let file: Self = serde_json::from_str(text)?;
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != REPLAY_VERSION {
            return Err(SimError::Replay(format!(
                "unsupported replay version {} (expected {})",
                self.version, REPLAY_VERSION
            )));
        }
        self.config
            .validate()
            .map_err(|e| SimError::Replay(format!("recorded configuration: {}", e)))?;
        if let Some(i) = self
            .commands
            .windows(2)
            .position(|w| w[1].time() < w[0].time())
        {
            return Err(SimError::Replay(format!(
                "command {} at t={} precedes its predecessor at t={}",
                i + 1,
                self.commands[i + 1].time(),
                self.commands[i].time()
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.encode()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SimError::Replay(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::decode(&text)
    }
}

pub fn command_to_line(command: &Command) -> Result<String> {
    Ok(serde_json::to_string(command)?)
}

pub fn command_from_line(line: &str) -> Result<Command> {
    Ok(serde_json::from_str(line.trim().trim_end_matches(','))?)
}
