//! Commands: immutable records of lifecycle-significant mutations

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::types::SimTime;

/// One recorded mutation
///
/// Trains and states are referred to by name so a log stays meaningful
/// across runs that rebuild their arenas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    StateChange {
        t: SimTime,
        train: String,
        from: String,
        to: String,
    },
    Departure {
        t: SimTime,
        train: String,
    },
    /// Train moved onto `rail_index` of its route; the route length means
    /// the destination was reached
    AdvanceRail {
        t: SimTime,
        train: String,
        rail_index: usize,
    },
    Event {
        t: SimTime,
        event_type: String,
        desc: String,
    },
    Reload {
        t: SimTime,
        net_file: String,
        train_file: String,
    },
}

impl Command {
    pub fn time(&self) -> SimTime {
        match self {
            Self::StateChange { t, .. }
            | Self::Departure { t, .. }
            | Self::AdvanceRail { t, .. }
            | Self::Event { t, .. }
            | Self::Reload { t, .. } => *t,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::StateChange { .. } => "STATE_CHANGE",
            Self::Departure { .. } => "DEPARTURE",
            Self::AdvanceRail { .. } => "ADVANCE_RAIL",
            Self::Event { .. } => "EVENT",
            Self::Reload { .. } => "RELOAD",
        }
    }

    /// Name of the train the command targets, if any
    pub fn train(&self) -> Option<&str> {
        match self {
            Self::StateChange { train, .. }
            | Self::Departure { train, .. }
            | Self::AdvanceRail { train, .. } => Some(train),
            Self::Event { .. } | Self::Reload { .. } => None,
        }
    }
}

/// Append-only, time-ordered command log
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Vec<Command>,
    recording: bool,
}

impl CommandLog {
    pub fn new(recording: bool) -> Self {
        Self {
            commands: Vec::new(),
            recording,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    /// Append a command when recording
    ///
    /// A command older than the last one is dropped: replay relies on
    /// non-decreasing timestamps.
    pub fn record(&mut self, command: Command) {
        if !self.recording {
            return;
        }
        if let Some(last) = self.commands.last() {
            if command.time() < last.time() {
                warn!(
                    kind = command.type_name(),
                    t = command.time(),
                    last = last.time(),
                    "out-of-order command dropped"
                );
                return;
            }
        }
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Only the state changes, in log order
    pub fn state_changes(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::StateChange { .. }))
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}
