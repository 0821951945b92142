//! Replay: feed recorded commands back tick by tick

use tracing::warn;

use crate::command::log::Command;
use crate::core::error::{Result, SimError};
use crate::core::types::SimTime;
use crate::train::entity::Train;
use crate::train::state::TrainState;

/// Read position in a recorded command stream
#[derive(Debug, Clone, Default)]
pub struct ReplayCursor {
    commands: Vec<Command>,
    next: usize,
}

impl ReplayCursor {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands, next: 0 }
    }

    /// Commands not yet handed out with a timestamp before `end`
    ///
    /// Windows are half-open: a command stamped exactly `end` belongs to
    /// the next tick.
    pub fn take_until(&mut self, end: SimTime) -> &[Command] {
        let start = self.next;
        while self.next < self.commands.len() && self.commands[self.next].time() < end {
            self.next += 1;
        }
        &self.commands[start..self.next]
    }

    pub fn remaining(&self) -> usize {
        self.commands.len() - self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.commands.len()
    }

    /// Timestamp of the last recorded command
    pub fn last_time(&self) -> Option<SimTime> {
        self.commands.last().map(Command::time)
    }
}

/// What applying a train command did
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Departed,
    StateChanged { from: TrainState, to: TrainState },
    Advanced { rail_index: usize },
    Finished,
}

/// Re-apply one train-targeted command without re-running business logic
pub fn apply_to_train(
    command: &Command,
    train: &mut Train,
    round_trip: bool,
) -> Result<Applied> {
    match command {
        Command::Departure { .. } => {
            train.set_state(TrainState::Accelerating);
            Ok(Applied::Departed)
        }
        Command::StateChange { from, to, .. } => {
            if train.state.name() != from {
                warn!(
                    train = %train.name,
                    expected = %from,
                    actual = train.state.name(),
                    "replayed state change starts from a different state"
                );
            }
            let next = TrainState::from_name(to, 0.0)?;
            let prev = train.set_state(next);
            Ok(Applied::StateChanged { from: prev, to: next })
        }
        Command::AdvanceRail { t, rail_index, .. } => {
            if *rail_index >= train.route.len() {
                train.finish();
                if round_trip {
                    train.schedule_return(*t);
                }
                Ok(Applied::Finished)
            } else {
                train.enter_rail_index(*rail_index);
                Ok(Applied::Advanced {
                    rail_index: *rail_index,
                })
            }
        }
        other => Err(SimError::Replay(format!(
            "{} does not target a train",
            other.type_name()
        ))),
    }
}
