//! Command log and deterministic record/replay
//!
//! Recording: every lifecycle mutation -> `Command` -> `CommandLog` -> `ReplayFile`
//! Replay: `ReplayFile` -> `ReplayCursor` -> per-tick window -> re-applied mutation

pub mod codec;
pub mod log;
pub mod replay;

pub use codec::{ReplayFile, REPLAY_VERSION};
pub use log::{Command, CommandLog};
pub use replay::{apply_to_train, Applied, ReplayCursor};
