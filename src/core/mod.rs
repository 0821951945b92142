pub mod clock;
pub mod config;
pub mod error;
pub mod types;
pub mod units;

pub use clock::{format_clock, parse_clock};
pub use config::{EventConfig, SimulationConfig};
pub use error::{Result, SimError};
