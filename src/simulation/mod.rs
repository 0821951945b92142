//! Simulation orchestration: state, tick pipeline, reporting, hot reload

pub mod reload;
pub mod report;
pub mod tick;
pub mod watcher;
pub mod world;

pub use reload::{apply_reload, ReloadRequest};
pub use report::{
    occupancy_strip, DashboardSnapshot, JourneySnapshot, NullReporter, Reporter, TracingReporter,
};
pub use tick::{run_simulation_tick, SimulationEvent};
pub use watcher::spawn_watcher;
pub use world::{RunMode, Simulation, SourceFiles, StopHandle};
