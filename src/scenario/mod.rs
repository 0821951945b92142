//! Network and train definition files

pub mod definitions;
pub mod loader;

pub use definitions::{NetworkFile, NodeDef, RailDef, TrainDef, TrainFile};
pub use loader::{
    build_network, build_trains, load_network, load_trains, parse_network, parse_trains,
    report_rejected, TrainBuildError,
};
