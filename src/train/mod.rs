//! Trains: entity, physics and behavioral state machine

pub mod entity;
pub mod physics;
pub mod state;

pub use entity::{Train, TrainSpec};
pub use state::{StateContext, TrainState, Transition, UpdateContext};
