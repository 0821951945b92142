//! Railsim - Deterministic Railway Network Simulation
//!
//! Trains run a physics-driven state machine over a shared rail graph. A
//! traffic controller arbitrates rail access, a risk assessor keeps
//! followers clear of their leaders, seeded disruptive events perturb the
//! network, and every lifecycle mutation is logged so a run can be
//! replayed exactly.

pub mod command;
pub mod core;
pub mod events;
pub mod network;
pub mod safety;
pub mod scenario;
pub mod simulation;
pub mod train;
