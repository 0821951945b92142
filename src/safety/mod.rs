//! Collision risk assessment and rail admission control

pub mod risk;
pub mod traffic;

pub use risk::{RiskAssessor, RiskData, RiskZone, NO_LEADER};
pub use traffic::{AccessDecision, TrafficController};
