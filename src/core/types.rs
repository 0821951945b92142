//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Simulation time in seconds since midnight of the first simulated day
pub type SimTime = f64;

/// Tick counter (simulation time unit)
pub type Tick = u64;

/// Seconds in half a day, the round-trip turnaround period
pub const HALF_DAY_SECS: SimTime = 12.0 * 3600.0;

/// Handle of a node in the network arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle of a rail segment in the network arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RailId(pub u32);

impl RailId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unique train identifier, assigned monotonically in insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrainId(pub u32);

/// Unique event identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u32);

/// Direction of travel along an undirected rail
///
/// `Forward` runs from the rail's first endpoint to its second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

/// One directed step of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    pub rail: RailId,
    pub direction: Direction,
}

impl PathSegment {
    pub fn new(rail: RailId, direction: Direction) -> Self {
        Self { rail, direction }
    }

    /// The same rail traversed the other way
    pub fn reversed(self) -> Self {
        Self {
            rail: self.rail,
            direction: self.direction.flipped(),
        }
    }
}
