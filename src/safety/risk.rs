//! Collision risk assessment
//!
//! Every tick, before any state transition runs, each train gets a fresh
//! `RiskData` describing its leader on the same rail. All trains then reason
//! about the same snapshot.

use crate::core::config::SimulationConfig;
use crate::core::types::TrainId;
use crate::network::graph::Network;
use crate::train::entity::Train;
use crate::train::physics::train_braking_distance;

/// Gap value meaning "no leader"
pub const NO_LEADER: f64 = -1.0;

/// Which safety zone a train is in relative to its leader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskZone {
    /// No leader, or gap beyond the safe distance
    Free,
    /// Braking distance < gap <= safe distance
    Following,
    /// Gap <= braking distance
    Emergency,
}

/// Per-tick risk snapshot of one train
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskData {
    /// Distance to the leader (m), `NO_LEADER` when there is none
    pub gap_m: f64,
    /// Own speed minus leader speed (m/s), positive when approaching
    pub closing_speed_ms: f64,
    pub braking_distance_m: f64,
    pub safe_distance_m: f64,
    pub speed_limit_ms: f64,
    /// Limit of the next rail on the route, 0 at the end of the route
    pub next_speed_limit_ms: f64,
    pub leader: Option<TrainId>,
    /// Leader speed is below the standstill threshold
    pub leader_stopped: bool,
}

impl Default for RiskData {
    fn default() -> Self {
        Self::clear()
    }
}

impl RiskData {
    /// Sentinel for trains with nothing known about them
    pub const fn clear() -> Self {
        Self {
            gap_m: NO_LEADER,
            closing_speed_ms: 0.0,
            braking_distance_m: 0.0,
            safe_distance_m: 0.0,
            speed_limit_ms: 0.0,
            next_speed_limit_ms: 0.0,
            leader: None,
            leader_stopped: false,
        }
    }

    pub fn has_leader(&self) -> bool {
        self.leader.is_some() && self.gap_m >= 0.0
    }

    pub fn zone(&self) -> RiskZone {
        if !self.has_leader() || self.gap_m > self.safe_distance_m {
            RiskZone::Free
        } else if self.gap_m <= self.braking_distance_m {
            RiskZone::Emergency
        } else {
            RiskZone::Following
        }
    }

    /// Seconds until contact at the current closing speed
    pub fn time_to_collision(&self) -> f64 {
        if !self.has_leader() || self.closing_speed_ms <= 0.0 {
            f64::INFINITY
        } else {
            self.gap_m / self.closing_speed_ms
        }
    }
}

/// Compute the risk snapshot of one train
///
/// Leaders are other unfinished trains holding the same rail, travelling
/// the same direction and strictly ahead. The closest one wins; equal gaps
/// go to the lower id because occupants are kept sorted.
pub fn assess(
    train: &Train,
    trains: &[Train],
    network: &Network,
    config: &SimulationConfig,
) -> RiskData {
    let Some(segment) = train.current_segment() else {
        return RiskData::clear();
    };
    let Some(rail) = network.try_rail(segment.rail) else {
        return RiskData::clear();
    };

    let mut risk = RiskData {
        braking_distance_m: train_braking_distance(train),
        safe_distance_m: config.safe_distance(train.velocity_ms),
        speed_limit_ms: rail.speed_limit_ms(),
        next_speed_limit_ms: train
            .next_segment()
            .and_then(|s| network.try_rail(s.rail))
            .map(|r| r.speed_limit_ms())
            .unwrap_or(0.0),
        ..RiskData::clear()
    };

    let leader = rail
        .occupants
        .iter()
        .filter(|&&id| id != train.id)
        .filter_map(|&id| find_train(trains, id))
        .filter(|other| !other.finished && other.current_segment() == Some(segment))
        .map(|other| (other, other.position_m - train.position_m))
        .filter(|(_, gap)| *gap > 0.0)
        .fold(None::<(&Train, f64)>, |best, (other, gap)| match best {
            Some((_, best_gap)) if best_gap <= gap => best,
            _ => Some((other, gap)),
        });

    if let Some((leader, gap)) = leader {
        risk.gap_m = gap;
        risk.closing_speed_ms = train.velocity_ms - leader.velocity_ms;
        risk.leader = Some(leader.id);
        risk.leader_stopped = leader.velocity_ms < config.standstill_epsilon_ms;
    }

    risk
}

/// Look a train up by id; ids are dense indices in insertion order
pub fn find_train(trains: &[Train], id: TrainId) -> Option<&Train> {
    trains
        .get(id.0 as usize)
        .filter(|t| t.id == id)
        .or_else(|| trains.iter().find(|t| t.id == id))
}

/// Risk snapshots for the whole fleet
#[derive(Debug, Clone, Default)]
pub struct RiskAssessor {
    snapshot: Vec<(TrainId, RiskData)>,
}

impl RiskAssessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every unfinished train's snapshot from scratch
    pub fn refresh(&mut self, trains: &[Train], network: &Network, config: &SimulationConfig) {
        self.snapshot.clear();
        for train in trains.iter().filter(|t| !t.finished) {
            self.snapshot
                .push((train.id, assess(train, trains, network, config)));
        }
    }

    /// Snapshot of a train, the clear sentinel on a miss
    pub fn get(&self, id: TrainId) -> RiskData {
        self.snapshot
            .binary_search_by_key(&id, |(tid, _)| *tid)
            .map(|i| self.snapshot[i].1)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }
}
