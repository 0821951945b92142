//! Train entity: physical parameters, journey, motion and route cursor

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::types::{NodeId, PathSegment, SimTime, TrainId, HALF_DAY_SECS};
use crate::network::graph::Network;
use crate::network::routing::{reverse_route, shortest_route};
use crate::train::state::TrainState;

/// Validated train definition as delivered by the definition loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSpec {
    pub name: String,
    pub mass_tons: f64,
    pub friction_coef: f64,
    pub max_accel_kn: f64,
    pub max_brake_kn: f64,
    pub departure: String,
    /// Seconds since midnight
    pub departure_time: SimTime,
    pub arrival: String,
    /// Mandatory dwell at intermediate stations (seconds)
    pub stop_duration_s: SimTime,
}

impl TrainSpec {
    /// Check the structural invariants a train needs to be simulated
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.mass_tons <= 0.0 {
            return Err(format!("mass_tons ({}) must be positive", self.mass_tons));
        }
        if self.friction_coef < 0.0 {
            return Err(format!(
                "friction_coef ({}) must not be negative",
                self.friction_coef
            ));
        }
        if self.max_accel_kn <= 0.0 || self.max_brake_kn <= 0.0 {
            return Err("acceleration and brake forces must be positive".into());
        }
        if self.stop_duration_s < 0.0 || self.departure_time < 0.0 {
            return Err("times must not be negative".into());
        }
        if self.departure == self.arrival {
            return Err("departure and arrival must differ".into());
        }
        Ok(())
    }
}

/// A simulated train
#[derive(Debug, Clone)]
pub struct Train {
    pub id: TrainId,
    pub name: String,

    // Physical parameters, fixed at creation
    pub mass_tons: f64,
    pub friction_coef: f64,
    pub max_accel_kn: f64,
    pub max_brake_kn: f64,

    // Journey
    pub origin: NodeId,
    pub destination: NodeId,
    pub departure_time: SimTime,
    pub stop_duration_s: SimTime,

    // Motion, relative to the current rail in the direction of travel
    pub velocity_ms: f64,
    pub position_m: f64,

    pub route: Vec<PathSegment>,
    /// Index into `route` of the rail the train is on or about to enter
    pub cursor: usize,
    /// True while the train occupies `route[cursor]`
    pub holds_rail: bool,
    pub departed: bool,
    pub finished: bool,
    /// Set by a signal failure; the train may not move before this time
    pub signal_hold_until: Option<SimTime>,
    pub trips_completed: u32,

    pub state: TrainState,
}

impl Train {
    /// Build a train from its definition, routing it through `network`
    pub fn new(id: TrainId, spec: &TrainSpec, network: &Network) -> Result<Self> {
        let origin = network
            .node_by_name(&spec.departure)
            .ok_or_else(|| SimError::UnknownNode(spec.departure.clone()))?;
        let destination = network
            .node_by_name(&spec.arrival)
            .ok_or_else(|| SimError::UnknownNode(spec.arrival.clone()))?;
        let route = shortest_route(network, origin, destination)?;
        if route.is_empty() {
            return Err(SimError::Unroutable {
                from: spec.departure.clone(),
                to: spec.arrival.clone(),
            });
        }

        Ok(Self {
            id,
            name: spec.name.clone(),
            mass_tons: spec.mass_tons,
            friction_coef: spec.friction_coef,
            max_accel_kn: spec.max_accel_kn,
            max_brake_kn: spec.max_brake_kn,
            origin,
            destination,
            departure_time: spec.departure_time,
            stop_duration_s: spec.stop_duration_s,
            velocity_ms: 0.0,
            position_m: 0.0,
            route,
            cursor: 0,
            holds_rail: false,
            departed: false,
            finished: false,
            signal_hold_until: None,
            trips_completed: 0,
            state: TrainState::Idle,
        })
    }

    /// Rail the train is on, or about to enter when standing at a node
    pub fn current_segment(&self) -> Option<PathSegment> {
        self.route.get(self.cursor).copied()
    }

    pub fn next_segment(&self) -> Option<PathSegment> {
        self.route.get(self.cursor + 1).copied()
    }

    pub fn current_rail_length_m(&self, network: &Network) -> f64 {
        self.current_segment()
            .and_then(|s| network.try_rail(s.rail))
            .map(|r| r.length_m())
            .unwrap_or(0.0)
    }

    /// Distance left to the end of the current rail (metres)
    pub fn remaining_on_rail_m(&self, network: &Network) -> f64 {
        (self.current_rail_length_m(network) - self.position_m).max(0.0)
    }

    /// Distance left to the destination (metres)
    pub fn remaining_route_m(&self, network: &Network) -> f64 {
        let ahead: f64 = self
            .route
            .iter()
            .skip(self.cursor + 1)
            .filter_map(|s| network.try_rail(s.rail))
            .map(|r| r.length_m())
            .sum();
        self.remaining_on_rail_m(network) + ahead
    }

    /// Node the train stands at when it is not on a rail
    pub fn current_node(&self, network: &Network) -> Option<NodeId> {
        if self.holds_rail {
            return None;
        }
        let segment = self.current_segment()?;
        network
            .try_rail(segment.rail)
            .map(|r| r.start_node(segment.direction))
    }

    /// Node at the far end of the current rail
    pub fn approaching_node(&self, network: &Network) -> Option<NodeId> {
        let segment = self.current_segment()?;
        network
            .try_rail(segment.rail)
            .map(|r| r.end_node(segment.direction))
    }

    /// Trains that are running their journey (not idle, not finished)
    pub fn is_active(&self) -> bool {
        !self.finished && self.state != TrainState::Idle
    }

    pub fn is_held(&self, now: SimTime) -> bool {
        self.signal_hold_until.is_some_and(|until| now < until)
    }

    pub fn hold_remaining(&self, now: SimTime) -> SimTime {
        self.signal_hold_until
            .map(|until| (until - now).max(0.0))
            .unwrap_or(0.0)
    }

    /// Hold the train at a full stop until `until` (never shortens a hold)
    pub fn hold_until(&mut self, until: SimTime) {
        let until = self.signal_hold_until.map_or(until, |u| u.max(until));
        self.signal_hold_until = Some(until);
    }

    /// A failed signal stands between the train and its next move
    ///
    /// At a node that is the node itself or the far end of the next rail; on
    /// a rail it is the node ahead.
    pub fn signal_blocked(&self, network: &Network) -> bool {
        let Some(segment) = self.current_segment() else {
            return false;
        };
        let Some(rail) = network.try_rail(segment.rail) else {
            return false;
        };
        let ahead = rail.end_node(segment.direction);
        let here = (!self.holds_rail).then(|| rail.start_node(segment.direction));
        here.into_iter()
            .chain([ahead])
            .any(|node| network.node(node).has_signal_failure())
    }

    /// Ordering key for rail-access priority: earlier departure, then lower id
    pub fn priority_key(&self) -> (OrderedFloat<f64>, TrainId) {
        (OrderedFloat(self.departure_time), self.id)
    }

    /// Returns true if this train has strictly higher priority than `other`
    pub fn outranks(&self, other: &Train) -> bool {
        self.priority_key() < other.priority_key()
    }

    /// Switch state, returning the previous one
    ///
    /// Entering Accelerating from a standstill at a node means the traffic
    /// controller granted the rail, so the train starts holding it.
    pub fn set_state(&mut self, state: TrainState) -> TrainState {
        if state == TrainState::Accelerating && !self.holds_rail && self.current_segment().is_some()
        {
            self.holds_rail = true;
            self.departed = true;
        }
        if state.pins_velocity() {
            self.velocity_ms = 0.0;
        }
        std::mem::replace(&mut self.state, state)
    }

    /// Move onto route index `index` at its start, releasing the old rail
    ///
    /// Returns false when `index` is past the end of the route.
    pub fn enter_rail_index(&mut self, index: usize) -> bool {
        self.cursor = index.min(self.route.len());
        self.position_m = 0.0;
        self.holds_rail = false;
        self.cursor < self.route.len()
    }

    /// Mark the journey complete
    pub fn finish(&mut self) {
        self.cursor = self.route.len();
        self.position_m = 0.0;
        self.velocity_ms = 0.0;
        self.holds_rail = false;
        self.finished = true;
        self.trips_completed += 1;
    }

    /// Round-trip turnaround: reverse the route and depart again half a day
    /// after the previous departure, rolled forward past `now`
    pub fn schedule_return(&mut self, now: SimTime) {
        self.route = reverse_route(&self.route);
        std::mem::swap(&mut self.origin, &mut self.destination);

        let mut next = self.departure_time + HALF_DAY_SECS;
        while next <= now {
            next += HALF_DAY_SECS;
        }
        self.departure_time = next;

        self.cursor = 0;
        self.position_m = 0.0;
        self.velocity_ms = 0.0;
        self.holds_rail = false;
        self.departed = false;
        self.finished = false;
        self.signal_hold_until = None;
        self.state = TrainState::Idle;
    }
}
