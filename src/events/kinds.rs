//! Disruptive event kinds and their applicability rules

use serde::{Deserialize, Serialize};

use crate::core::types::{EventId, NodeId, RailId, SimTime};
use crate::network::graph::{Network, Rail};
use crate::train::entity::Train;
use crate::train::state::TrainState;

/// Kind-specific payload of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// Extra dwell for trains stopping at a station
    StationDelay { node: NodeId, extra_dwell_s: SimTime },
    /// Speed restriction on one rail
    TrackMaintenance { rail: RailId, speed_factor: f64 },
    /// Trains at or approaching the node are stopped
    SignalFailure { node: NodeId, stop_duration_s: SimTime },
    /// Speed restriction on every rail around a center node
    Weather {
        center: NodeId,
        radius_hops: u32,
        speed_factor: f64,
        /// Nodes within `radius_hops` of the center, ascending
        region: Vec<NodeId>,
    },
}

/// A scheduled or active event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub start: SimTime,
    pub duration_s: SimTime,
    pub active: bool,
    pub kind: EventKind,
    /// Rails this event restricted, with the limit they had before (km/h)
    pub original_limits: Vec<(RailId, f64)>,
}

impl Event {
    pub fn new(id: EventId, kind: EventKind, start: SimTime, duration_s: SimTime) -> Self {
        Self {
            id,
            start,
            duration_s,
            active: false,
            kind,
            original_limits: Vec::new(),
        }
    }

    pub fn end(&self) -> SimTime {
        self.start + self.duration_s
    }

    /// Name used in the command log
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            EventKind::StationDelay { .. } => "STATION_DELAY",
            EventKind::TrackMaintenance { .. } => "TRACK_MAINTENANCE",
            EventKind::SignalFailure { .. } => "SIGNAL_FAILURE",
            EventKind::Weather { .. } => "WEATHER",
        }
    }

    /// Node the event is anchored to, if any
    pub fn anchor_node(&self) -> Option<NodeId> {
        match &self.kind {
            EventKind::StationDelay { node, .. } | EventKind::SignalFailure { node, .. } => {
                Some(*node)
            }
            EventKind::Weather { center, .. } => Some(*center),
            EventKind::TrackMaintenance { .. } => None,
        }
    }

    /// Speed factor for rail-restricting kinds
    pub fn speed_factor(&self) -> Option<f64> {
        match &self.kind {
            EventKind::TrackMaintenance { speed_factor, .. }
            | EventKind::Weather { speed_factor, .. } => Some(*speed_factor),
            _ => None,
        }
    }

    pub fn describe(&self, network: &Network) -> String {
        let minutes = self.duration_s / 60.0;
        match &self.kind {
            EventKind::StationDelay {
                node,
                extra_dwell_s,
            } => format!(
                "Station delay at {}: +{:.0} min dwell for {:.0} min",
                network.name_of(*node),
                extra_dwell_s / 60.0,
                minutes
            ),
            EventKind::TrackMaintenance { rail, speed_factor } => {
                let (a, b) = network
                    .try_rail(*rail)
                    .map(|r| (network.name_of(r.a), network.name_of(r.b)))
                    .unwrap_or(("?", "?"));
                format!(
                    "Track maintenance on {}-{}: speed x{:.2} for {:.0} min",
                    a, b, speed_factor, minutes
                )
            }
            EventKind::SignalFailure { node, .. } => format!(
                "Signal failure at {} for {:.0} min",
                network.name_of(*node),
                minutes
            ),
            EventKind::Weather {
                center,
                radius_hops,
                speed_factor,
                ..
            } => format!(
                "Weather around {} (radius {}): speed x{:.2} on {} rails for {:.0} min",
                network.name_of(*center),
                radius_hops,
                speed_factor,
                self.affected_rails(network).len(),
                minutes
            ),
        }
    }

    /// Does this event change the node itself
    pub fn applies_to_node(&self, node: NodeId) -> bool {
        match &self.kind {
            EventKind::StationDelay { node: n, .. } | EventKind::SignalFailure { node: n, .. } => {
                *n == node
            }
            _ => false,
        }
    }

    /// Does this event restrict the rail
    ///
    /// Weather covers rails touching its center and rails with both ends
    /// inside its radius.
    pub fn applies_to_rail(&self, rail: &Rail) -> bool {
        match &self.kind {
            EventKind::TrackMaintenance { rail: r, .. } => *r == rail.id,
            EventKind::Weather { center, region, .. } => {
                rail.connects(*center)
                    || (region.binary_search(&rail.a).is_ok()
                        && region.binary_search(&rail.b).is_ok())
            }
            _ => false,
        }
    }

    /// Does this event act on the train directly
    ///
    /// Signal failures catch trains standing at the node or running toward
    /// it; station delays catch trains dwelling there.
    pub fn applies_to_train(&self, train: &Train, network: &Network) -> bool {
        if train.finished {
            return false;
        }
        match &self.kind {
            EventKind::SignalFailure { node, .. } => {
                train.current_node(network) == Some(*node)
                    || (train.holds_rail && train.approaching_node(network) == Some(*node))
            }
            EventKind::StationDelay { node, .. } => {
                matches!(train.state, TrainState::Stopped { .. })
                    && train.current_node(network) == Some(*node)
            }
            _ => false,
        }
    }

    pub fn affected_rails(&self, network: &Network) -> Vec<RailId> {
        network
            .rails()
            .iter()
            .filter(|r| self.applies_to_rail(r))
            .map(|r| r.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::graph::NodeKind;

    fn star() -> Network {
        // C is the hub; A, B, D hang off it; E hangs off D
        let mut net = Network::new();
        let a = net.add_node("A", NodeKind::Station).unwrap();
        let b = net.add_node("B", NodeKind::Station).unwrap();
        let c = net.add_node("C", NodeKind::Junction).unwrap();
        let d = net.add_node("D", NodeKind::Station).unwrap();
        let e = net.add_node("E", NodeKind::Station).unwrap();
        net.add_rail(a, c, 1.0, 100.0).unwrap();
        net.add_rail(b, c, 1.0, 100.0).unwrap();
        net.add_rail(c, d, 1.0, 100.0).unwrap();
        net.add_rail(d, e, 1.0, 100.0).unwrap();
        net
    }

    fn weather(net: &Network, center: &str, radius: u32) -> Event {
        let center = net.node_by_name(center).unwrap();
        Event::new(
            EventId(1),
            EventKind::Weather {
                center,
                radius_hops: radius,
                speed_factor: 0.5,
                region: net.nodes_within(center, radius),
            },
            0.0,
            600.0,
        )
    }

    #[test]
    fn test_weather_radius_zero_covers_center_rails() {
        let net = star();
        let event = weather(&net, "C", 0);
        assert_eq!(event.affected_rails(&net).len(), 3);
    }

    #[test]
    fn test_weather_radius_extends_coverage() {
        let net = star();
        let event = weather(&net, "A", 2);
        // A-C touches center; B-C and C-D have both ends within 2 hops
        assert_eq!(event.affected_rails(&net).len(), 3);
        let event = weather(&net, "A", 3);
        assert_eq!(event.affected_rails(&net).len(), 4);
    }

    #[test]
    fn test_type_names_and_descriptions() {
        let net = star();
        let event = Event::new(
            EventId(2),
            EventKind::TrackMaintenance {
                rail: RailId(0),
                speed_factor: 0.5,
            },
            0.0,
            1800.0,
        );
        assert_eq!(event.type_name(), "TRACK_MAINTENANCE");
        assert_eq!(event.end(), 1800.0);
        assert_eq!(
            event.describe(&net),
            "Track maintenance on A-C: speed x0.50 for 30 min"
        );
        assert_eq!(event.speed_factor(), Some(0.5));
    }

    #[test]
    fn test_node_applicability() {
        let net = star();
        let c = net.node_by_name("C").unwrap();
        let event = Event::new(
            EventId(3),
            EventKind::SignalFailure {
                node: c,
                stop_duration_s: 60.0,
            },
            0.0,
            600.0,
        );
        assert!(event.applies_to_node(c));
        assert!(!event.applies_to_node(net.node_by_name("A").unwrap()));
        assert!(event.affected_rails(&net).is_empty());
    }
}
