//! Stations, junctions and the rails between them
//!
//! The network is an arena: nodes and rails live in vectors and refer to
//! each other through `NodeId`/`RailId` handles.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::types::{Direction, EventId, NodeId, PathSegment, RailId, SimTime, TrainId};
use crate::core::units::{km_to_m, kmh_to_ms};

/// What a node is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Trains must stop and dwell
    Station,
    /// Trains pass through without stopping
    Junction,
}

/// A station or junction
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Set while a signal failure is active here
    pub signal_failure: Option<EventId>,
    /// Extra dwell imposed by an active station delay (seconds)
    pub extra_dwell_s: SimTime,
}

impl Node {
    pub fn is_station(&self) -> bool {
        self.kind == NodeKind::Station
    }

    pub fn has_signal_failure(&self) -> bool {
        self.signal_failure.is_some()
    }
}

/// A bidirectional track segment
#[derive(Debug, Clone)]
pub struct Rail {
    pub id: RailId,
    pub a: NodeId,
    pub b: NodeId,
    pub length_km: f64,
    nominal_speed_kmh: f64,
    /// Active speed restrictions, in activation order
    restrictions: Vec<(EventId, f64)>,
    /// Trains currently holding this rail, ascending by id
    pub occupants: Vec<TrainId>,
}

impl Rail {
    pub fn length_m(&self) -> f64 {
        km_to_m(self.length_km)
    }

    /// Speed limit without any event restriction (km/h)
    pub fn nominal_speed_kmh(&self) -> f64 {
        self.nominal_speed_kmh
    }

    /// Current speed limit (km/h)
    ///
    /// With no restriction active this is exactly the nominal value.
    pub fn speed_limit_kmh(&self) -> f64 {
        self.restrictions
            .iter()
            .fold(self.nominal_speed_kmh, |limit, (_, factor)| limit * factor)
    }

    pub fn speed_limit_ms(&self) -> f64 {
        kmh_to_ms(self.speed_limit_kmh())
    }

    pub fn is_restricted(&self) -> bool {
        !self.restrictions.is_empty()
    }

    pub fn is_restricted_by(&self, event: EventId) -> bool {
        self.restrictions.iter().any(|(id, _)| *id == event)
    }

    /// Multiply the limit by `factor` until `lift_restriction(event)`
    pub fn apply_restriction(&mut self, event: EventId, factor: f64) {
        if !self.is_restricted_by(event) {
            self.restrictions.push((event, factor));
        }
    }

    pub fn lift_restriction(&mut self, event: EventId) {
        self.restrictions.retain(|(id, _)| *id != event);
    }

    pub fn connects(&self, node: NodeId) -> bool {
        self.a == node || self.b == node
    }

    /// The endpoint opposite `node`
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if node == self.a {
            Some(self.b)
        } else if node == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    pub fn start_node(&self, direction: Direction) -> NodeId {
        match direction {
            Direction::Forward => self.a,
            Direction::Reverse => self.b,
        }
    }

    pub fn end_node(&self, direction: Direction) -> NodeId {
        match direction {
            Direction::Forward => self.b,
            Direction::Reverse => self.a,
        }
    }

    /// Direction that leaves `node` along this rail
    pub fn direction_from(&self, node: NodeId) -> Option<Direction> {
        if node == self.a {
            Some(Direction::Forward)
        } else if node == self.b {
            Some(Direction::Reverse)
        } else {
            None
        }
    }
}

/// The railway graph
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Vec<Node>,
    rails: Vec<Rail>,
    by_name: AHashMap<String, NodeId>,
    adjacency: Vec<Vec<RailId>>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> Result<NodeId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(SimError::DuplicateNode(name));
        }

        let id = NodeId(self.nodes.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.nodes.push(Node {
            id,
            name,
            kind,
            signal_failure: None,
            extra_dwell_s: 0.0,
        });
        self.adjacency.push(Vec::new());
        Ok(id)
    }

    pub fn add_rail(
        &mut self,
        a: NodeId,
        b: NodeId,
        length_km: f64,
        speed_limit_kmh: f64,
    ) -> Result<RailId> {
        let invalid = |net: &Self, reason: &str| SimError::InvalidRail {
            from: net.name_of(a).to_string(),
            to: net.name_of(b).to_string(),
            reason: reason.to_string(),
        };

        if a.index() >= self.nodes.len() || b.index() >= self.nodes.len() {
            return Err(invalid(self, "unknown endpoint"));
        }
        if a == b {
            return Err(invalid(self, "endpoints must differ"));
        }
        if length_km <= 0.0 || speed_limit_kmh <= 0.0 {
            return Err(invalid(self, "length and speed limit must be positive"));
        }
        if self.rail_between(a, b).is_some() {
            return Err(invalid(self, "duplicate rail"));
        }

        let id = RailId(self.rails.len() as u32);
        self.rails.push(Rail {
            id,
            a,
            b,
            length_km,
            nominal_speed_kmh: speed_limit_kmh,
            restrictions: Vec::new(),
            occupants: Vec::new(),
        });
        self.adjacency[a.index()].push(id);
        self.adjacency[b.index()].push(id);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn try_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn rail(&self, id: RailId) -> &Rail {
        &self.rails[id.index()]
    }

    pub fn rail_mut(&mut self, id: RailId) -> &mut Rail {
        &mut self.rails[id.index()]
    }

    pub fn try_rail(&self, id: RailId) -> Option<&Rail> {
        self.rails.get(id.index())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn rails(&self) -> &[Rail] {
        &self.rails
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn rail_count(&self) -> usize {
        self.rails.len()
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Name of a node, `"?"` for a stale handle
    pub fn name_of(&self, id: NodeId) -> &str {
        self.try_node(id).map(|n| n.name.as_str()).unwrap_or("?")
    }

    /// Rails touching `node`, in insertion order
    pub fn rails_at(&self, node: NodeId) -> &[RailId] {
        self.adjacency
            .get(node.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn rail_between(&self, a: NodeId, b: NodeId) -> Option<RailId> {
        self.rails_at(a)
            .iter()
            .copied()
            .find(|&r| self.rail(r).other_end(a) == Some(b))
    }

    /// Directed segment from `a` to its neighbour `b`
    pub fn segment_between(&self, a: NodeId, b: NodeId) -> Option<PathSegment> {
        let rail = self.rail_between(a, b)?;
        let direction = self.rail(rail).direction_from(a)?;
        Some(PathSegment::new(rail, direction))
    }

    pub fn stations(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_station())
    }

    /// Nodes within `hops` edges of `center`, ascending by id
    pub fn nodes_within(&self, center: NodeId, hops: u32) -> Vec<NodeId> {
        let mut depth = vec![u32::MAX; self.nodes.len()];
        let mut frontier = vec![center];
        depth[center.index()] = 0;

        for level in 1..=hops {
            let mut next = Vec::new();
            for node in frontier {
                for &rail in self.rails_at(node) {
                    if let Some(other) = self.rail(rail).other_end(node) {
                        if depth[other.index()] == u32::MAX {
                            depth[other.index()] = level;
                            next.push(other);
                        }
                    }
                }
            }
            frontier = next;
        }

        depth
            .iter()
            .enumerate()
            .filter(|(_, d)| **d != u32::MAX)
            .map(|(i, _)| NodeId(i as u32))
            .collect()
    }

    /// Start and end node names of a directed segment
    pub fn segment_endpoints(&self, segment: PathSegment) -> (&str, &str) {
        match self.try_rail(segment.rail) {
            Some(rail) => (
                self.name_of(rail.start_node(segment.direction)),
                self.name_of(rail.end_node(segment.direction)),
            ),
            None => ("?", "?"),
        }
    }

    /// Rebuild every rail's occupancy from `(train, rail)` holdings
    pub fn set_occupancy(&mut self, holdings: impl IntoIterator<Item = (TrainId, RailId)>) {
        for rail in &mut self.rails {
            rail.occupants.clear();
        }
        for (train, rail) in holdings {
            if let Some(r) = self.rails.get_mut(rail.index()) {
                r.occupants.push(train);
            }
        }
        for rail in &mut self.rails {
            rail.occupants.sort_unstable();
        }
    }
}
