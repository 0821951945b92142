//! Shortest-path routing over the rail graph
//!
//! Dijkstra on rail length. Ties are broken by node id so the same network
//! always yields the same route.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::core::error::{Result, SimError};
use crate::core::types::{NodeId, PathSegment};
use crate::network::graph::Network;

/// Shortest route from `from` to `to` as directed segments
///
/// An empty route means `from == to`.
pub fn shortest_route(network: &Network, from: NodeId, to: NodeId) -> Result<Vec<PathSegment>> {
    let unroutable = || SimError::Unroutable {
        from: network.name_of(from).to_string(),
        to: network.name_of(to).to_string(),
    };

    if network.try_node(from).is_none() || network.try_node(to).is_none() {
        return Err(unroutable());
    }
    if from == to {
        return Ok(Vec::new());
    }

    let n = network.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<(NodeId, PathSegment)>> = vec![None; n];
    let mut heap = BinaryHeap::new();

    dist[from.index()] = 0.0;
    heap.push(Reverse((OrderedFloat(0.0), from)));

    while let Some(Reverse((OrderedFloat(d), node))) = heap.pop() {
        if node == to {
            break;
        }
        if d > dist[node.index()] {
            continue;
        }

        for &rail_id in network.rails_at(node) {
            let rail = network.rail(rail_id);
            let (Some(next), Some(direction)) = (rail.other_end(node), rail.direction_from(node))
            else {
                continue;
            };

            let candidate = d + rail.length_km;
            if candidate < dist[next.index()] {
                dist[next.index()] = candidate;
                prev[next.index()] = Some((node, PathSegment::new(rail_id, direction)));
                heap.push(Reverse((OrderedFloat(candidate), next)));
            }
        }
    }

    if prev[to.index()].is_none() {
        return Err(unroutable());
    }

    let mut route = Vec::new();
    let mut cursor = to;
    while let Some((parent, segment)) = prev[cursor.index()] {
        route.push(segment);
        cursor = parent;
    }
    route.reverse();
    Ok(route)
}

/// The same route driven backwards
pub fn reverse_route(route: &[PathSegment]) -> Vec<PathSegment> {
    route.iter().rev().map(|s| s.reversed()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Direction;
    use crate::network::graph::NodeKind;

    fn diamond() -> (Network, Vec<NodeId>) {
        // A - B - D is 2 km, A - C - D is 3 km
        let mut net = Network::new();
        let a = net.add_node("A", NodeKind::Station).unwrap();
        let b = net.add_node("B", NodeKind::Junction).unwrap();
        let c = net.add_node("C", NodeKind::Junction).unwrap();
        let d = net.add_node("D", NodeKind::Station).unwrap();
        let e = net.add_node("E", NodeKind::Station).unwrap();
        net.add_rail(a, b, 1.0, 100.0).unwrap();
        net.add_rail(b, d, 1.0, 100.0).unwrap();
        net.add_rail(a, c, 1.5, 100.0).unwrap();
        net.add_rail(d, c, 1.5, 100.0).unwrap();
        (net, vec![a, b, c, d, e])
    }

    #[test]
    fn test_shortest_route_prefers_short_branch() {
        let (net, n) = diamond();
        let route = shortest_route(&net, n[0], n[3]).unwrap();
        assert_eq!(route.len(), 2);
        assert_eq!(net.segment_endpoints(route[0]), ("A", "B"));
        assert_eq!(net.segment_endpoints(route[1]), ("B", "D"));
        let km: f64 = route.iter().map(|s| net.rail(s.rail).length_km).sum();
        assert_eq!(km, 2.0);
    }

    #[test]
    fn test_route_direction_follows_travel() {
        let (net, n) = diamond();
        let route = shortest_route(&net, n[3], n[2]).unwrap();
        assert_eq!(route.len(), 1);
        // rail was declared D -> C, so D to C is forward
        assert_eq!(route[0].direction, Direction::Forward);
    }

    #[test]
    fn test_unreachable_node_is_error() {
        let (net, n) = diamond();
        assert!(matches!(
            shortest_route(&net, n[0], n[4]),
            Err(SimError::Unroutable { .. })
        ));
    }

    #[test]
    fn test_same_node_route_is_empty() {
        let (net, n) = diamond();
        assert!(shortest_route(&net, n[1], n[1]).unwrap().is_empty());
    }

    #[test]
    fn test_reverse_route() {
        let (net, n) = diamond();
        let route = shortest_route(&net, n[0], n[3]).unwrap();
        let back = reverse_route(&route);
        assert_eq!(net.segment_endpoints(back[0]), ("D", "B"));
        assert_eq!(net.segment_endpoints(back[1]), ("B", "A"));
    }
}
