//! Railway network graph and routing

pub mod graph;
pub mod routing;

pub use graph::{Network, Node, NodeKind, Rail};
pub use routing::{reverse_route, shortest_route};
