//! Build a network and a fleet from definition files
//!
//! Network problems are fatal: a simulation cannot run on a broken graph.
//! Train problems are not: the offending train is reported and omitted.

use std::path::Path;

use ahash::AHashSet;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::clock::parse_clock;
use crate::core::error::{Result, SimError};
use crate::core::types::TrainId;
use crate::network::graph::Network;
use crate::scenario::definitions::{NetworkFile, TrainDef, TrainFile};
use crate::train::entity::{Train, TrainSpec};

/// Why a train definition was left out of the simulation
#[derive(Debug, Error)]
pub enum TrainBuildError {
    #[error("train '{name}': {reason}")]
    Invalid { name: String, reason: String },
    #[error("train '{name}': departure time '{value}' is not HH:MM[:SS]")]
    BadDepartureTime { name: String, value: String },
    #[error("train '{name}': name already in use")]
    DuplicateName { name: String },
    #[error("train '{name}': {source}")]
    Unroutable {
        name: String,
        #[source]
        source: SimError,
    },
}

/// Parse a network definition
pub fn parse_network(content: &str) -> Result<Network> {
    let file: NetworkFile = toml::from_str(content)?;
    build_network(&file)
}

pub fn load_network(path: &Path) -> Result<Network> {
    let content = std::fs::read_to_string(path)?;
    let network = parse_network(&content)?;
    info!(
        path = %path.display(),
        nodes = network.node_count(),
        rails = network.rail_count(),
        "network loaded"
    );
    Ok(network)
}

pub fn build_network(file: &NetworkFile) -> Result<Network> {
    let mut network = Network::new();
    for node in &file.nodes {
        network.add_node(node.name.clone(), node.kind)?;
    }
    for rail in &file.rails {
        let a = network
            .node_by_name(&rail.from)
            .ok_or_else(|| SimError::UnknownNode(rail.from.clone()))?;
        let b = network
            .node_by_name(&rail.to)
            .ok_or_else(|| SimError::UnknownNode(rail.to.clone()))?;
        network.add_rail(a, b, rail.length_km, rail.speed_limit_kmh)?;
    }
    Ok(network)
}

/// Parse a train definition file into validated specs
///
/// Syntax errors are fatal; per-train problems are returned alongside.
pub fn parse_trains(content: &str) -> Result<(Vec<TrainSpec>, Vec<TrainBuildError>)> {
    let file: TrainFile = toml::from_str(content)?;
    Ok(to_specs(&file.trains))
}

pub fn load_trains(path: &Path) -> Result<(Vec<TrainSpec>, Vec<TrainBuildError>)> {
    let content = std::fs::read_to_string(path)?;
    parse_trains(&content)
}

fn to_specs(defs: &[TrainDef]) -> (Vec<TrainSpec>, Vec<TrainBuildError>) {
    let mut specs = Vec::with_capacity(defs.len());
    let mut rejected = Vec::new();

    for def in defs {
        let departure_time = match parse_clock(&def.departure_time) {
            Ok(t) => t,
            Err(_) => {
                rejected.push(TrainBuildError::BadDepartureTime {
                    name: def.name.clone(),
                    value: def.departure_time.clone(),
                });
                continue;
            }
        };
        let spec = TrainSpec {
            name: def.name.clone(),
            mass_tons: def.mass_tons,
            friction_coef: def.friction_coef,
            max_accel_kn: def.max_accel_kn,
            max_brake_kn: def.max_brake_kn,
            departure: def.departure.clone(),
            departure_time,
            arrival: def.arrival.clone(),
            stop_duration_s: def.stop_duration_s,
        };
        match spec.validate() {
            Ok(()) => specs.push(spec),
            Err(reason) => rejected.push(TrainBuildError::Invalid {
                name: def.name.clone(),
                reason,
            }),
        }
    }

    (specs, rejected)
}

/// Instantiate trains on `network`, ids assigned from `first_id` upward
///
/// Names already in `taken` and unroutable journeys are rejected.
pub fn build_trains(
    specs: &[TrainSpec],
    network: &Network,
    first_id: u32,
    taken: &AHashSet<String>,
) -> (Vec<Train>, Vec<TrainBuildError>) {
    let mut trains = Vec::with_capacity(specs.len());
    let mut rejected = Vec::new();
    let mut names = taken.clone();

    for spec in specs {
        if !names.insert(spec.name.clone()) {
            rejected.push(TrainBuildError::DuplicateName {
                name: spec.name.clone(),
            });
            continue;
        }
        let id = TrainId(first_id + trains.len() as u32);
        match Train::new(id, spec, network) {
            Ok(train) => trains.push(train),
            Err(source) => {
                names.remove(&spec.name);
                rejected.push(TrainBuildError::Unroutable {
                    name: spec.name.clone(),
                    source,
                });
            }
        }
    }

    (trains, rejected)
}

/// Log every rejected train
pub fn report_rejected(rejected: &[TrainBuildError]) {
    for err in rejected {
        warn!("{}, train omitted", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::graph::NodeKind;

    const NETWORK: &str = r#"
        [[nodes]]
        name = "A"

        [[nodes]]
        name = "J"
        kind = "junction"

        [[nodes]]
        name = "B"

        [[nodes]]
        name = "Island"

        [[rails]]
        from = "A"
        to = "J"
        length_km = 3.0
        speed_limit_kmh = 120.0

        [[rails]]
        from = "J"
        to = "B"
        length_km = 4.0
        speed_limit_kmh = 100.0
    "#;

    const TRAINS: &str = r#"
        [[trains]]
        name = "IC1"
        mass_tons = 400.0
        max_accel_kn = 250.0
        max_brake_kn = 350.0
        departure = "A"
        departure_time = "07:30"
        arrival = "B"

        [[trains]]
        name = "Broken"
        mass_tons = -1.0
        max_accel_kn = 250.0
        max_brake_kn = 350.0
        departure = "A"
        departure_time = "07:30"
        arrival = "B"

        [[trains]]
        name = "Late"
        mass_tons = 400.0
        max_accel_kn = 250.0
        max_brake_kn = 350.0
        departure = "A"
        departure_time = "25:99"
        arrival = "B"

        [[trains]]
        name = "Lost"
        mass_tons = 400.0
        max_accel_kn = 250.0
        max_brake_kn = 350.0
        departure = "A"
        departure_time = "08:00:30"
        arrival = "Island"
    "#;

    #[test]
    fn test_parse_network() {
        let net = parse_network(NETWORK).unwrap();
        assert_eq!(net.node_count(), 4);
        assert_eq!(net.rail_count(), 2);
        let j = net.node_by_name("J").unwrap();
        assert_eq!(net.node(j).kind, NodeKind::Junction);
    }

    #[test]
    fn test_rail_to_unknown_node_is_fatal() {
        let bad = r#"
            [[nodes]]
            name = "A"
            [[rails]]
            from = "A"
            to = "Z"
            length_km = 1.0
            speed_limit_kmh = 50.0
        "#;
        assert!(matches!(parse_network(bad), Err(SimError::UnknownNode(_))));
    }

    #[test]
    fn test_bad_trains_are_omitted() {
        let net = parse_network(NETWORK).unwrap();
        let (specs, rejected) = parse_trains(TRAINS).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(rejected.len(), 2);
        assert_eq!(specs[0].departure_time, 7.5 * 3600.0);
        assert_eq!(specs[0].stop_duration_s, 60.0);

        let (trains, rejected) = build_trains(&specs, &net, 0, &AHashSet::new());
        assert_eq!(trains.len(), 1);
        assert_eq!(trains[0].id, TrainId(0));
        assert!(matches!(rejected[0], TrainBuildError::Unroutable { .. }));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let net = parse_network(NETWORK).unwrap();
        let (specs, _) = parse_trains(TRAINS).unwrap();
        let taken: AHashSet<String> = ["IC1".to_string()].into_iter().collect();
        let (trains, rejected) = build_trains(&specs[..1], &net, 5, &taken);
        assert!(trains.is_empty());
        assert!(matches!(rejected[0], TrainBuildError::DuplicateName { .. }));
    }
}
