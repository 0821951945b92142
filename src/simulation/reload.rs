//! Hot reload of definition files
//!
//! A reload is all-or-nothing. Every unfinished train must survive the new
//! network: the rail it is on is looked up by its endpoint names and the
//! rest of its journey is routed again. If any train cannot be carried
//! over, the reload is rejected and the running simulation is left as it
//! was.

use std::path::{Path, PathBuf};

use ahash::AHashSet;
use tracing::{info, warn};

use crate::core::error::{Result, SimError};
use crate::core::types::{NodeId, PathSegment};
use crate::network::graph::Network;
use crate::network::routing::shortest_route;
use crate::scenario::loader::{build_trains, load_network, load_trains, report_rejected};
use crate::simulation::world::{Simulation, SourceFiles};
use crate::train::entity::Train;

/// Definition files to re-read
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadRequest {
    pub network: PathBuf,
    pub trains: PathBuf,
}

/// A train's journey expressed on the new network
#[derive(Debug, Clone)]
struct Remapped {
    index: usize,
    origin: NodeId,
    destination: NodeId,
    route: Vec<PathSegment>,
    position_m: f64,
}

/// Take the most recent pending request, discarding older ones
pub(crate) fn drain_reload_requests(sim: &mut Simulation) -> Option<ReloadRequest> {
    let receiver = sim.reloads.as_mut()?;
    let mut latest = None;
    while let Ok(request) = receiver.try_recv() {
        latest = Some(request);
    }
    latest
}

/// Re-read both definition files and swap them in
///
/// Returns the number of trains added. New trains start Idle; trains no
/// longer defined keep running. Scheduled and active events are dropped
/// along with the old network.
pub fn apply_reload(sim: &mut Simulation, network_path: &Path, trains_path: &Path) -> Result<usize> {
    let reject = |reason: String| SimError::ReloadRejected(reason);

    let network = load_network(network_path).map_err(|e| reject(e.to_string()))?;
    let (specs, mut rejected) = load_trains(trains_path).map_err(|e| reject(e.to_string()))?;

    let plan = sim
        .trains
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.finished)
        .map(|(index, train)| remap(index, train, &sim.network, &network))
        .collect::<Result<Vec<_>>>()?;

    let taken: AHashSet<String> = sim.trains.iter().map(|t| t.name.clone()).collect();
    let new_specs: Vec<_> = specs
        .into_iter()
        .filter(|s| !taken.contains(&s.name))
        .collect();
    let (added, unbuilt) = build_trains(&new_specs, &network, sim.trains.len() as u32, &taken);
    rejected.extend(unbuilt);
    report_rejected(&rejected);

    // Commit
    for step in plan {
        let train = &mut sim.trains[step.index];
        train.origin = step.origin;
        train.destination = step.destination;
        train.route = step.route;
        train.cursor = 0;
        train.position_m = step.position_m;
    }
    sim.network = network;
    let count = added.len();
    sim.add_trains(added);
    sim.scheduler.clear();
    sim.dispatcher.rebuild(&sim.network, &sim.trains);
    sim.sources = Some(SourceFiles {
        network: network_path.to_path_buf(),
        trains: trains_path.to_path_buf(),
    });

    info!(
        network = %network_path.display(),
        nodes = sim.network.node_count(),
        rails = sim.network.rail_count(),
        added = count,
        "definitions reloaded"
    );
    Ok(count)
}

fn remap(index: usize, train: &Train, old: &Network, new: &Network) -> Result<Remapped> {
    let lookup = |id: NodeId| {
        let name = old.name_of(id);
        new.node_by_name(name).ok_or_else(|| {
            SimError::ReloadRejected(format!("train '{}': node '{}' is gone", train.name, name))
        })
    };
    let origin = lookup(train.origin)?;
    let destination = lookup(train.destination)?;

    let unroutable = |e: SimError| {
        warn!(train = %train.name, "reload would strand train");
        SimError::ReloadRejected(format!("train '{}': {}", train.name, e))
    };

    let Some(segment) = train.current_segment() else {
        return Err(SimError::ReloadRejected(format!(
            "train '{}' has no current rail",
            train.name
        )));
    };
    let (start, end) = old.segment_endpoints(segment);
    let (start, end) = (
        new.node_by_name(start)
            .ok_or_else(|| SimError::UnknownNode(start.to_string()))
            .map_err(unroutable)?,
        new.node_by_name(end)
            .ok_or_else(|| SimError::UnknownNode(end.to_string()))
            .map_err(unroutable)?,
    );

    if !train.holds_rail {
        // Standing at a node: route afresh from there
        let route = shortest_route(new, start, destination).map_err(unroutable)?;
        if route.is_empty() {
            return Err(unroutable(SimError::Unroutable {
                from: new.name_of(start).to_string(),
                to: new.name_of(destination).to_string(),
            }));
        }
        return Ok(Remapped {
            index,
            origin,
            destination,
            route,
            position_m: 0.0,
        });
    }

    let current = new.segment_between(start, end).ok_or_else(|| {
        unroutable(SimError::Unroutable {
            from: new.name_of(start).to_string(),
            to: new.name_of(end).to_string(),
        })
    })?;
    let mut route = vec![current];
    route.extend(shortest_route(new, end, destination).map_err(unroutable)?);
    let length = new.rail(current.rail).length_m();

    Ok(Remapped {
        index,
        origin,
        destination,
        route,
        position_m: train.position_m.min(length),
    })
}
