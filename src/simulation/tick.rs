//! Per-tick pipeline of the railway simulation
//!
//! Live pipeline, executed synchronously every tick:
//! reload -> occupancy -> risk -> departures -> transitions -> physics and
//! rail-end crossings -> event pipeline -> reporting
//!
//! Mutations decided before physics are stamped with the tick's start time;
//! those made after physics are stamped with the next tick's start time, so
//! a replay re-applies each command at the same point of the pipeline.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::command::log::Command;
use crate::command::replay::{apply_to_train, Applied};
use crate::core::types::{EventId, NodeId, SimTime, TrainId};
use crate::safety::traffic::AccessDecision;
use crate::simulation::reload::{apply_reload, drain_reload_requests};
use crate::simulation::report::{DashboardSnapshot, JourneySnapshot};
use crate::simulation::world::{RunMode, Simulation};
use crate::train::entity::Train;
use crate::train::state::{StateContext, TrainState, Transition, UpdateContext};

/// Events generated during a simulation tick
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    Departed {
        train: TrainId,
        time: SimTime,
    },
    StateChanged {
        train: TrainId,
        from: TrainState,
        to: TrainState,
        time: SimTime,
    },
    /// Moved onto the route rail at `rail_index`
    AdvancedRail {
        train: TrainId,
        rail_index: usize,
        time: SimTime,
    },
    Arrived {
        train: TrainId,
        node: NodeId,
        time: SimTime,
    },
    Finished {
        train: TrainId,
        time: SimTime,
    },
    /// Round trip: the train heads back at `next_departure`
    TurnedAround {
        train: TrainId,
        next_departure: SimTime,
    },
    EventActivated {
        id: EventId,
        kind: &'static str,
        description: String,
        time: SimTime,
    },
    EventEnded {
        id: EventId,
        kind: &'static str,
        time: SimTime,
    },
    /// A station delay lengthened the dwell of a stopped train
    DwellExtended {
        train: TrainId,
        time: SimTime,
    },
    Reloaded {
        added: usize,
        time: SimTime,
    },
}

/// Run one simulation tick
pub fn run_simulation_tick(sim: &mut Simulation) -> Vec<SimulationEvent> {
    let now = sim.now();
    let next = sim.config.time_at(sim.current_tick + 1);
    let mut events = Vec::new();

    if sim.mode.is_replay() {
        replay_tick(sim, now, next, &mut events);
    } else {
        live_tick(sim, now, next, &mut events);
    }

    report(sim, next);
    sim.current_tick += 1;
    events
}

fn live_tick(sim: &mut Simulation, now: SimTime, next: SimTime, events: &mut Vec<SimulationEvent>) {
    if let Some(request) = drain_reload_requests(sim) {
        match apply_reload(sim, &request.network, &request.trains) {
            Ok(added) => {
                sim.log.record(Command::Reload {
                    t: now,
                    net_file: request.network.to_string_lossy().into_owned(),
                    train_file: request.trains.to_string_lossy().into_owned(),
                });
                events.push(SimulationEvent::Reloaded { added, time: now });
            }
            Err(e) => warn!("{}", e),
        }
    }

    refresh_occupancy(sim);
    refresh_risk(sim);

    check_departures(sim, now, events);
    evaluate_transitions(sim, now, events);

    advance_physics(sim);
    resolve_crossings(sim, next, events);

    run_event_pipeline(sim, next, events);
}

fn replay_tick(
    sim: &mut Simulation,
    now: SimTime,
    next: SimTime,
    events: &mut Vec<SimulationEvent>,
) {
    let window = match &mut sim.mode {
        RunMode::Replay(cursor) => cursor.take_until(next).to_vec(),
        RunMode::Live => Vec::new(),
    };
    for command in window {
        apply_recorded(sim, command, now, events);
    }

    refresh_occupancy(sim);
    refresh_risk(sim);
    advance_physics(sim);
    run_event_pipeline(sim, next, events);
}

/// Re-apply one recorded command and record it again
fn apply_recorded(
    sim: &mut Simulation,
    command: Command,
    now: SimTime,
    events: &mut Vec<SimulationEvent>,
) {
    match &command {
        Command::Reload {
            net_file,
            train_file,
            ..
        } => match apply_reload(sim, Path::new(net_file), Path::new(train_file)) {
            Ok(added) => events.push(SimulationEvent::Reloaded { added, time: now }),
            Err(e) => {
                warn!("recorded reload could not be repeated: {}", e);
                return;
            }
        },
        Command::Event {
            event_type, desc, ..
        } => {
            debug!(kind = %event_type, "{}", desc);
        }
        _ => {
            let Some(name) = command.train() else {
                return;
            };
            let Some(index) = sim.train_index(name) else {
                warn!(train = name, kind = command.type_name(), "unknown train, command skipped");
                return;
            };
            let round_trip = sim.config.round_trip;
            let train = &mut sim.trains[index];
            let id = train.id;
            match apply_to_train(&command, train, round_trip) {
                Ok(Applied::Departed) => {
                    events.push(SimulationEvent::Departed { train: id, time: now })
                }
                Ok(Applied::StateChanged { from, to }) => {
                    events.push(SimulationEvent::StateChanged {
                        train: id,
                        from,
                        to,
                        time: now,
                    })
                }
                Ok(Applied::Advanced { rail_index }) => {
                    events.push(SimulationEvent::AdvancedRail {
                        train: id,
                        rail_index,
                        time: now,
                    })
                }
                Ok(Applied::Finished) => {
                    events.push(SimulationEvent::Finished { train: id, time: now })
                }
                Err(e) => {
                    warn!(train = name, "command skipped: {}", e);
                    return;
                }
            }
        }
    }
    sim.log.record(command);
}

/// Step 1: rebuild rail occupancy from the trains holding rails
fn refresh_occupancy(sim: &mut Simulation) {
    sim.traffic.begin_tick();
    let holdings = sim
        .trains
        .iter()
        .filter(|t| t.holds_rail && !t.finished)
        .filter_map(|t| t.current_segment().map(|s| (t.id, s.rail)));
    sim.network.set_occupancy(holdings);
}

/// Step 2: one consistent risk snapshot for every train
fn refresh_risk(sim: &mut Simulation) {
    sim.risk.refresh(&sim.trains, &sim.network, &sim.config);
}

/// Train indices, highest priority first
fn priority_order(trains: &[Train]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..trains.len()).collect();
    order.sort_by_key(|&i| trains[i].priority_key());
    order
}

/// Step 3: promote due Idle trains whose first rail is granted
fn check_departures(sim: &mut Simulation, now: SimTime, events: &mut Vec<SimulationEvent>) {
    for i in priority_order(&sim.trains) {
        let train = &sim.trains[i];
        if train.finished
            || train.state != TrainState::Idle
            || train.departure_time > now
            || train.is_held(now)
            || train.signal_blocked(&sim.network)
        {
            continue;
        }
        let Some(segment) = train.current_segment() else {
            continue;
        };
        let decision = sim
            .traffic
            .request_rail_access(train, segment, &sim.trains, &sim.network);
        if decision != AccessDecision::Grant {
            continue;
        }

        sim.traffic.claim(train.id, segment);
        let train = &mut sim.trains[i];
        train.set_state(TrainState::Accelerating);
        info!(train = %train.name, from = %sim.network.name_of(train.origin), "departed");
        sim.log.record(Command::Departure {
            t: now,
            train: train.name.clone(),
        });
        events.push(SimulationEvent::Departed {
            train: train.id,
            time: now,
        });
    }
}

/// Step 4: ask every active train's state for a transition
fn evaluate_transitions(sim: &mut Simulation, now: SimTime, events: &mut Vec<SimulationEvent>) {
    for i in priority_order(&sim.trains) {
        if !sim.trains[i].is_active() {
            continue;
        }
        let risk = sim.risk.get(sim.trains[i].id);
        let transition = {
            let ctx = StateContext {
                network: &sim.network,
                trains: &sim.trains,
                risk: &risk,
                traffic: &sim.traffic,
                config: &sim.config,
                now,
            };
            let train = &sim.trains[i];
            train.state.transition(train, &ctx)
        };

        if let Transition::To(next) = transition {
            change_state(sim, i, next, now, events);
        }
    }
}

/// Apply, log and report a state change
///
/// Entering Accelerating from a node claims the rail for this tick.
fn change_state(
    sim: &mut Simulation,
    index: usize,
    next: TrainState,
    time: SimTime,
    events: &mut Vec<SimulationEvent>,
) {
    let train = &mut sim.trains[index];
    let takes_rail = next == TrainState::Accelerating && !train.holds_rail;
    let prev = train.set_state(next);
    if takes_rail {
        if let Some(segment) = train.current_segment() {
            sim.traffic.claim(train.id, segment);
        }
    }

    debug!(train = %train.name, from = prev.name(), to = next.name(), "state change");
    sim.log.record(Command::StateChange {
        t: time,
        train: train.name.clone(),
        from: prev.name().to_string(),
        to: next.name().to_string(),
    });
    events.push(SimulationEvent::StateChanged {
        train: train.id,
        from: prev,
        to: next,
        time,
    });
}

/// Step 5a: integrate physics through each state's update rule
fn advance_physics(sim: &mut Simulation) {
    let Simulation {
        trains,
        network,
        risk,
        config,
        ..
    } = sim;

    for train in trains.iter_mut() {
        if train.finished || train.state == TrainState::Idle {
            continue;
        }
        let snapshot = risk.get(train.id);
        let ctx = UpdateContext {
            network: &*network,
            risk: &snapshot,
            config: &*config,
        };
        let state = train.state;
        train.state = state.update(train, &ctx);
    }
}

/// Step 5b: trains that reached the end of their rail arrive at its node
fn resolve_crossings(sim: &mut Simulation, next: SimTime, events: &mut Vec<SimulationEvent>) {
    let tolerance = sim.config.arrival_tolerance_m;
    for i in 0..sim.trains.len() {
        let train = &sim.trains[i];
        if train.finished
            || !train.holds_rail
            || !train.state.is_running()
            || train.remaining_on_rail_m(&sim.network) > tolerance
        {
            continue;
        }
        arrive(sim, i, next, events);
    }
}

fn arrive(sim: &mut Simulation, index: usize, time: SimTime, events: &mut Vec<SimulationEvent>) {
    let train = &sim.trains[index];
    let id = train.id;
    let Some(node) = train.approaching_node(&sim.network) else {
        return;
    };
    let next_index = train.cursor + 1;
    events.push(SimulationEvent::Arrived {
        train: id,
        node,
        time,
    });

    if next_index >= train.route.len() {
        finish_journey(sim, index, time, events);
        return;
    }

    let train = &mut sim.trains[index];
    train.enter_rail_index(next_index);
    sim.log.record(Command::AdvanceRail {
        t: time,
        train: train.name.clone(),
        rail_index: next_index,
    });
    events.push(SimulationEvent::AdvancedRail {
        train: id,
        rail_index: next_index,
        time,
    });

    let node = sim.network.node(node);
    let next_state = if node.is_station() {
        TrainState::Stopped {
            dwell_remaining_s: train.stop_duration_s + node.extra_dwell_s,
        }
    } else if train.is_held(time) || train.signal_blocked(&sim.network) {
        TrainState::Waiting
    } else {
        let train = &sim.trains[index];
        let granted = train.current_segment().is_some_and(|segment| {
            sim.traffic
                .request_rail_access(train, segment, &sim.trains, &sim.network)
                .is_grant()
        });
        if granted {
            TrainState::Accelerating
        } else {
            TrainState::Waiting
        }
    };
    change_state(sim, index, next_state, time, events);
}

fn finish_journey(
    sim: &mut Simulation,
    index: usize,
    time: SimTime,
    events: &mut Vec<SimulationEvent>,
) {
    change_state(
        sim,
        index,
        TrainState::Stopped {
            dwell_remaining_s: 0.0,
        },
        time,
        events,
    );

    let train = &mut sim.trains[index];
    let rail_index = train.route.len();
    sim.log.record(Command::AdvanceRail {
        t: time,
        train: train.name.clone(),
        rail_index,
    });
    train.finish();
    info!(
        train = %train.name,
        at = %sim.network.name_of(train.destination),
        "journey complete"
    );
    events.push(SimulationEvent::Finished {
        train: train.id,
        time,
    });

    if sim.config.round_trip {
        train.schedule_return(time);
        info!(train = %train.name, next_departure = train.departure_time, "turned around");
        events.push(SimulationEvent::TurnedAround {
            train: train.id,
            next_departure: train.departure_time,
        });
    }
}

/// Step 6: activate and expire events, then roll for new ones
fn run_event_pipeline(sim: &mut Simulation, time: SimTime, events: &mut Vec<SimulationEvent>) {
    let outcome = sim
        .scheduler
        .advance(time, &mut sim.network, &mut sim.trains, &sim.dispatcher);
    let live = !sim.mode.is_replay();

    for notice in &outcome.activated {
        if live {
            sim.log.record(Command::Event {
                t: time,
                event_type: notice.type_name.to_string(),
                desc: notice.description.clone(),
            });
        }
        sim.reporter.event_activated(notice);
        events.push(SimulationEvent::EventActivated {
            id: notice.id,
            kind: notice.type_name,
            description: notice.description.clone(),
            time,
        });
    }
    for notice in &outcome.expired {
        sim.reporter.event_ended(notice);
        events.push(SimulationEvent::EventEnded {
            id: notice.id,
            kind: notice.type_name,
            time,
        });
    }

    for id in outcome.forced_stops {
        let index = id.0 as usize;
        let Some(train) = sim.trains.get(index) else {
            continue;
        };
        if train.finished || train.state == TrainState::Emergency {
            continue;
        }
        warn!(train = %train.name, "signal failure ahead, emergency stop");
        change_state(sim, index, TrainState::Emergency, time, events);
    }

    for id in outcome.delayed {
        if let Some(train) = sim.trains.get(id.0 as usize) {
            if let TrainState::Stopped { dwell_remaining_s } = train.state {
                info!(
                    train = %train.name,
                    dwell_s = dwell_remaining_s,
                    "dwell extended by station delay"
                );
            }
        }
        events.push(SimulationEvent::DwellExtended { train: id, time });
    }

    sim.factory
        .maybe_generate(time, &sim.network, &mut sim.scheduler);
}

/// Step 7: periodic dashboard and journey snapshots
fn report(sim: &mut Simulation, time: SimTime) {
    let interval = sim.config.report_interval_s;
    if interval <= 0.0 || time < sim.next_report {
        return;
    }
    while sim.next_report <= time {
        sim.next_report += interval;
    }

    let snapshot = DashboardSnapshot {
        time,
        active_trains: sim.active_trains(),
        total_trains: sim.trains.len(),
        completed_trains: sim.finished_trains(),
        active_events: sim.scheduler.active().len(),
    };
    sim.reporter.dashboard(&snapshot);

    for train in sim.trains.iter().filter(|t| t.is_active()) {
        let journey = JourneySnapshot::capture(train, &sim.trains, &sim.network, time);
        if let Some(journey) = journey {
            sim.reporter.journey(&journey);
        }
    }
}
