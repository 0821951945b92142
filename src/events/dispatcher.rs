//! Event dispatcher: fans an event out to the observers it applies to
//!
//! Nodes, rails and trains register as observers. On activation and expiry
//! every observer the event applies to receives the effect, in registration
//! order (nodes, then rails, then trains, each ascending by id).

use tracing::debug;

use crate::core::types::{NodeId, RailId, SimTime, TrainId};
use crate::events::kinds::{Event, EventKind};
use crate::network::graph::Network;
use crate::train::entity::Train;
use crate::train::state::TrainState;

/// Something that reacts to events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Observer {
    Node(NodeId),
    Rail(RailId),
    Train(TrainId),
}

/// Lifecycle step being dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Activated,
    Expired,
}

/// Train-level consequences the orchestrator has to act on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    /// Running trains that must go to Emergency
    pub forced_stops: Vec<TrainId>,
    /// Dwelling trains whose stop got longer
    pub delayed: Vec<TrainId>,
}

impl DispatchOutcome {
    pub fn merge(&mut self, other: DispatchOutcome) {
        self.forced_stops.extend(other.forced_stops);
        self.delayed.extend(other.delayed);
    }
}

#[derive(Debug, Clone)]
pub struct EventDispatcher {
    observers: Vec<Observer>,
    train_effects: bool,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            train_effects: true,
        }
    }

    /// Register an observer; registering twice is a no-op
    pub fn register(&mut self, observer: Observer) {
        if let Err(pos) = self.observers.binary_search(&observer) {
            self.observers.insert(pos, observer);
        }
    }

    pub fn observers(&self) -> &[Observer] {
        &self.observers
    }

    /// Register every node, rail and train
    pub fn rebuild(&mut self, network: &Network, trains: &[Train]) {
        self.observers.clear();
        self.observers
            .extend(network.nodes().iter().map(|n| Observer::Node(n.id)));
        self.observers
            .extend(network.rails().iter().map(|r| Observer::Rail(r.id)));
        self.observers
            .extend(trains.iter().map(|t| Observer::Train(t.id)));
        self.observers.sort_unstable();
    }

    /// Switch direct effects on trains on or off
    ///
    /// Replays turn them off: train consequences come from the log.
    pub fn set_train_effects(&mut self, enabled: bool) {
        self.train_effects = enabled;
    }

    pub fn train_effects(&self) -> bool {
        self.train_effects
    }

    /// Deliver one lifecycle step of `event` to every applicable observer
    pub fn dispatch(
        &self,
        event: &mut Event,
        phase: Phase,
        network: &mut Network,
        trains: &mut [Train],
        now: SimTime,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        for observer in &self.observers {
            match *observer {
                Observer::Node(id) => {
                    if event.applies_to_node(id) {
                        apply_to_node(event, phase, network, id);
                    }
                }
                Observer::Rail(id) => {
                    let applies = network
                        .try_rail(id)
                        .is_some_and(|rail| event.applies_to_rail(rail));
                    if applies {
                        apply_to_rail(event, phase, network, id);
                    }
                }
                Observer::Train(id) => {
                    if !self.train_effects || phase != Phase::Activated {
                        continue;
                    }
                    let Some(train) = trains.iter_mut().find(|t| t.id == id) else {
                        continue;
                    };
                    if event.applies_to_train(train, network) {
                        apply_to_train(event, train, now, &mut outcome);
                    }
                }
            }
        }

        outcome
    }

    /// Catch trains that reached an active signal failure after it started
    ///
    /// Trains still held are skipped, so a running hold is not extended.
    pub fn enforce(
        &self,
        event: &Event,
        network: &Network,
        trains: &mut [Train],
        now: SimTime,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        if !self.train_effects || !matches!(event.kind, EventKind::SignalFailure { .. }) {
            return outcome;
        }

        for observer in &self.observers {
            let Observer::Train(id) = *observer else {
                continue;
            };
            let Some(train) = trains.iter_mut().find(|t| t.id == id) else {
                continue;
            };
            if train.is_held(now) || !event.applies_to_train(train, network) {
                continue;
            }
            debug!(train = %train.name, event = event.id.0, "caught by signal failure");
            apply_to_train(event, train, now, &mut outcome);
        }

        outcome
    }
}

fn apply_to_node(event: &Event, phase: Phase, network: &mut Network, id: NodeId) {
    let node = network.node_mut(id);
    match (&event.kind, phase) {
        (EventKind::StationDelay { extra_dwell_s, .. }, Phase::Activated) => {
            node.extra_dwell_s = *extra_dwell_s;
        }
        (EventKind::StationDelay { .. }, Phase::Expired) => {
            node.extra_dwell_s = 0.0;
        }
        (EventKind::SignalFailure { .. }, Phase::Activated) => {
            node.signal_failure = Some(event.id);
        }
        (EventKind::SignalFailure { .. }, Phase::Expired) => {
            if node.signal_failure == Some(event.id) {
                node.signal_failure = None;
            }
        }
        _ => {}
    }
}

fn apply_to_rail(event: &mut Event, phase: Phase, network: &mut Network, id: RailId) {
    let Some(factor) = event.speed_factor() else {
        return;
    };
    let rail = network.rail_mut(id);
    match phase {
        Phase::Activated => {
            event.original_limits.push((id, rail.speed_limit_kmh()));
            rail.apply_restriction(event.id, factor);
            debug!(
                rail = id.0,
                limit_kmh = rail.speed_limit_kmh(),
                "speed restriction applied"
            );
        }
        Phase::Expired => {
            rail.lift_restriction(event.id);
            debug!(
                rail = id.0,
                limit_kmh = rail.speed_limit_kmh(),
                "speed restriction lifted"
            );
        }
    }
}

fn apply_to_train(event: &Event, train: &mut Train, now: SimTime, outcome: &mut DispatchOutcome) {
    match &event.kind {
        EventKind::SignalFailure {
            stop_duration_s, ..
        } => {
            train.hold_until(now + stop_duration_s);
            if train.state.is_running() && train.state != TrainState::Emergency {
                outcome.forced_stops.push(train.id);
            }
        }
        EventKind::StationDelay { extra_dwell_s, .. } => {
            if let TrainState::Stopped { dwell_remaining_s } = &mut train.state {
                *dwell_remaining_s += extra_dwell_s;
                outcome.delayed.push(train.id);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::EventId;
    use crate::network::graph::NodeKind;
    use crate::train::entity::TrainSpec;

    fn setup() -> (Network, Vec<Train>) {
        let mut net = Network::new();
        let a = net.add_node("A", NodeKind::Station).unwrap();
        let b = net.add_node("B", NodeKind::Junction).unwrap();
        let c = net.add_node("C", NodeKind::Station).unwrap();
        net.add_rail(a, b, 5.0, 120.0).unwrap();
        net.add_rail(b, c, 5.0, 120.0).unwrap();

        let spec = TrainSpec {
            name: "IC1".into(),
            mass_tons: 400.0,
            friction_coef: 0.002,
            max_accel_kn: 300.0,
            max_brake_kn: 400.0,
            departure: "A".into(),
            departure_time: 0.0,
            arrival: "C".into(),
            stop_duration_s: 60.0,
        };
        let trains = vec![Train::new(TrainId(0), &spec, &net).unwrap()];
        (net, trains)
    }

    fn dispatcher(net: &Network, trains: &[Train]) -> EventDispatcher {
        let mut d = EventDispatcher::new();
        d.rebuild(net, trains);
        d
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut d = EventDispatcher::new();
        d.register(Observer::Rail(RailId(1)));
        d.register(Observer::Node(NodeId(0)));
        d.register(Observer::Rail(RailId(1)));
        assert_eq!(
            d.observers(),
            &[Observer::Node(NodeId(0)), Observer::Rail(RailId(1))]
        );
    }

    #[test]
    fn test_maintenance_restricts_and_restores() {
        let (mut net, mut trains) = setup();
        let d = dispatcher(&net, &trains);
        let before = net.rail(RailId(0)).speed_limit_kmh();

        let mut event = Event::new(
            EventId(1),
            EventKind::TrackMaintenance {
                rail: RailId(0),
                speed_factor: 0.5,
            },
            0.0,
            60.0,
        );
        d.dispatch(&mut event, Phase::Activated, &mut net, &mut trains, 0.0);
        assert_eq!(net.rail(RailId(0)).speed_limit_kmh(), 60.0);
        assert_eq!(event.original_limits, vec![(RailId(0), before)]);

        d.dispatch(&mut event, Phase::Expired, &mut net, &mut trains, 60.0);
        assert_eq!(net.rail(RailId(0)).speed_limit_kmh(), before);
    }

    #[test]
    fn test_signal_failure_forces_running_train() {
        let (mut net, mut trains) = setup();
        let d = dispatcher(&net, &trains);
        trains[0].set_state(TrainState::Accelerating);
        trains[0].velocity_ms = 20.0;
        trains[0].position_m = 2000.0;

        let b = net.node_by_name("B").unwrap();
        let mut event = Event::new(
            EventId(2),
            EventKind::SignalFailure {
                node: b,
                stop_duration_s: 180.0,
            },
            0.0,
            600.0,
        );
        let outcome = d.dispatch(&mut event, Phase::Activated, &mut net, &mut trains, 10.0);
        assert_eq!(outcome.forced_stops, vec![TrainId(0)]);
        assert!(net.node(b).has_signal_failure());
        assert!(trains[0].is_held(100.0));

        d.dispatch(&mut event, Phase::Expired, &mut net, &mut trains, 600.0);
        assert!(!net.node(b).has_signal_failure());
    }

    #[test]
    fn test_signal_failure_holds_idle_train_at_node() {
        let (mut net, mut trains) = setup();
        let d = dispatcher(&net, &trains);
        let a = net.node_by_name("A").unwrap();
        let mut event = Event::new(
            EventId(3),
            EventKind::SignalFailure {
                node: a,
                stop_duration_s: 180.0,
            },
            0.0,
            600.0,
        );
        let outcome = d.dispatch(&mut event, Phase::Activated, &mut net, &mut trains, 0.0);
        assert!(outcome.forced_stops.is_empty());
        assert_eq!(trains[0].hold_remaining(0.0), 180.0);
    }

    #[test]
    fn test_enforce_catches_train_that_departs_later() {
        let (mut net, mut trains) = setup();
        let d = dispatcher(&net, &trains);
        let b = net.node_by_name("B").unwrap();
        let mut event = Event::new(
            EventId(6),
            EventKind::SignalFailure {
                node: b,
                stop_duration_s: 180.0,
            },
            0.0,
            3600.0,
        );

        // Idle at A when the failure starts: not affected yet
        let outcome = d.dispatch(&mut event, Phase::Activated, &mut net, &mut trains, 0.0);
        assert!(outcome.forced_stops.is_empty());
        assert!(!trains[0].is_held(0.0));

        trains[0].set_state(TrainState::Accelerating);
        trains[0].velocity_ms = 5.0;
        let outcome = d.enforce(&event, &net, &mut trains, 30.0);
        assert_eq!(outcome.forced_stops, vec![TrainId(0)]);
        assert_eq!(trains[0].hold_remaining(30.0), 180.0);

        // A running hold is left alone
        let outcome = d.enforce(&event, &net, &mut trains, 60.0);
        assert!(outcome.forced_stops.is_empty());
        assert_eq!(trains[0].hold_remaining(60.0), 150.0);
    }

    #[test]
    fn test_train_effects_switch() {
        let (mut net, mut trains) = setup();
        let mut d = dispatcher(&net, &trains);
        d.set_train_effects(false);
        let a = net.node_by_name("A").unwrap();
        let mut event = Event::new(
            EventId(4),
            EventKind::SignalFailure {
                node: a,
                stop_duration_s: 180.0,
            },
            0.0,
            600.0,
        );
        d.dispatch(&mut event, Phase::Activated, &mut net, &mut trains, 0.0);
        assert!(net.node(a).has_signal_failure());
        assert!(!trains[0].is_held(0.0));
    }

    #[test]
    fn test_station_delay_extends_dwell() {
        let (mut net, mut trains) = setup();
        let d = dispatcher(&net, &trains);
        trains[0].set_state(TrainState::Stopped {
            dwell_remaining_s: 30.0,
        });
        let a = net.node_by_name("A").unwrap();
        let mut event = Event::new(
            EventId(5),
            EventKind::StationDelay {
                node: a,
                extra_dwell_s: 120.0,
            },
            0.0,
            600.0,
        );
        let outcome = d.dispatch(&mut event, Phase::Activated, &mut net, &mut trains, 0.0);
        assert_eq!(outcome.delayed, vec![TrainId(0)]);
        assert_eq!(
            trains[0].state,
            TrainState::Stopped {
                dwell_remaining_s: 150.0
            }
        );
        assert_eq!(net.node(a).extra_dwell_s, 120.0);

        d.dispatch(&mut event, Phase::Expired, &mut net, &mut trains, 600.0);
        assert_eq!(net.node(a).extra_dwell_s, 0.0);
    }
}
