//! Traffic controller: the single authority over rail access
//!
//! A train may only begin or resume occupying a rail after a GRANT from
//! here. Decisions read the occupancy projection refreshed at the start of
//! the tick plus the claims made earlier in the same tick, so two trains
//! cannot both be admitted onto an empty rail in one tick.

use crate::core::config::SimulationConfig;
use crate::core::types::{PathSegment, TrainId};
use crate::network::graph::Network;
use crate::safety::risk::find_train;
use crate::train::entity::Train;

/// Admission control outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Grant,
    Deny,
}

impl AccessDecision {
    pub fn is_grant(self) -> bool {
        self == Self::Grant
    }
}

/// A rail taken during the current tick, not yet in the occupancy projection
#[derive(Debug, Clone, Copy, PartialEq)]
struct Claim {
    train: TrainId,
    segment: PathSegment,
}

/// Occupant blocking a request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conflict {
    pub occupant: TrainId,
    /// Occupant position minus requester position (m)
    pub gap_m: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TrafficController {
    min_clearance_m: f64,
    safe_time_headway_s: f64,
    claims: Vec<Claim>,
}

impl TrafficController {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            min_clearance_m: config.min_clearance_m,
            safe_time_headway_s: config.safe_time_headway_s,
            claims: Vec::new(),
        }
    }

    /// Forget the claims of the previous tick
    pub fn begin_tick(&mut self) {
        self.claims.clear();
    }

    /// Record that `train` was admitted onto `segment` this tick
    pub fn claim(&mut self, train: TrainId, segment: PathSegment) {
        self.claims.push(Claim { train, segment });
    }

    /// Nearest same-direction occupant at or ahead of the requester
    pub fn find_conflict(
        &self,
        train: &Train,
        segment: PathSegment,
        trains: &[Train],
        network: &Network,
    ) -> Option<Conflict> {
        let rail = network.try_rail(segment.rail)?;
        let own_position = if train.current_segment() == Some(segment) && train.holds_rail {
            train.position_m
        } else {
            0.0
        };

        let occupied = rail
            .occupants
            .iter()
            .filter_map(|&id| find_train(trains, id))
            .filter(|o| o.id != train.id && !o.finished && o.current_segment() == Some(segment))
            .map(|o| (o.id, o.position_m));
        // Claimed this tick: the claimant is standing at the rail start
        let claimed = self
            .claims
            .iter()
            .filter(|c| c.train != train.id && c.segment == segment)
            .map(|c| (c.train, 0.0));

        occupied
            .chain(claimed)
            .map(|(occupant, position)| Conflict {
                occupant,
                gap_m: position - own_position,
            })
            .filter(|c| c.gap_m >= 0.0)
            .fold(None::<Conflict>, |best, c| match best {
                Some(b) if (b.gap_m, b.occupant) <= (c.gap_m, c.occupant) => Some(b),
                _ => Some(c),
            })
    }

    /// Decide whether `train` may occupy `segment`
    ///
    /// GRANT when nothing conflicts, when the gap to the conflicting train
    /// covers clearance plus headway at the requester's speed, or when the
    /// requester outranks the occupant. DENY otherwise.
    pub fn request_rail_access(
        &self,
        train: &Train,
        segment: PathSegment,
        trains: &[Train],
        network: &Network,
    ) -> AccessDecision {
        let Some(conflict) = self.find_conflict(train, segment, trains, network) else {
            return AccessDecision::Grant;
        };

        let required = self.min_clearance_m + train.velocity_ms * self.safe_time_headway_s;
        if conflict.gap_m >= required {
            return AccessDecision::Grant;
        }

        match find_train(trains, conflict.occupant) {
            Some(occupant) if train.outranks(occupant) => AccessDecision::Grant,
            Some(_) => AccessDecision::Deny,
            // Claimant vanished; nothing left to conflict with
            None => AccessDecision::Grant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::graph::NodeKind;
    use crate::train::entity::TrainSpec;
    use crate::train::state::TrainState;

    fn setup(departures: &[f64]) -> (Network, Vec<Train>) {
        let mut net = Network::new();
        let a = net.add_node("A", NodeKind::Station).unwrap();
        let b = net.add_node("B", NodeKind::Station).unwrap();
        net.add_rail(a, b, 10.0, 120.0).unwrap();

        let trains = departures
            .iter()
            .enumerate()
            .map(|(i, &dep)| {
                let spec = TrainSpec {
                    name: format!("T{}", i),
                    mass_tons: 100.0,
                    friction_coef: 0.0,
                    max_accel_kn: 100.0,
                    max_brake_kn: 100.0,
                    departure: "A".into(),
                    departure_time: dep,
                    arrival: "B".into(),
                    stop_duration_s: 0.0,
                };
                Train::new(TrainId(i as u32), &spec, &net).unwrap()
            })
            .collect();
        (net, trains)
    }

    fn occupy(net: &mut Network, trains: &[Train]) {
        net.set_occupancy(
            trains
                .iter()
                .filter(|t| t.holds_rail)
                .filter_map(|t| t.current_segment().map(|s| (t.id, s.rail))),
        );
    }

    #[test]
    fn test_free_rail_granted() {
        let (net, trains) = setup(&[0.0]);
        let tc = TrafficController::new(&SimulationConfig::default());
        let seg = trains[0].current_segment().unwrap();
        assert_eq!(
            tc.request_rail_access(&trains[0], seg, &trains, &net),
            AccessDecision::Grant
        );
    }

    #[test]
    fn test_close_occupant_denies_lower_priority() {
        let (mut net, mut trains) = setup(&[0.0, 60.0]);
        trains[0].set_state(TrainState::Accelerating);
        trains[0].position_m = 100.0;
        occupy(&mut net, &trains);

        let tc = TrafficController::new(&SimulationConfig::default());
        let seg = trains[1].current_segment().unwrap();
        assert_eq!(
            tc.request_rail_access(&trains[1], seg, &trains, &net),
            AccessDecision::Deny
        );
    }

    #[test]
    fn test_sufficient_gap_granted() {
        let (mut net, mut trains) = setup(&[0.0, 60.0]);
        trains[0].set_state(TrainState::Accelerating);
        trains[0].position_m = 900.0;
        occupy(&mut net, &trains);

        let tc = TrafficController::new(&SimulationConfig::default());
        let seg = trains[1].current_segment().unwrap();
        assert!(tc
            .request_rail_access(&trains[1], seg, &trains, &net)
            .is_grant());
    }

    #[test]
    fn test_higher_priority_wins_conflict() {
        let (mut net, mut trains) = setup(&[120.0, 60.0]);
        trains[0].set_state(TrainState::Accelerating);
        trains[0].position_m = 100.0;
        occupy(&mut net, &trains);

        let tc = TrafficController::new(&SimulationConfig::default());
        let seg = trains[1].current_segment().unwrap();
        assert!(tc
            .request_rail_access(&trains[1], seg, &trains, &net)
            .is_grant());
    }

    #[test]
    fn test_claim_blocks_second_admission() {
        let (net, trains) = setup(&[0.0, 0.0]);
        let mut tc = TrafficController::new(&SimulationConfig::default());
        let seg = trains[0].current_segment().unwrap();

        assert!(tc.request_rail_access(&trains[0], seg, &trains, &net).is_grant());
        tc.claim(trains[0].id, seg);
        assert_eq!(
            tc.request_rail_access(&trains[1], seg, &trains, &net),
            AccessDecision::Deny
        );

        tc.begin_tick();
        assert!(tc.request_rail_access(&trains[1], seg, &trains, &net).is_grant());
    }

    #[test]
    fn test_decision_is_repeatable() {
        let (mut net, mut trains) = setup(&[0.0, 30.0, 30.0]);
        trains[0].set_state(TrainState::Accelerating);
        trains[0].position_m = 300.0;
        occupy(&mut net, &trains);

        let tc = TrafficController::new(&SimulationConfig::default());
        for t in &trains[1..] {
            let seg = t.current_segment().unwrap();
            let first = tc.request_rail_access(t, seg, &trains, &net);
            let second = tc.request_rail_access(t, seg, &trains, &net);
            assert_eq!(first, second);
        }
    }
}
