//! Simulation integration tests

use railsim::command::Command;
use railsim::core::config::{EventConfig, SimulationConfig};
use railsim::core::types::TrainId;
use railsim::events::EventKind;
use railsim::network::graph::{Network, NodeKind};
use railsim::simulation::Simulation;
use railsim::train::entity::{Train, TrainSpec};
use railsim::train::state::TrainState;

fn quiet_config() -> SimulationConfig {
    SimulationConfig {
        events: EventConfig::disabled(),
        report_interval_s: 0.0,
        ..SimulationConfig::default()
    }
}

fn spec(name: &str, from: &str, to: &str, departure_time: f64) -> TrainSpec {
    TrainSpec {
        name: name.into(),
        mass_tons: 200.0,
        friction_coef: 0.001,
        max_accel_kn: 200.0,
        max_brake_kn: 300.0,
        departure: from.into(),
        departure_time,
        arrival: to.into(),
        stop_duration_s: 30.0,
    }
}

/// A single 20 km rail from A to B
fn single_rail() -> Network {
    let mut net = Network::new();
    let a = net.add_node("A", NodeKind::Station).unwrap();
    let b = net.add_node("B", NodeKind::Station).unwrap();
    net.add_rail(a, b, 20.0, 72.0).unwrap();
    net
}

fn build(config: SimulationConfig, net: Network, specs: &[TrainSpec]) -> Simulation {
    let trains = specs
        .iter()
        .enumerate()
        .map(|(i, s)| Train::new(TrainId(i as u32), s, &net).unwrap())
        .collect();
    Simulation::new(config, net, trains).with_recording(true)
}

#[test]
fn test_follower_waits_instead_of_colliding() {
    // Slow heavy leader, nimble follower one minute behind
    let mut leader = spec("CARGO", "A", "B", 0.0);
    leader.mass_tons = 2000.0;
    leader.max_accel_kn = 100.0;
    let follower = spec("IC", "A", "B", 60.0);

    let mut sim = build(quiet_config(), single_rail(), &[leader, follower]);

    let mut waited = false;
    for _ in 0..900 {
        sim.step();
        let (lead, follow) = (&sim.trains[0], &sim.trains[1]);
        if follow.state == TrainState::Waiting {
            waited = true;
        }
        if lead.holds_rail && follow.holds_rail && !lead.finished {
            assert!(
                follow.position_m < lead.position_m,
                "follower at {} overtook leader at {}",
                follow.position_m,
                lead.position_m
            );
        }
    }

    assert!(waited, "follower never reached Waiting");
    assert!(sim.log.state_changes().any(|c| matches!(
        c,
        Command::StateChange { train, to, .. } if train == "IC" && to == "Waiting"
    )));
}

#[test]
fn test_past_due_departure_leaves_next_tick() {
    let config = SimulationConfig {
        start_time: 8.0 * 3600.0,
        ..quiet_config()
    };
    let mut sim = build(config, single_rail(), &[spec("IC", "A", "B", 7.0 * 3600.0)]);

    sim.step();

    assert_eq!(sim.trains[0].state, TrainState::Accelerating);
    assert!(sim.trains[0].holds_rail);
    assert_eq!(
        sim.log.commands().first(),
        Some(&Command::Departure {
            t: 8.0 * 3600.0,
            train: "IC".into()
        })
    );
}

#[test]
fn test_signal_failure_forces_emergency_within_a_tick() {
    let mut sim = build(quiet_config(), single_rail(), &[spec("IC", "A", "B", 0.0)]);
    sim.run_until(30.0);
    assert!(sim.trains[0].velocity_ms > 0.0);

    let b = sim.network.node_by_name("B").unwrap();
    let start = sim.now() + sim.config.tick_seconds;
    sim.scheduler.schedule(
        EventKind::SignalFailure {
            node: b,
            stop_duration_s: 120.0,
        },
        start,
        600.0,
    );

    sim.step();

    let train = &sim.trains[0];
    assert_eq!(train.state, TrainState::Emergency);
    assert!(train.is_held(sim.now()));
    assert!(sim.network.node(b).has_signal_failure());

    // Full brake until standstill, then the hold keeps it stopped
    sim.run_until(start + 90.0);
    let train = &sim.trains[0];
    assert_eq!(train.velocity_ms, 0.0);
    assert!(matches!(train.state, TrainState::Stopped { .. }));
}

/// A to B through junction J, 2 km per rail
fn through_junction() -> Network {
    let mut net = Network::new();
    let a = net.add_node("A", NodeKind::Station).unwrap();
    let j = net.add_node("J", NodeKind::Junction).unwrap();
    let b = net.add_node("B", NodeKind::Station).unwrap();
    net.add_rail(a, j, 2.0, 72.0).unwrap();
    net.add_rail(j, b, 2.0, 72.0).unwrap();
    net
}

fn fail_junction(sim: &mut Simulation, start: f64) {
    let j = sim.network.node_by_name("J").unwrap();
    sim.scheduler.schedule(
        EventKind::SignalFailure {
            node: j,
            stop_duration_s: 180.0,
        },
        start,
        3600.0 - start,
    );
}

#[test]
fn test_no_departure_toward_failed_signal() {
    let mut sim = build(quiet_config(), through_junction(), &[spec("IC", "A", "B", 30.0)]);
    fail_junction(&mut sim, 0.0);

    while sim.now() < 3600.0 {
        sim.step();
        let train = &sim.trains[0];
        assert_eq!(train.state, TrainState::Idle, "left A at {}", sim.now());
        assert_eq!(train.cursor, 0);
    }

    sim.run_until(3.0 * 3600.0);
    assert!(sim.trains[0].finished);
}

#[test]
fn test_failed_signal_holds_train_past_its_stop_duration() {
    let mut sim = build(quiet_config(), through_junction(), &[spec("IC", "A", "B", 30.0)]);
    fail_junction(&mut sim, 40.0);

    let mut emergency = false;
    while sim.now() < 3600.0 {
        sim.step();
        let train = &sim.trains[0];
        assert_eq!(train.cursor, 0, "passed J at {}", sim.now());
        emergency |= train.state == TrainState::Emergency;
    }
    assert!(emergency);

    // Still standing long after the 180 s hold ran out
    let train = &sim.trains[0];
    assert!(train.holds_rail);
    assert_eq!(train.velocity_ms, 0.0);
    assert!(train.position_m < 2000.0);

    sim.run_until(3.0 * 3600.0);
    assert!(sim.trains[0].finished);
}

#[test]
fn test_held_train_does_not_depart() {
    let mut sim = build(quiet_config(), single_rail(), &[spec("IC", "A", "B", 60.0)]);
    let a = sim.network.node_by_name("A").unwrap();
    sim.scheduler.schedule(
        EventKind::SignalFailure {
            node: a,
            stop_duration_s: 300.0,
        },
        10.0,
        120.0,
    );

    sim.run_until(200.0);
    assert_eq!(sim.trains[0].state, TrainState::Idle);

    sim.run_until(400.0);
    assert_ne!(sim.trains[0].state, TrainState::Idle);
    assert!(sim.trains[0].holds_rail);
}

#[test]
fn test_overlapping_restrictions_restore_exactly() {
    let mut net = Network::new();
    let a = net.add_node("A", NodeKind::Station).unwrap();
    let b = net.add_node("B", NodeKind::Station).unwrap();
    let c = net.add_node("C", NodeKind::Station).unwrap();
    let ab = net.add_rail(a, b, 10.0, 120.0).unwrap();
    net.add_rail(b, c, 10.0, 90.0).unwrap();
    let region = net.nodes_within(b, 1);

    // A late train keeps the run going
    let mut sim = build(quiet_config(), net, &[spec("LATE", "A", "C", 10_000.0)]);
    sim.scheduler.schedule(
        EventKind::TrackMaintenance {
            rail: ab,
            speed_factor: 0.5,
        },
        10.0,
        100.0,
    );
    sim.scheduler.schedule(
        EventKind::Weather {
            center: b,
            radius_hops: 1,
            speed_factor: 0.8,
            region,
        },
        50.0,
        200.0,
    );

    sim.run_until(60.0);
    let limit = sim.network.rail(ab).speed_limit_kmh();
    assert!((limit - 120.0 * 0.5 * 0.8).abs() < 1e-9);

    // Maintenance ends first; weather alone remains
    sim.run_until(120.0);
    let limit = sim.network.rail(ab).speed_limit_kmh();
    assert!((limit - 120.0 * 0.8).abs() < 1e-9);

    sim.run_until(300.0);
    for rail in sim.network.rails() {
        assert!(!rail.is_restricted());
        assert_eq!(rail.speed_limit_kmh(), rail.nominal_speed_kmh());
    }
    assert!(sim.scheduler.active().is_empty());
}

#[test]
fn test_same_seed_same_log() {
    let run = || {
        let mut net = Network::new();
        let a = net.add_node("A", NodeKind::Station).unwrap();
        let b = net.add_node("B", NodeKind::Station).unwrap();
        let j = net.add_node("J", NodeKind::Junction).unwrap();
        let c = net.add_node("C", NodeKind::Station).unwrap();
        net.add_rail(a, b, 8.0, 120.0).unwrap();
        net.add_rail(b, j, 3.0, 80.0).unwrap();
        net.add_rail(j, c, 12.0, 140.0).unwrap();

        let config = SimulationConfig {
            seed: 7,
            report_interval_s: 0.0,
            events: EventConfig {
                station_delay_probability: 0.2,
                maintenance_probability: 0.1,
                signal_failure_probability: 0.05,
                weather_probability: 0.05,
                ..EventConfig::default()
            },
            ..SimulationConfig::default()
        };
        let mut sim = build(
            config,
            net,
            &[
                spec("IC1", "A", "C", 0.0),
                spec("IC2", "A", "C", 120.0),
                spec("IC3", "C", "A", 60.0),
            ],
        );
        sim.run_until(3.0 * 3600.0);
        sim.log.commands().to_vec()
    };

    let first = run();
    let second = run();
    assert!(first.iter().any(|c| matches!(c, Command::Event { .. })));
    assert_eq!(first, second);
}

#[test]
fn test_every_train_finishes_on_quiet_network() {
    let mut net = Network::new();
    let a = net.add_node("A", NodeKind::Station).unwrap();
    let b = net.add_node("B", NodeKind::Station).unwrap();
    let c = net.add_node("C", NodeKind::Station).unwrap();
    net.add_rail(a, b, 5.0, 100.0).unwrap();
    net.add_rail(b, c, 5.0, 100.0).unwrap();

    let mut sim = build(
        quiet_config(),
        net,
        &[
            spec("T1", "A", "C", 0.0),
            spec("T2", "C", "A", 0.0),
            spec("T3", "A", "C", 60.0),
        ],
    );
    sim.run_until(4.0 * 3600.0);

    assert!(sim.is_done());
    assert_eq!(sim.finished_trains(), 3);
    for train in &sim.trains {
        assert_eq!(train.trips_completed, 1);
        assert!(!train.holds_rail);
    }
}
