//! Property tests for train kinematics

use proptest::prelude::*;

use railsim::core::config::SimulationConfig;
use railsim::core::types::TrainId;
use railsim::network::graph::{Network, NodeKind};
use railsim::safety::RiskData;
use railsim::train::physics::{braking_distance, integrate_velocity};
use railsim::train::{Train, TrainSpec, TrainState, UpdateContext};

fn line(length_km: f64, limit_kmh: f64) -> Network {
    let mut net = Network::new();
    let a = net.add_node("A", NodeKind::Station).unwrap();
    let b = net.add_node("B", NodeKind::Station).unwrap();
    net.add_rail(a, b, length_km, limit_kmh).unwrap();
    net
}

fn train(net: &Network, mass_tons: f64, accel_kn: f64, brake_kn: f64) -> Train {
    let spec = TrainSpec {
        name: "P".into(),
        mass_tons,
        friction_coef: 0.002,
        max_accel_kn: accel_kn,
        max_brake_kn: brake_kn,
        departure: "A".into(),
        departure_time: 0.0,
        arrival: "B".into(),
        stop_duration_s: 0.0,
    };
    Train::new(TrainId(0), &spec, net).unwrap()
}

proptest! {
    #[test]
    fn test_velocity_never_negative(
        v in 0.0f64..100.0,
        force in -1.0e7f64..1.0e7,
        mass in 1.0e3f64..1.0e7,
        dt in 0.1f64..10.0,
    ) {
        prop_assert!(integrate_velocity(v, force, mass, dt) >= 0.0);
    }

    #[test]
    fn test_braking_distance_grows_with_speed(
        v in 0.0f64..100.0,
        dv in 0.0f64..50.0,
        decel in 0.05f64..5.0,
    ) {
        prop_assert!(braking_distance(v + dv, decel) >= braking_distance(v, decel));
    }

    #[test]
    fn test_accelerating_respects_limit_and_rail_end(
        mass in 50.0f64..3000.0,
        accel in 50.0f64..500.0,
        limit in 20.0f64..200.0,
        length in 0.5f64..5.0,
        ticks in 1usize..400,
    ) {
        let net = line(length, limit);
        let mut t = train(&net, mass, accel, 300.0);
        t.set_state(TrainState::Accelerating);

        let config = SimulationConfig::default();
        let risk = RiskData::clear();
        let ctx = UpdateContext { network: &net, risk: &risk, config: &config };
        let limit_ms = net.rails()[0].speed_limit_ms();
        let rail_m = net.rails()[0].length_m();

        let mut last = 0.0;
        for _ in 0..ticks {
            t.state = TrainState::Accelerating.update(&mut t, &ctx);
            prop_assert!(t.velocity_ms >= 0.0);
            prop_assert!(t.velocity_ms <= limit_ms + 1e-9);
            prop_assert!(t.position_m >= last);
            prop_assert!(t.position_m <= rail_m);
            last = t.position_m;
        }
    }

    #[test]
    fn test_emergency_brakes_to_standstill(
        mass in 50.0f64..3000.0,
        brake in 50.0f64..800.0,
        v0 in 0.0f64..40.0,
    ) {
        let net = line(100.0, 300.0);
        let mut t = train(&net, mass, 200.0, brake);
        t.set_state(TrainState::Accelerating);
        t.velocity_ms = v0;

        let config = SimulationConfig::default();
        let risk = RiskData::clear();
        let ctx = UpdateContext { network: &net, risk: &risk, config: &config };

        let mut previous = v0;
        let mut steps = 0;
        while t.velocity_ms > 0.0 {
            TrainState::Emergency.update(&mut t, &ctx);
            prop_assert!(t.velocity_ms <= previous);
            previous = t.velocity_ms;
            steps += 1;
            prop_assert!(steps < 100_000);
        }
        prop_assert_eq!(t.velocity_ms, 0.0);
    }
}
