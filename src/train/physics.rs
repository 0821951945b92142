//! Longitudinal train physics
//!
//! Stateless force and kinematics functions. Everything is SI: kg, N, m,
//! m/s, s. Conversions from definition-file units go through `core::units`.

use crate::core::units::{kn_to_n, tons_to_kg, GRAVITY};
use crate::train::entity::Train;

pub fn mass_kg(train: &Train) -> f64 {
    tons_to_kg(train.mass_tons)
}

/// Rolling resistance (N)
pub fn friction_force(train: &Train) -> f64 {
    train.friction_coef * mass_kg(train) * GRAVITY
}

/// Applied force minus rolling resistance (N)
pub fn net_force(train: &Train, applied_n: f64) -> f64 {
    applied_n - friction_force(train)
}

/// Full traction force (N)
pub fn max_traction(train: &Train) -> f64 {
    kn_to_n(train.max_accel_kn)
}

/// Full brake force (N)
pub fn max_brake(train: &Train) -> f64 {
    kn_to_n(train.max_brake_kn)
}

/// Deceleration under full brake, friction assisting (m/s²)
pub fn braking_deceleration(train: &Train) -> f64 {
    (max_brake(train) + friction_force(train)) / mass_kg(train)
}

/// Distance to stop from `velocity` at constant `deceleration` (m)
pub fn braking_distance(velocity: f64, deceleration: f64) -> f64 {
    if velocity <= 0.0 || deceleration <= 0.0 {
        return 0.0;
    }
    velocity * velocity / (2.0 * deceleration)
}

/// Braking distance of the train at its current speed (m)
pub fn train_braking_distance(train: &Train) -> f64 {
    braking_distance(train.velocity_ms, braking_deceleration(train))
}

/// One explicit step of `v' = v + (F/m)·dt`, clamped at zero
pub fn integrate_velocity(velocity: f64, force_n: f64, mass_kg: f64, dt: f64) -> f64 {
    (velocity + force_n / mass_kg * dt).max(0.0)
}

pub fn integrate_position(position: f64, velocity: f64, dt: f64) -> f64 {
    position + velocity * dt
}

/// Force that decelerates the train at full brake (N, negative)
pub fn full_brake_force(train: &Train) -> f64 {
    -(max_brake(train) + friction_force(train))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TrainId;
    use crate::network::graph::{Network, NodeKind};
    use crate::train::entity::TrainSpec;

    fn train(mass_tons: f64, friction: f64, brake_kn: f64) -> Train {
        let mut net = Network::new();
        let a = net.add_node("A", NodeKind::Station).unwrap();
        let b = net.add_node("B", NodeKind::Station).unwrap();
        net.add_rail(a, b, 1.0, 100.0).unwrap();
        let spec = TrainSpec {
            name: "T".into(),
            mass_tons,
            friction_coef: friction,
            max_accel_kn: 200.0,
            max_brake_kn: brake_kn,
            departure: "A".into(),
            departure_time: 0.0,
            arrival: "B".into(),
            stop_duration_s: 0.0,
        };
        Train::new(TrainId(0), &spec, &net).unwrap()
    }

    #[test]
    fn test_friction_force() {
        let t = train(100.0, 0.01, 100.0);
        assert!((friction_force(&t) - 0.01 * 100_000.0 * GRAVITY).abs() < 1e-9);
    }

    #[test]
    fn test_braking_deceleration_includes_friction() {
        let t = train(100.0, 0.0, 100.0);
        assert!((braking_deceleration(&t) - 1.0).abs() < 1e-12);
        let t = train(100.0, 0.01, 100.0);
        assert!(braking_deceleration(&t) > 1.0);
    }

    #[test]
    fn test_braking_distance_at_rest_is_zero() {
        assert_eq!(braking_distance(0.0, 1.0), 0.0);
        assert_eq!(braking_distance(20.0, 1.0), 200.0);
    }

    #[test]
    fn test_velocity_never_negative() {
        assert_eq!(integrate_velocity(1.0, -1_000_000.0, 1000.0, 1.0), 0.0);
    }

    #[test]
    fn test_friction_alone_cannot_start_train() {
        let t = train(100.0, 0.01, 100.0);
        let v = integrate_velocity(0.0, net_force(&t, 0.0), mass_kg(&t), 1.0);
        assert_eq!(v, 0.0);
    }
}
