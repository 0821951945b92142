//! Train behavioral state machine
//!
//! Seven states, each with an update rule (what the train does this tick)
//! and a transition rule (where it goes next). Transitions are evaluated in
//! a fixed precedence:
//!
//! 1. emergency zone: gap <= braking distance overrides everything
//! 2. leader yield: the traffic controller denies the rail and the leader
//!    is stopped or closer than the safe distance
//! 3. state-specific progress (speed reached, rail end, dwell expired)
//!
//! Staying put is an explicit `Transition::Remain`, never an error.

use serde::{Deserialize, Serialize};

use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::SimTime;
use crate::network::graph::Network;
use crate::safety::risk::RiskData;
use crate::safety::traffic::{AccessDecision, TrafficController};
use crate::train::entity::Train;
use crate::train::physics::{
    full_brake_force, integrate_position, integrate_velocity, mass_kg, max_traction, net_force,
};

/// Behavioral state of a train
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrainState {
    /// Waiting for its departure time at the origin
    Idle,
    Accelerating,
    Cruising,
    Braking,
    /// Standing still for a dwell period
    Stopped { dwell_remaining_s: SimTime },
    /// Standing still until the traffic controller grants the rail
    Waiting,
    /// Full brake regardless of schedule
    Emergency,
}

/// Result of evaluating a transition rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Remain,
    To(TrainState),
}

pub const STATE_NAMES: [&str; 7] = [
    "Idle",
    "Accelerating",
    "Cruising",
    "Braking",
    "Stopped",
    "Waiting",
    "Emergency",
];

impl TrainState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Accelerating => "Accelerating",
            Self::Cruising => "Cruising",
            Self::Braking => "Braking",
            Self::Stopped { .. } => "Stopped",
            Self::Waiting => "Waiting",
            Self::Emergency => "Emergency",
        }
    }

    /// Rebuild a state from its logged name
    ///
    /// `dwell_s` seeds the timer when the name is `Stopped`.
    pub fn from_name(name: &str, dwell_s: SimTime) -> Result<Self> {
        Ok(match name {
            "Idle" => Self::Idle,
            "Accelerating" => Self::Accelerating,
            "Cruising" => Self::Cruising,
            "Braking" => Self::Braking,
            "Stopped" => Self::Stopped {
                dwell_remaining_s: dwell_s,
            },
            "Waiting" => Self::Waiting,
            "Emergency" => Self::Emergency,
            other => return Err(SimError::UnknownState(other.to_string())),
        })
    }

    /// States that hold the train at standstill
    pub fn pins_velocity(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped { .. } | Self::Waiting)
    }

    /// States in which the train may be moving along its rail
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Self::Accelerating | Self::Cruising | Self::Braking | Self::Emergency
        )
    }

    /// Same state kind, ignoring timers
    pub fn same_kind(&self, other: &TrainState) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Evaluate this state's transition rule for `train`
    pub fn transition(&self, train: &Train, ctx: &StateContext) -> Transition {
        match self {
            // Departure is the orchestrator's call, never a self-transition
            Self::Idle => Transition::Remain,

            Self::Accelerating => {
                if in_emergency_zone(train, ctx) {
                    return Transition::To(Self::Emergency);
                }
                if must_yield(train, ctx) {
                    return Transition::To(Self::Braking);
                }
                if approaching_rail_end(train, ctx) {
                    return Transition::To(Self::Braking);
                }
                let limit = ctx.risk.speed_limit_ms;
                if limit > 0.0 && train.velocity_ms >= ctx.config.cruise_entry_ratio * limit {
                    return Transition::To(Self::Cruising);
                }
                Transition::Remain
            }

            Self::Cruising => {
                if in_emergency_zone(train, ctx) {
                    return Transition::To(Self::Emergency);
                }
                if must_yield(train, ctx) || approaching_rail_end(train, ctx) {
                    return Transition::To(Self::Braking);
                }
                Transition::Remain
            }

            Self::Braking => {
                if in_emergency_zone(train, ctx) {
                    return Transition::To(Self::Emergency);
                }
                // Stopped short of the rail end: something ahead holds us up
                if is_standstill(train, ctx)
                    && train.remaining_on_rail_m(ctx.network) > ctx.config.arrival_tolerance_m
                {
                    return Transition::To(Self::Waiting);
                }
                Transition::Remain
            }

            Self::Stopped { dwell_remaining_s } => {
                if *dwell_remaining_s > 0.0
                    || train.is_held(ctx.now)
                    || train.signal_blocked(ctx.network)
                {
                    return Transition::Remain;
                }
                match ctx.request_current_rail(train) {
                    Some(AccessDecision::Grant) => Transition::To(Self::Accelerating),
                    Some(AccessDecision::Deny) => Transition::To(Self::Waiting),
                    None => Transition::Remain,
                }
            }

            Self::Waiting => {
                if train.is_held(ctx.now) || train.signal_blocked(ctx.network) {
                    return Transition::Remain;
                }
                match ctx.request_current_rail(train) {
                    Some(AccessDecision::Grant) => Transition::To(Self::Accelerating),
                    _ => Transition::Remain,
                }
            }

            Self::Emergency => {
                if is_standstill(train, ctx) {
                    return Transition::To(Self::Stopped {
                        dwell_remaining_s: train.hold_remaining(ctx.now),
                    });
                }
                if train.is_held(ctx.now) {
                    return Transition::Remain;
                }
                let risk = ctx.risk;
                let clear = !risk.has_leader()
                    || (risk.time_to_collision() > ctx.config.emergency_exit_ttc_s
                        && risk.gap_m > risk.safe_distance_m);
                if clear {
                    return Transition::To(Self::Waiting);
                }
                Transition::Remain
            }
        }
    }

    /// Apply this state's update rule to `train` for one tick
    pub fn update(&self, train: &mut Train, ctx: &UpdateContext) -> TrainState {
        let dt = ctx.config.tick_seconds;
        let mass = mass_kg(train);
        let limit = ctx.speed_limit_ms(train);

        let (next_state, velocity) = match *self {
            Self::Idle | Self::Waiting => (*self, 0.0),

            Self::Stopped { dwell_remaining_s } => (
                Self::Stopped {
                    dwell_remaining_s: (dwell_remaining_s - dt).max(0.0),
                },
                0.0,
            ),

            Self::Accelerating => {
                let force = net_force(train, max_traction(train));
                let v = integrate_velocity(train.velocity_ms, force, mass, dt);
                (*self, v.min(limit))
            }

            Self::Cruising => {
                let v = train.velocity_ms;
                let next = if v <= limit {
                    let applied = max_traction(train) * ctx.config.cruise_correction_ratio;
                    integrate_velocity(v, net_force(train, applied), mass, dt).min(limit)
                } else {
                    integrate_velocity(v, full_brake_force(train), mass, dt).max(limit)
                };
                (*self, next)
            }

            Self::Braking => {
                let mut v = integrate_velocity(train.velocity_ms, full_brake_force(train), mass, dt);
                // Nothing ahead: roll the last metres to the rail end
                let remaining = train.remaining_on_rail_m(ctx.network);
                if !ctx.risk.has_leader() && remaining > ctx.config.arrival_tolerance_m {
                    v = v.max(ctx.config.creep_speed_ms.min(limit));
                }
                (*self, v)
            }

            Self::Emergency => (
                *self,
                integrate_velocity(train.velocity_ms, full_brake_force(train), mass, dt),
            ),
        };

        train.velocity_ms = velocity;
        if velocity > 0.0 {
            let length = train.current_rail_length_m(ctx.network);
            train.position_m = integrate_position(train.position_m, velocity, dt).min(length);
        }
        next_state
    }
}

impl std::fmt::Display for TrainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a state may consult while deciding its transition
pub struct StateContext<'a> {
    pub network: &'a Network,
    pub trains: &'a [Train],
    pub risk: &'a RiskData,
    pub traffic: &'a TrafficController,
    pub config: &'a SimulationConfig,
    pub now: SimTime,
}

impl StateContext<'_> {
    /// Ask the traffic controller for the rail at the route cursor
    pub fn request_current_rail(&self, train: &Train) -> Option<AccessDecision> {
        let segment = train.current_segment()?;
        Some(
            self.traffic
                .request_rail_access(train, segment, self.trains, self.network),
        )
    }
}

/// What a state may consult while updating physics
pub struct UpdateContext<'a> {
    pub network: &'a Network,
    pub risk: &'a RiskData,
    pub config: &'a SimulationConfig,
}

impl UpdateContext<'_> {
    /// Limit of the rail the train is on, 0 when it has none
    pub fn speed_limit_ms(&self, train: &Train) -> f64 {
        train
            .current_segment()
            .and_then(|s| self.network.try_rail(s.rail))
            .map(|r| r.speed_limit_ms())
            .unwrap_or(0.0)
    }
}

fn is_standstill(train: &Train, ctx: &StateContext) -> bool {
    train.velocity_ms < ctx.config.standstill_epsilon_ms
}

/// Precedence 1: gap <= braking distance
fn in_emergency_zone(train: &Train, ctx: &StateContext) -> bool {
    let risk = ctx.risk;
    risk.has_leader() && train.velocity_ms > 0.0 && risk.gap_m <= risk.braking_distance_m
}

/// Precedence 2: controller denies and the leader is stopped or too close
fn must_yield(train: &Train, ctx: &StateContext) -> bool {
    let risk = ctx.risk;
    if !risk.has_leader() {
        return false;
    }
    let denied = ctx.request_current_rail(train) == Some(AccessDecision::Deny);
    denied && (risk.leader_stopped || risk.gap_m < risk.safe_distance_m)
}

/// Remaining distance within the braking trigger window
fn approaching_rail_end(train: &Train, ctx: &StateContext) -> bool {
    let remaining = train.remaining_on_rail_m(ctx.network);
    remaining <= ctx.config.braking_trigger_factor * ctx.risk.braking_distance_m
}
