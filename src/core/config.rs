//! Simulation configuration with documented constants
//!
//! All tunable numbers are collected here with an explanation of what they
//! control and how they interact with each other.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};

/// Configuration for the simulation systems
///
/// Every field has a default, so a TOML file only needs to name the values
/// it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // === CLOCK ===
    /// Length of one simulation tick (seconds)
    ///
    /// Physics is integrated with explicit steps of this size. Larger steps
    /// make braking less precise near rail ends.
    pub tick_seconds: f64,

    /// Simulation time at tick zero (seconds since midnight)
    pub start_time: f64,

    // === SAFETY MARGINS ===
    /// Standstill clearance kept to a leader (metres)
    ///
    /// Also the gap below which a stopped train may not be admitted behind
    /// another train on the same directed segment.
    pub min_clearance_m: f64,

    /// Time headway added to the clearance at speed (seconds)
    ///
    /// safe distance = min_clearance_m + velocity * safe_time_headway_s
    pub safe_time_headway_s: f64,

    /// Time-to-collision a train in Emergency must see before it may
    /// release to Waiting (seconds)
    ///
    /// Hysteresis against flapping between Emergency and normal running.
    pub emergency_exit_ttc_s: f64,

    // === STATE THRESHOLDS ===
    /// Fraction of the speed limit at which Accelerating hands over to
    /// Cruising
    pub cruise_entry_ratio: f64,

    /// Start braking when the remaining distance is within this multiple of
    /// the braking distance
    pub braking_trigger_factor: f64,

    /// Fraction of the acceleration force Cruising uses to hold the limit
    pub cruise_correction_ratio: f64,

    /// Speeds below this are treated as standstill (m/s)
    pub standstill_epsilon_ms: f64,

    /// Speed a train keeps while rolling the last metres to the rail end
    /// (m/s)
    pub creep_speed_ms: f64,

    /// A train this close to the rail end has arrived (metres)
    pub arrival_tolerance_m: f64,

    // === OPERATIONS ===
    /// Reverse finished trains and send them back half a day later
    pub round_trip: bool,

    /// Seed for the event generator
    pub seed: u64,

    /// Interval between dashboard/journey reports (seconds, 0 disables)
    pub report_interval_s: f64,

    /// Poll interval of the definition-file watcher (milliseconds)
    pub watch_interval_ms: u64,

    /// Disruptive event generation
    pub events: EventConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 1.0,
            start_time: 0.0,

            // A 30 m/s train keeps 500 + 30 * 30 = 1400 m to its leader,
            // comfortably above a 450 m braking distance at 1 m/s².
            min_clearance_m: 500.0,
            safe_time_headway_s: 30.0,
            emergency_exit_ttc_s: 60.0,

            cruise_entry_ratio: 0.99,
            braking_trigger_factor: 1.1,
            cruise_correction_ratio: 0.5,
            standstill_epsilon_ms: 0.05,
            creep_speed_ms: 2.0,
            arrival_tolerance_m: 1.0,

            round_trip: false,
            seed: 42,
            report_interval_s: 900.0,
            watch_interval_ms: 1000,

            events: EventConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a (possibly partial) TOML configuration file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.tick_seconds <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "tick_seconds ({}) must be positive",
                self.tick_seconds
            )));
        }

        if self.min_clearance_m < 0.0 || self.safe_time_headway_s < 0.0 {
            return Err(SimError::InvalidConfig(
                "safety margins must not be negative".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.cruise_entry_ratio) {
            return Err(SimError::InvalidConfig(format!(
                "cruise_entry_ratio ({}) must lie in [0, 1]",
                self.cruise_entry_ratio
            )));
        }

        if self.braking_trigger_factor < 1.0 {
            return Err(SimError::InvalidConfig(format!(
                "braking_trigger_factor ({}) below 1.0 would overrun rail ends",
                self.braking_trigger_factor
            )));
        }

        if self.creep_speed_ms <= self.standstill_epsilon_ms {
            return Err(SimError::InvalidConfig(format!(
                "creep_speed_ms ({}) must exceed standstill_epsilon_ms ({})",
                self.creep_speed_ms, self.standstill_epsilon_ms
            )));
        }

        self.events.validate()
    }

    /// Safe following distance at the given speed (metres)
    pub fn safe_distance(&self, velocity_ms: f64) -> f64 {
        self.min_clearance_m + velocity_ms * self.safe_time_headway_s
    }

    /// Simulation time at the start of the given tick
    ///
    /// Always derived from the tick counter so recorded and replayed runs
    /// produce bit-identical timestamps.
    pub fn time_at(&self, tick: u64) -> f64 {
        self.start_time + tick as f64 * self.tick_seconds
    }
}

/// Inclusive sampling range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn is_valid(&self) -> bool {
        self.min <= self.max && self.min >= 0.0
    }
}

/// Probabilities, ranges and caps of the disruptive event generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Master switch for random event generation
    pub enabled: bool,

    // === PER-MINUTE PROBABILITIES ===
    pub station_delay_probability: f64,
    pub maintenance_probability: f64,
    pub signal_failure_probability: f64,
    pub weather_probability: f64,

    /// Events start this many minutes after being generated
    pub lead_time_min: Range,

    // === STATION DELAY ===
    pub station_delay_duration_min: Range,
    /// Extra dwell added at the station (minutes)
    pub station_delay_extra_min: Range,

    // === TRACK MAINTENANCE ===
    pub maintenance_duration_min: Range,
    /// Speed limit multiplier on the affected rail
    pub maintenance_speed_factor: Range,
    pub max_concurrent_maintenance: usize,

    // === SIGNAL FAILURE ===
    pub signal_failure_duration_min: Range,
    /// How long an affected train is held at a full stop (seconds)
    pub signal_stop_duration_s: f64,
    pub max_concurrent_signal_failures: usize,

    // === WEATHER ===
    pub weather_duration_min: Range,
    /// Speed limit multiplier on every rail in the radius
    pub weather_speed_factor: Range,
    /// Largest radius in graph hops around the center node
    pub max_weather_radius: u32,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            enabled: true,

            station_delay_probability: 0.02,
            maintenance_probability: 0.01,
            signal_failure_probability: 0.005,
            weather_probability: 0.003,

            lead_time_min: Range::new(0.0, 15.0),

            station_delay_duration_min: Range::new(10.0, 60.0),
            station_delay_extra_min: Range::new(2.0, 10.0),

            maintenance_duration_min: Range::new(30.0, 180.0),
            maintenance_speed_factor: Range::new(0.3, 0.7),
            max_concurrent_maintenance: 3,

            signal_failure_duration_min: Range::new(5.0, 20.0),
            signal_stop_duration_s: 180.0,
            max_concurrent_signal_failures: 2,

            weather_duration_min: Range::new(60.0, 240.0),
            weather_speed_factor: Range::new(0.5, 0.9),
            max_weather_radius: 2,
        }
    }
}

impl EventConfig {
    /// Configuration with random generation switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let probabilities = [
            self.station_delay_probability,
            self.maintenance_probability,
            self.signal_failure_probability,
            self.weather_probability,
        ];
        if probabilities.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(SimError::InvalidConfig(
                "event probabilities must lie in [0, 1]".into(),
            ));
        }

        let ranges = [
            self.lead_time_min,
            self.station_delay_duration_min,
            self.station_delay_extra_min,
            self.maintenance_duration_min,
            self.maintenance_speed_factor,
            self.signal_failure_duration_min,
            self.weather_duration_min,
            self.weather_speed_factor,
        ];
        if ranges.iter().any(|r| !r.is_valid()) {
            return Err(SimError::InvalidConfig(
                "event ranges need 0 <= min <= max".into(),
            ));
        }

        if self.maintenance_speed_factor.max > 1.0 || self.weather_speed_factor.max > 1.0 {
            return Err(SimError::InvalidConfig(
                "speed factors must not raise the limit".into(),
            ));
        }

        Ok(())
    }
}
