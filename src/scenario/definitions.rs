//! On-disk definition file formats (TOML)
//!
//! ```toml
//! # network.toml
//! [[nodes]]
//! name = "Amsterdam"
//! kind = "station"
//!
//! [[rails]]
//! from = "Amsterdam"
//! to = "Utrecht"
//! length_km = 35.0
//! speed_limit_kmh = 140.0
//! ```
//!
//! ```toml
//! # trains.toml
//! [[trains]]
//! name = "IC 3500"
//! mass_tons = 420.0
//! max_accel_kn = 250.0
//! max_brake_kn = 400.0
//! departure = "Amsterdam"
//! departure_time = "07:15"
//! arrival = "Utrecht"
//! ```

use serde::{Deserialize, Serialize};

use crate::network::graph::NodeKind;

fn default_kind() -> NodeKind {
    NodeKind::Station
}

fn default_friction() -> f64 {
    0.002
}

fn default_stop_duration() -> f64 {
    60.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RailDef {
    pub from: String,
    pub to: String,
    pub length_km: f64,
    pub speed_limit_kmh: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkFile {
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub rails: Vec<RailDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainDef {
    pub name: String,
    pub mass_tons: f64,
    #[serde(default = "default_friction")]
    pub friction_coef: f64,
    pub max_accel_kn: f64,
    pub max_brake_kn: f64,
    pub departure: String,
    /// `HH:MM` or `HH:MM:SS`
    pub departure_time: String,
    pub arrival: String,
    /// Dwell at intermediate stations (seconds)
    #[serde(default = "default_stop_duration")]
    pub stop_duration_s: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainFile {
    #[serde(default)]
    pub trains: Vec<TrainDef>,
}
